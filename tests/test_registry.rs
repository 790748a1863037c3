mod common;

use common::*;
use courier_rpc::registry::{Registry, RegistryOptions, TYPE_ROUND_ROBIN};
use courier_rpc::{net, Client, Options, RpcError, Server, ServiceInfo};
use rstest::rstest;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;

async fn start_registry(timeout_factor: f64) -> String {
    let registry = Registry::new(RegistryOptions {
        timeout_factor,
        load_balance: TYPE_ROUND_ROBIN.to_string(),
    })
    .unwrap();
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
    tokio::spawn(async move { registry.serve(listener).await });
    addr
}

fn info(name: &str, addr: &str, timeout: Duration) -> ServiceInfo {
    ServiceInfo { name: name.to_string(), addr: addr.to_string(), timeout }
}

async fn post_info(registry: &str, path: &str, x_type: &str, info: &ServiceInfo) -> u16 {
    reqwest::Client::new()
        .post(format!("http://{}/{}", registry, path))
        .header("X-Type", x_type)
        .body(serde_json::to_vec(info).unwrap())
        .send()
        .await
        .unwrap()
        .status()
        .as_u16()
}

async fn get_addr(registry: &str, service: &str) -> (u16, String) {
    let resp = reqwest::Client::new()
        .post(format!("http://{}/get", registry))
        .header("X-Type", "Ask")
        .body(service.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.text().await.unwrap())
}

#[rstest]
fn test_round_robin_over_http(runner: TestRunner) {
    runner.block_on(async move {
        let registry = start_registry(2.0).await;
        let timeout = Duration::from_secs(60);
        assert_eq!(post_info(&registry, "register", "Reg", &info("Calc", "10.0.0.1:80", timeout)).await, 200);
        assert_eq!(post_info(&registry, "register", "Reg", &info("Calc", "10.0.0.2:80", timeout)).await, 200);
        assert_eq!(get_addr(&registry, "Calc").await, (200, "10.0.0.1:80".to_string()));
        assert_eq!(get_addr(&registry, "Calc").await, (200, "10.0.0.2:80".to_string()));
        assert_eq!(get_addr(&registry, "Calc").await, (200, "10.0.0.1:80".to_string()));
    });
}

#[rstest]
fn test_eviction_over_http(runner: TestRunner) {
    runner.block_on(async move {
        let registry = start_registry(2.0).await;
        let timeout = Duration::from_millis(100);
        let s1 = info("Calc", "10.0.0.1:80", timeout);
        let s2 = info("Calc", "10.0.0.2:80", timeout);
        post_info(&registry, "register", "Reg", &s1).await;
        post_info(&registry, "register", "Reg", &s2).await;
        // Only the second replica keeps heartbeating past the threshold.
        sleep(Duration::from_millis(250)).await;
        assert_eq!(post_info(&registry, "heartbeat", "Ping", &s2).await, 200);
        assert_eq!(get_addr(&registry, "Calc").await, (200, "10.0.0.2:80".to_string()));
        assert_eq!(get_addr(&registry, "Calc").await, (200, "10.0.0.2:80".to_string()));
    });
}

#[rstest]
fn test_unknown_service_is_404(runner: TestRunner) {
    runner.block_on(async move {
        let registry = start_registry(3.0).await;
        assert_eq!(get_addr(&registry, "Calc").await, (404, "service Calc not found".to_string()));
    });
}

#[rstest]
fn test_wrong_message_type_rejected(runner: TestRunner) {
    runner.block_on(async move {
        let registry = start_registry(3.0).await;
        let resp = reqwest::Client::new()
            .post(format!("http://{}/get", registry))
            .header("X-Type", "Reg")
            .body("Calc")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        assert!(resp.text().await.unwrap().contains("wrong message type"));
    });
}

#[rstest]
fn test_heartbeat_tolerates_garbage(runner: TestRunner) {
    runner.block_on(async move {
        let registry = start_registry(3.0).await;
        // Malformed pings are dropped without an error answer.
        let resp = reqwest::Client::new()
            .post(format!("http://{}/heartbeat", registry))
            .header("X-Type", "Ping")
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        // A ping for a replica nobody registered creates nothing.
        let ghost = info("Calc", "10.0.0.9:80", Duration::from_secs(1));
        assert_eq!(post_info(&registry, "heartbeat", "Ping", &ghost).await, 200);
        assert_eq!(get_addr(&registry, "Calc").await.0, 404);
    });
}

/// Spawn a calc server attached to the registry; returns the abort
/// handle and the advertised address.
async fn start_calc_with_registry(
    registry: &str, heartbeat: Duration,
) -> (tokio::task::JoinHandle<()>, String) {
    let server = Server::new("Calc", 0, calc_methods(), heartbeat).unwrap();
    let listener = TcpListener::bind(("0.0.0.0", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let addr = format!("{}:{}", net::local_ipv4().unwrap(), port);
    let registry = registry.to_string();
    let handle = tokio::spawn(async move {
        let _ = server.serve_with_registry(listener, &registry).await;
    });
    // Registration happens before the listener starts serving; give the
    // spawned task one tick to get that far.
    sleep(Duration::from_millis(50)).await;
    (handle, addr)
}

#[rstest]
fn test_call_through_registry(runner: TestRunner) {
    runner.block_on(async move {
        let registry = start_registry(3.0).await;
        let heartbeat = Duration::from_millis(100);
        let (_h1, addr1) = start_calc_with_registry(&registry, heartbeat).await;
        let (_h2, addr2) = start_calc_with_registry(&registry, heartbeat).await;

        // The registry hands out both replicas in turn.
        let (status, first) = get_addr(&registry, "Calc").await;
        assert_eq!(status, 200);
        let (_, second) = get_addr(&registry, "Calc").await;
        assert_eq!(
            {
                let mut got = vec![first.clone(), second.clone()];
                got.sort();
                got
            },
            {
                let mut want = vec![addr1.clone(), addr2.clone()];
                want.sort();
                want
            }
        );

        let opt = Options { use_registry: true, ..Options::default() };
        let client = Client::new(registry.clone(), opt).unwrap();
        for _ in 0..4 {
            let sum: i32 = client.call("Calc", "Add", &AddReq { a: 2, b: 3 }).await.unwrap();
            assert_eq!(sum, 5);
        }
    });
}

#[rstest]
fn test_dead_server_evicted_end_to_end(runner: TestRunner) {
    runner.block_on(async move {
        let registry = start_registry(2.0).await;
        let heartbeat = Duration::from_millis(100);
        let (h1, _addr1) = start_calc_with_registry(&registry, heartbeat).await;
        let (_h2, addr2) = start_calc_with_registry(&registry, heartbeat).await;

        // Kill the first server; its heartbeats stop with it.
        h1.abort();
        sleep(Duration::from_millis(500)).await;

        let opt = Options { use_registry: true, ..Options::default() };
        let client = Client::new(registry.clone(), opt).unwrap();
        for _ in 0..3 {
            let sum: i32 = client.call("Calc", "Add", &AddReq { a: 4, b: 4 }).await.unwrap();
            assert_eq!(sum, 8);
        }
        // Only the survivor is handed out now.
        let (_, survivor) = get_addr(&registry, "Calc").await;
        assert_eq!(survivor, addr2);
        let (_, again) = get_addr(&registry, "Calc").await;
        assert_eq!(again, addr2);
    });
}

#[rstest]
fn test_client_surfaces_registry_miss(runner: TestRunner) {
    runner.block_on(async move {
        let registry = start_registry(3.0).await;
        let opt = Options { use_registry: true, ..Options::default() };
        let client = Client::new(registry, opt).unwrap();
        let err = client.call::<_, i32>("Calc", "Add", &AddReq { a: 1, b: 1 }).await.unwrap_err();
        match err {
            RpcError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "service Calc not found");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    });
}
