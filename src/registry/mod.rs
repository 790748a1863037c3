//! Standalone service registry.
//!
//! Servers announce themselves with `POST /register` and stay eligible by
//! pinging `POST /heartbeat`; clients trade a service name for one live
//! replica address at `POST /get`. Replica selection is delegated to a
//! pluggable [`LoadBalance`] strategy, round-robin by default. Nothing is
//! persisted; a registry restart starts from an empty table.

pub mod balance;
mod round_robin;

pub use balance::{new_balancer, register_balancer, BalanceCtor, LoadBalance, TYPE_ROUND_ROBIN};
pub use round_robin::RoundRobin;

use crate::error::RpcError;
use crate::option::{ServiceInfo, HEADER_TYPE, TYPE_ASK, TYPE_PING, TYPE_REG};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use log::*;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Registry tuning.
#[derive(Clone, Debug)]
pub struct RegistryOptions {
    /// Multiplier on a replica's heartbeat period before it counts as
    /// dead.
    pub timeout_factor: f64,
    /// Tag of the balancing strategy to instantiate.
    pub load_balance: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self { timeout_factor: 3.0, load_balance: TYPE_ROUND_ROBIN.to_string() }
    }
}

/// The registry service itself; one instance per process.
pub struct Registry {
    balance: Box<dyn LoadBalance>,
    opt: RegistryOptions,
}

impl Registry {
    pub fn new(opt: RegistryOptions) -> Result<Self, RpcError> {
        let balance = balance::new_balancer(&opt.load_balance)
            .ok_or_else(|| RpcError::UnsupportedBalancer(opt.load_balance.clone()))?;
        Ok(Self { balance, opt })
    }

    /// Router serving the three registry endpoints, for embedding or for
    /// tests that bring their own listener.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/register", post(handle_register))
            .route("/get", post(handle_get))
            .route("/heartbeat", post(handle_heartbeat))
            .with_state(self)
    }

    /// Serve on an already-bound listener until the process exits.
    pub async fn serve(self, listener: TcpListener) -> Result<(), RpcError> {
        info!("registry: running on {}", listener.local_addr()?);
        axum::serve(listener, Arc::new(self).router()).await?;
        Ok(())
    }

    /// Bind `0.0.0.0:<port>` and serve.
    pub async fn run(self, port: u16) -> Result<(), RpcError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        self.serve(listener).await
    }
}

#[inline]
fn has_type(headers: &HeaderMap, want: &str) -> bool {
    headers.get(HEADER_TYPE).and_then(|v| v.to_str().ok()) == Some(want)
}

async fn handle_register(
    State(reg): State<Arc<Registry>>, headers: HeaderMap, body: Bytes,
) -> (StatusCode, String) {
    if !has_type(&headers, TYPE_REG) {
        error!("registry: wrong message type");
        return (StatusCode::BAD_REQUEST, "registry: wrong message type".to_string());
    }
    let info: ServiceInfo = match serde_json::from_slice(&body) {
        Ok(info) => info,
        Err(e) => {
            error!("registry: parse body failed: {}", e);
            return (StatusCode::BAD_REQUEST, format!("registry: parse body failed: {}", e));
        }
    };
    debug!("registry: register {} at {}", info.name, info.addr);
    reg.balance.register(info);
    (StatusCode::OK, String::new())
}

async fn handle_get(
    State(reg): State<Arc<Registry>>, headers: HeaderMap, body: Bytes,
) -> (StatusCode, String) {
    if !has_type(&headers, TYPE_ASK) {
        error!("registry: wrong message type");
        return (StatusCode::BAD_REQUEST, "registry: wrong message type".to_string());
    }
    let name = String::from_utf8_lossy(&body);
    match reg.balance.get(&name, reg.opt.timeout_factor) {
        Ok(addr) => {
            debug!("registry: {} -> {}", name, addr);
            (StatusCode::OK, addr)
        }
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()),
    }
}

async fn handle_heartbeat(
    State(reg): State<Arc<Registry>>, headers: HeaderMap, body: Bytes,
) -> (StatusCode, String) {
    if !has_type(&headers, TYPE_PING) {
        error!("registry heartbeat: wrong message type");
        return (StatusCode::BAD_REQUEST, "registry: wrong message type".to_string());
    }
    // Malformed pings are dropped, not answered with an error; the sender
    // retries on its next tick anyway.
    match serde_json::from_slice::<ServiceInfo>(&body) {
        Ok(info) => reg.balance.heart_beat(&info.name, &info.addr),
        Err(e) => warn!("registry heartbeat: bad body: {}", e),
    }
    (StatusCode::OK, String::new())
}
