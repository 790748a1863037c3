use crate::codec;
use crate::error::{CodecError, RpcError};
use crate::method::{InvokeError, Method, ServiceMethods};
use crate::net;
use crate::option::{
    Header, ServiceInfo, HEADER_RPC, HEADER_TYPE, MAGIC_NUMBER, TYPE_CALL, TYPE_PING, TYPE_REG,
};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use log::*;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// One RPC server: a named service, its frozen method table, and the
/// HTTP endpoint that makes the methods callable.
///
/// The server answers `POST /call` requests whose `X-Header` names this
/// service; with [`run_with_registry`](Server::run_with_registry) it also
/// announces itself to a registry and keeps its replica alive with
/// periodic heartbeats.
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    ip: Ipv4Addr,
    port: u16,
    heartbeat: Duration,
    methods: Arc<HashMap<String, Method>>,
    http: reqwest::Client,
    shutdown: CancellationToken,
}

/// A rejected request: the status to answer with plus the plain-text
/// reason. Exactly one response is written per request.
type Reject = (StatusCode, String);

impl Server {
    /// `name` is the service name clients address; `port` the listen
    /// port; `heartbeat` the liveness period advertised to a registry.
    ///
    /// Fails when the host has no non-loopback IPv4 address, since peers
    /// could never reach the advertised endpoint.
    pub fn new(
        name: impl Into<String>, port: u16, methods: ServiceMethods, heartbeat: Duration,
    ) -> Result<Self, RpcError> {
        let ip = net::local_ipv4().ok_or(RpcError::NoLocalIp)?;
        let name = name.into();
        let methods = methods.freeze();
        info!("rpc server: service {} registered, {} methods", name, methods.len());
        Ok(Self {
            inner: Arc::new(Inner {
                name,
                ip,
                port,
                heartbeat,
                methods,
                http: reqwest::Client::new(),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Advertised `host:port` for the configured listen port.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.inner.ip, self.inner.port)
    }

    /// Router serving the single `/call` endpoint, for embedding or for
    /// tests that bring their own listener.
    pub fn router(&self) -> Router {
        Router::new().route("/call", post(handle_call)).with_state(self.inner.clone())
    }

    /// Bind `0.0.0.0:<port>` and serve until the process exits.
    pub async fn run(&self) -> Result<(), RpcError> {
        let listener = TcpListener::bind(("0.0.0.0", self.inner.port)).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), RpcError> {
        info!("rpc server: running on {}", listener.local_addr()?);
        let result = axum::serve(listener, self.router()).await;
        self.inner.shutdown.cancel();
        result.map_err(RpcError::from)
    }

    /// Register with the registry at `registry_addr` (`host:port`), spawn
    /// the heartbeat loop, then serve.
    ///
    /// A failed registration is an error: a server the registry never
    /// heard of would run invisible forever, since heartbeats for
    /// unregistered replicas are dropped.
    pub async fn run_with_registry(&self, registry_addr: &str) -> Result<(), RpcError> {
        let listener = TcpListener::bind(("0.0.0.0", self.inner.port)).await?;
        self.serve_with_registry(listener, registry_addr).await
    }

    /// As [`run_with_registry`](Server::run_with_registry), on an
    /// already-bound listener; the advertised port is the one actually
    /// bound.
    pub async fn serve_with_registry(
        &self, listener: TcpListener, registry_addr: &str,
    ) -> Result<(), RpcError> {
        let info = self.inner.service_info(listener.local_addr()?.port());
        self.inner.register(registry_addr, &info).await?;
        let inner = self.inner.clone();
        let registry = registry_addr.to_string();
        tokio::spawn(async move { inner.heartbeat_loop(&registry, info).await });
        self.serve(listener).await
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

async fn handle_call(
    State(inner): State<Arc<Inner>>, headers: HeaderMap, body: Bytes,
) -> Response {
    match inner.process(&headers, &body) {
        Ok(msg) => (StatusCode::OK, msg).into_response(),
        Err((status, reason)) => (status, reason).into_response(),
    }
}

impl Inner {
    /// The whole request pipeline; invocation runs synchronously inside
    /// the handling worker.
    fn process(&self, headers: &HeaderMap, body: &[u8]) -> Result<Vec<u8>, Reject> {
        if headers.get(HEADER_TYPE).and_then(|v| v.to_str().ok()) != Some(TYPE_CALL) {
            error!("rpc server: wrong message type");
            return Err((StatusCode::BAD_REQUEST, "rpc server: wrong message type".to_string()));
        }
        let header = self.parse_header(headers)?;
        self.validate(&header)?;
        let codec = codec::new_codec(&header.option.codec_type).ok_or_else(|| {
            error!("rpc server: unsupported codec type {}", header.option.codec_type);
            (
                StatusCode::BAD_REQUEST,
                format!("rpc server: unsupported codec type {}", header.option.codec_type),
            )
        })?;
        // Present after validate, by construction.
        let method = self.methods.get(&header.method).ok_or_else(|| {
            (StatusCode::BAD_REQUEST, format!("rpc server: method not found {}", header.method))
        })?;
        debug!("rpc server: call {}.{}", header.service, header.method);
        match method.invoke(codec.as_ref(), body) {
            Ok(msg) => Ok(msg),
            Err(InvokeError::Arg(e)) => {
                error!("rpc server: decode body failed: {}", e);
                Err((
                    StatusCode::BAD_REQUEST,
                    format!("rpc server: request does not match {}: {}", method.arg_type(), e),
                ))
            }
            Err(InvokeError::Method(e)) => {
                error!("rpc server: call method failed: {}", e);
                Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
            }
            Err(InvokeError::Ret(e)) => {
                error!("rpc server: encode response failed: {}", e);
                Err((StatusCode::INTERNAL_SERVER_ERROR, format!("rpc server: {}", e)))
            }
        }
    }

    fn parse_header(&self, headers: &HeaderMap) -> Result<Header, Reject> {
        let raw = headers.get(HEADER_RPC).and_then(|v| v.to_str().ok()).unwrap_or("");
        if raw.is_empty() {
            error!("rpc server: header is empty");
            return Err((StatusCode::BAD_REQUEST, "rpc server: header is empty".to_string()));
        }
        serde_json::from_str(raw).map_err(|e| {
            error!("rpc server: parse header failed: {}", e);
            (StatusCode::BAD_REQUEST, format!("rpc server: parse header failed: {}", e))
        })
    }

    fn validate(&self, header: &Header) -> Result<(), Reject> {
        if header.option.magic_number != MAGIC_NUMBER {
            error!("rpc server: invalid magic number {}", header.option.magic_number);
            return Err((
                StatusCode::BAD_REQUEST,
                format!("rpc server: invalid magic number {}", header.option.magic_number),
            ));
        }
        if header.service != self.name {
            error!("rpc server: service name mismatch {} != {}", self.name, header.service);
            return Err((
                StatusCode::BAD_REQUEST,
                format!("rpc server: service name mismatch {}", header.service),
            ));
        }
        if !self.methods.contains_key(&header.method) {
            error!("rpc server: method not found {}", header.method);
            return Err((
                StatusCode::BAD_REQUEST,
                format!("rpc server: method not found {}", header.method),
            ));
        }
        Ok(())
    }

    fn service_info(&self, port: u16) -> ServiceInfo {
        ServiceInfo {
            name: self.name.clone(),
            addr: format!("{}:{}", self.ip, port),
            timeout: self.heartbeat,
        }
    }

    async fn register(&self, registry: &str, info: &ServiceInfo) -> Result<(), RpcError> {
        let body = serde_json::to_vec(info).map_err(|e| CodecError::Encode(e.to_string()))?;
        let resp = self
            .http
            .post(format!("http://{}/register", registry))
            .header(HEADER_TYPE, TYPE_REG)
            .body(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcError::Status { status, body });
        }
        info!("rpc server: registered {} at {}", info.name, info.addr);
        Ok(())
    }

    /// Ping the registry every heartbeat period until shutdown. Send
    /// failures are logged and retried on the next tick.
    async fn heartbeat_loop(&self, registry: &str, info: ServiceInfo) {
        let url = format!("http://{}/heartbeat", registry);
        let body = match serde_json::to_vec(&info) {
            Ok(b) => b,
            Err(e) => {
                error!("rpc server: marshal heartbeat failed: {}", e);
                return;
            }
        };
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("rpc server: heartbeat loop stopped");
                    return;
                }
                _ = tokio::time::sleep(self.heartbeat) => {}
            }
            match self
                .http
                .post(&url)
                .header(HEADER_TYPE, TYPE_PING)
                .body(body.clone())
                .send()
                .await
            {
                Ok(resp) => trace!("rpc server: heartbeat {}", resp.status()),
                Err(e) => warn!("rpc server: heartbeat send failed: {}", e),
            }
        }
    }
}
