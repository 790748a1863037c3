use crate::codec::{self, CodecExt};
use crate::config::ClientConfig;
use crate::error::RpcError;
use crate::option::{Header, Options, HEADER_RPC, HEADER_TYPE, MAGIC_NUMBER, TYPE_ASK, TYPE_CALL};
use log::*;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::oneshot;

/// RPC client for one target.
///
/// The target is a server address, or a registry address when
/// `options.use_registry` is set — then every call resolves the service
/// name to a live replica first. Cloning is cheap and clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct Client {
    /// `host:port` of the server, or of the registry.
    target: String,
    opt: Options,
    http: reqwest::Client,
}

impl Client {
    /// Build a client with default transport tuning. The magic number is
    /// forced to the protocol sentinel and an empty codec tag falls back
    /// to the default; an unknown codec tag is an error.
    pub fn new(target: impl Into<String>, opt: Options) -> Result<Self, RpcError> {
        Self::with_config(target, opt, ClientConfig::default())
    }

    pub fn with_config(
        target: impl Into<String>, mut opt: Options, config: ClientConfig,
    ) -> Result<Self, RpcError> {
        opt.magic_number = MAGIC_NUMBER;
        if opt.codec_type.is_empty() {
            opt.codec_type = codec::TYPE_BIN.to_string();
        }
        if codec::new_codec(&opt.codec_type).is_none() {
            error!("rpc client: unsupported codec type {}", opt.codec_type);
            return Err(RpcError::UnsupportedCodec(opt.codec_type));
        }
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.call_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self { target: target.into(), opt, http: builder.build()? })
    }

    /// Call `service.method` with `arg`, returning the decoded reply.
    ///
    /// Dropping the returned future aborts the in-flight exchange.
    pub async fn call<Arg, Ret>(
        &self, service: &str, method: &str, arg: &Arg,
    ) -> Result<Ret, RpcError>
    where
        Arg: Serialize,
        Ret: DeserializeOwned,
    {
        // The tag was checked at construction.
        let cc = codec::new_codec(&self.opt.codec_type)
            .ok_or_else(|| RpcError::UnsupportedCodec(self.opt.codec_type.clone()))?;
        let body = cc.encode(arg)?;
        let resp = self.exchange(service, method, body).await?;
        Ok(cc.decode(&resp)?)
    }

    /// Fire `service.method` in a background task; the returned channel
    /// yields the result exactly once.
    pub fn spawn_call<Arg, Ret>(
        &self, service: &str, method: &str, arg: &Arg,
    ) -> oneshot::Receiver<Result<Ret, RpcError>>
    where
        Arg: Serialize,
        Ret: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let cc = match codec::new_codec(&self.opt.codec_type) {
            Some(cc) => cc,
            None => {
                let _ = tx.send(Err(RpcError::UnsupportedCodec(self.opt.codec_type.clone())));
                return rx;
            }
        };
        let body = match cc.encode(arg) {
            Ok(body) => body,
            Err(e) => {
                let _ = tx.send(Err(e.into()));
                return rx;
            }
        };
        let client = self.clone();
        let service = service.to_string();
        let method = method.to_string();
        tokio::spawn(async move {
            let res = match client.exchange(&service, &method, body).await {
                Ok(resp) => cc.decode::<Ret>(&resp).map_err(RpcError::from),
                Err(e) => Err(e),
            };
            // The receiver may be gone; nothing to do then.
            let _ = tx.send(res);
        });
        rx
    }

    /// Resolve the target (through the registry when configured), send
    /// the call, return the raw 200 body.
    async fn exchange(
        &self, service: &str, method: &str, body: Vec<u8>,
    ) -> Result<Vec<u8>, RpcError> {
        let addr = if self.opt.use_registry {
            self.resolve(service).await?
        } else {
            self.target.clone()
        };
        let header = Header {
            service: service.to_string(),
            method: method.to_string(),
            option: self.opt.clone(),
        };
        let header_text = serde_json::to_string(&header)
            .map_err(|e| crate::error::CodecError::Encode(e.to_string()))?;
        let resp = self
            .http
            .post(format!("http://{}/call", addr))
            .header(HEADER_TYPE, TYPE_CALL)
            .header(HEADER_RPC, header_text)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!("rpc client: send request failed: {}", e);
                e
            })?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).to_string(),
            });
        }
        Ok(bytes.to_vec())
    }

    /// Ask the registry for a live replica of `service`.
    async fn resolve(&self, service: &str) -> Result<String, RpcError> {
        let resp = self
            .http
            .post(format!("http://{}/get", self.target))
            .header(HEADER_TYPE, TYPE_ASK)
            .body(service.to_string())
            .send()
            .await
            .map_err(|e| {
                error!("rpc client: registry lookup failed: {}", e);
                e
            })?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).to_string(),
            });
        }
        let addr = String::from_utf8_lossy(&bytes).to_string();
        debug!("rpc client: {} -> {}", service, addr);
        Ok(addr)
    }
}
