/// Failure while turning values into bytes or back.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Error returned by a service method body.
///
/// The server surfaces the text verbatim as the 500 response body.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MethodError(pub String);

impl MethodError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<&str> for MethodError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

impl From<String> for MethodError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

/// Failure from a load balancer lookup.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum BalanceError {
    #[error("service {0} not found")]
    NotFound(String),
}

/// Anything a client call or a peer constructor can fail with.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The remote side answered with a non-200 status; the body is its
    /// plain-text reason.
    #[error("[{status}] {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("unsupported codec type {0}")]
    UnsupportedCodec(String),

    #[error("unsupported load balance type {0}")]
    UnsupportedBalancer(String),

    #[error("cannot get local ip")]
    NoLocalIp,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Status code of the remote failure, when there is one.
    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
