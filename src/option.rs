use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Protocol sentinel carried in every call header.
///
/// A request bearing any other value is rejected before dispatch.
pub const MAGIC_NUMBER: u32 = 0x123456;

/// `X-Type` header values, one per message kind.
pub const TYPE_CALL: &str = "Call";
pub const TYPE_REG: &str = "Reg";
pub const TYPE_ASK: &str = "Ask";
pub const TYPE_PING: &str = "Ping";

/// Message-kind header name.
pub const HEADER_TYPE: &str = "X-Type";
/// Call-header header name; carries a JSON-encoded [`Header`].
pub const HEADER_RPC: &str = "X-Header";

/// Per-peer call options.
///
/// Serialized as part of the `X-Header` JSON on every call, so both sides
/// agree on codec and protocol revision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Options {
    pub magic_number: u32,
    pub codec_type: String,
    #[serde(default)]
    pub use_registry: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            magic_number: MAGIC_NUMBER,
            codec_type: crate::codec::TYPE_BIN.to_string(),
            use_registry: false,
        }
    }
}

/// Call envelope carried in the `X-Header` HTTP header as JSON text.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Header {
    pub service: String,
    pub method: String,
    pub option: Options,
}

/// Registration payload a server sends to the registry.
///
/// `timeout` is the server's heartbeat period, not a request deadline; it
/// travels as integer nanoseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceInfo {
    pub name: String,
    /// `host:port`, no scheme.
    pub addr: String,
    #[serde(with = "duration_nanos")]
    pub timeout: Duration,
}

mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(d)?))
    }
}
