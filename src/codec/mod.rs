use crate::error::CodecError;
use once_cell::sync::Lazy;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

mod bin;
mod json;
pub use bin::BinCodec;
pub use json::JsonCodec;

/// Tag of the default binary codec.
pub const TYPE_BIN: &str = "gob";
/// Tag of the textual JSON codec.
pub const TYPE_JSON: &str = "json";

/// Byte-level encoder/decoder, selected per request by tag.
///
/// Works on self-describing `serde_json::Value` trees so the trait stays
/// object-safe; typed entry points live on [`CodecExt`]. Implementations
/// are immutable; each request path constructs its own instance, so no
/// thread safety beyond `Send + Sync` is needed.
pub trait Codec: Send + Sync {
    fn encode_value(&self, v: &Value) -> Result<Vec<u8>, CodecError>;
    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError>;
}

/// Typed helpers over any [`Codec`], including trait objects.
pub trait CodecExt {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError>;
}

impl<C: Codec + ?Sized> CodecExt for C {
    #[inline]
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        let v = serde_json::to_value(msg).map_err(|e| CodecError::Encode(e.to_string()))?;
        self.encode_value(&v)
    }

    #[inline]
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        let v = self.decode_value(data)?;
        serde_json::from_value(v).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Constructor signature a codec registers under its tag.
pub type CodecCtor = fn() -> Box<dyn Codec>;

fn new_bin() -> Box<dyn Codec> {
    Box::new(BinCodec)
}

fn new_json() -> Box<dyn Codec> {
    Box::new(JsonCodec)
}

static CODECS: Lazy<RwLock<HashMap<String, CodecCtor>>> = Lazy::new(|| {
    let mut m: HashMap<String, CodecCtor> = HashMap::new();
    m.insert(TYPE_BIN.to_string(), new_bin);
    m.insert(TYPE_JSON.to_string(), new_json);
    RwLock::new(m)
});

/// Register a third-party codec under `tag`.
///
/// Must happen before the first server or client is constructed; peers
/// resolve tags at request time and fail unknown ones.
pub fn register_codec(tag: &str, ctor: CodecCtor) {
    CODECS.write().unwrap().insert(tag.to_string(), ctor);
}

/// Construct the codec registered under `tag`, if any.
pub fn new_codec(tag: &str) -> Option<Box<dyn Codec>> {
    CODECS.read().unwrap().get(tag).map(|ctor| ctor())
}
