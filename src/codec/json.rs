use super::Codec;
use crate::error::CodecError;
use serde_json::Value;

/// Textual JSON codec, registered under the `json` tag.
#[derive(Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    #[inline]
    fn encode_value(&self, v: &Value) -> Result<Vec<u8>, CodecError> {
        match serde_json::to_vec(v) {
            Ok(buf) => Ok(buf),
            Err(e) => {
                log::error!("json codec: encode error: {:?}", e);
                Err(CodecError::Encode(e.to_string()))
            }
        }
    }

    #[inline]
    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError> {
        match serde_json::from_slice(data) {
            Ok(v) => Ok(v),
            Err(e) => {
                log::warn!("json codec: decode error: {:?}", e);
                Err(CodecError::Decode(e.to_string()))
            }
        }
    }
}
