use super::Codec;
use crate::error::CodecError;
use serde_json::Value;

/// Length-tagged, self-describing binary codec (MessagePack).
///
/// Registered under the wire tag `gob` and used as the default. Maps keep
/// their field names on the wire (`to_vec_named`), so any peer with the
/// same struct shape round-trips it.
#[derive(Default)]
pub struct BinCodec;

impl Codec for BinCodec {
    #[inline]
    fn encode_value(&self, v: &Value) -> Result<Vec<u8>, CodecError> {
        match rmp_serde::encode::to_vec_named(v) {
            Ok(buf) => Ok(buf),
            Err(e) => {
                log::error!("bin codec: encode error: {:?}", e);
                Err(CodecError::Encode(e.to_string()))
            }
        }
    }

    #[inline]
    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError> {
        match rmp_serde::decode::from_slice(data) {
            Ok(v) => Ok(v),
            Err(e) => {
                log::warn!("bin codec: decode error: {:?}", e);
                Err(CodecError::Decode(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecExt;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Inner {
        tag: String,
        weights: Vec<i64>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        id: u64,
        name: String,
        attrs: HashMap<String, i32>,
        inner: Inner,
    }

    fn sample() -> Payload {
        let mut attrs = HashMap::new();
        attrs.insert("retries".to_string(), 3);
        attrs.insert("shard".to_string(), -1);
        Payload {
            id: u64::MAX,
            name: "calc".to_string(),
            attrs,
            inner: Inner { tag: "prod".to_string(), weights: vec![0, -7, 1i64 << 40] },
        }
    }

    #[test]
    fn test_bin_round_trip() {
        let codec = BinCodec;
        let encoded = codec.encode(&sample()).expect("encode");
        let decoded: Payload = codec.decode(&encoded).expect("decode");
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_bin_decode_garbage() {
        let codec = BinCodec;
        let r: Result<Payload, _> = codec.decode(&[0xc1, 0xff, 0x00]);
        assert!(r.is_err());
    }
}
