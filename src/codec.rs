use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_cbor::Value;

/// Decodes `bytes` and requires them to be the canonical encoding of the
///  decoded value: map keys ordered length first, minimal integers,
///  definite lengths, nothing trailing.
/// The canonical bytes are what gets hashed and signed, so accepting any
///  other form would let two encodings of one operation disagree on CID.
///
pub(crate) fn decode_canonical_value(bytes: &[u8]) -> Result<Value> {
    let value: Value = serde_cbor::from_slice(bytes)?;
    if serde_cbor::to_vec(&value)? != bytes {
        return Err(Error::MalformedEncoding("non-canonical CBOR".into()));
    }
    Ok(value)
}

/// Same as [`decode_canonical_value`] for fixed schemas.
pub(crate) fn decode_canonical<T>(bytes: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Serialize,
{
    let decoded: T = serde_cbor::from_slice(bytes)?;
    if serde_cbor::to_vec(&decoded)? != bytes {
        return Err(Error::MalformedEncoding("non-canonical CBOR".into()));
    }
    Ok(decoded)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_cbor::to_vec(value)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn keys_sort_by_length_first() {
        let mut map = BTreeMap::new();
        map.insert(Value::Text("services".into()), Value::Null);
        map.insert(Value::Text("sig".into()), Value::Null);
        map.insert(Value::Text("prev".into()), Value::Null);
        let bytes = encode(&Value::Map(map)).unwrap();
        // a3 63 "sig" f6 64 "prev" f6 68 "services" f6
        assert_eq!(&bytes[..5], &[0xa3, 0x63, b's', b'i', b'g']);
        assert!(decode_canonical_value(&bytes).is_ok());
    }

    #[test]
    fn rejects_unsorted_map() {
        // {"prev": null, "sig": null}
        let bytes = [
            0xa2, 0x64, b'p', b'r', b'e', b'v', 0xf6, 0x63, b's', b'i', b'g', 0xf6,
        ];
        assert!(matches!(
            decode_canonical_value(&bytes),
            Err(Error::MalformedEncoding(_))
        ));
    }

    #[test]
    fn rejects_non_minimal_integer() {
        // 1 encoded with a one byte argument
        let bytes = [0x18, 0x01];
        assert!(decode_canonical_value(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_and_trailing() {
        assert!(decode_canonical_value(&[0x82]).is_err());
        assert!(decode_canonical_value(&[0xf6, 0xf6]).is_err());
    }
}
