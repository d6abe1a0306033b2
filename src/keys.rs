use crate::{Error, Result};
use std::fmt::Display;

pub const DID_KEY_PREFIX: &str = "did:key:";
/// SEC1 compressed point length of both supported curves.
pub const COMPRESSED_KEY_LEN: usize = 33;
/// Compact `r || s` ECDSA signature length.
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Secp256k1,
    P256,
}

impl KeyType {
    /// Varint encoded multicodec value prepended to the key bytes.
    pub const fn multicodec(&self) -> [u8; 2] {
        match self {
            Self::Secp256k1 => [0xe7, 0x01],
            Self::P256 => [0x80, 0x24],
        }
    }

    fn from_multicodec(prefix: &[u8]) -> Option<Self> {
        [Self::Secp256k1, Self::P256]
            .into_iter()
            .find(|t| t.multicodec() == prefix)
    }
}

/// Rotation or verification key in its `did:key` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    key_type: KeyType,
    compressed: [u8; COMPRESSED_KEY_LEN],
}

impl PublicKey {
    /// Only the shape is checked here, the point itself is decompressed
    ///  when a signature is verified against it.
    pub fn from_compressed(key_type: KeyType, bytes: &[u8]) -> Result<Self> {
        let compressed: [u8; COMPRESSED_KEY_LEN] = bytes.try_into().map_err(|_| {
            Error::MalformedEncoding(format!(
                "expected {COMPRESSED_KEY_LEN} byte compressed key, got {}",
                bytes.len()
            ))
        })?;
        if compressed[0] != 0x02 && compressed[0] != 0x03 {
            return Err(Error::MalformedEncoding(
                "key is not a compressed SEC1 point".into(),
            ));
        }
        Ok(Self {
            key_type,
            compressed,
        })
    }

    pub fn from_did_key(s: &str) -> Result<Self> {
        let multibase = s
            .strip_prefix(DID_KEY_PREFIX)
            .ok_or_else(|| Error::MalformedEncoding(format!("not a did:key: {s}")))?;
        // did:key only uses base58-btc, which multibase identifies with 'z'
        let encoded = multibase.strip_prefix('z').ok_or_else(|| {
            Error::MalformedEncoding(format!("expected base58-btc multibase in {s}"))
        })?;
        let decoded = bs58::decode(encoded)
            .with_alphabet(bs58::Alphabet::BITCOIN)
            .into_vec()
            .map_err(|e| Error::MalformedEncoding(e.to_string()))?;
        if decoded.len() < 2 {
            return Err(Error::MalformedEncoding(format!("truncated did:key {s}")));
        }
        let (prefix, key) = decoded.split_at(2);
        let key_type = KeyType::from_multicodec(prefix).ok_or_else(|| {
            Error::MalformedEncoding(format!("unsupported key type {}", hex::encode(prefix)))
        })?;
        Self::from_compressed(key_type, key)
    }

    pub fn to_did_key(&self) -> String {
        let mut raw = Vec::with_capacity(2 + COMPRESSED_KEY_LEN);
        raw.extend_from_slice(&self.key_type.multicodec());
        raw.extend_from_slice(&self.compressed);
        format!(
            "{DID_KEY_PREFIX}z{}",
            bs58::encode(raw)
                .with_alphabet(bs58::Alphabet::BITCOIN)
                .into_string()
        )
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.compressed
    }

    /// ECDSA over SHA-256 of `msg`.
    ///
    /// `Ok(false)` for a signature made by another key, a high-S
    ///  signature, scalars outside this curve's order or a key that is
    ///  not on the curve. Only a length other than 64 bytes is
    ///  [`Error::InvalidSignatureBytes`].
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> Result<bool> {
        if sig.len() != SIGNATURE_LEN {
            return Err(Error::InvalidSignatureBytes);
        }
        match self.key_type {
            KeyType::Secp256k1 => {
                use k256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
                let Ok(sig) = Signature::from_slice(sig) else {
                    return Ok(false);
                };
                if sig.normalize_s().is_some() {
                    return Ok(false);
                }
                let Ok(vk) = VerifyingKey::from_sec1_bytes(&self.compressed) else {
                    tracing::warn!(key = %self, "rotation key is not a secp256k1 point");
                    return Ok(false);
                };
                Ok(vk.verify(msg, &sig).is_ok())
            }
            KeyType::P256 => {
                use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
                let Ok(sig) = Signature::from_slice(sig) else {
                    return Ok(false);
                };
                if sig.normalize_s().is_some() {
                    return Ok(false);
                }
                let Ok(vk) = VerifyingKey::from_sec1_bytes(&self.compressed) else {
                    tracing::warn!(key = %self, "rotation key is not a P-256 point");
                    return Ok(false);
                };
                Ok(vk.verify(msg, &sig).is_ok())
            }
        }
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_did_key().fmt(f)
    }
}

impl std::str::FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_did_key(s)
    }
}
