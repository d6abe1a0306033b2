use crate::{
    cid, codec,
    config::{Limits, MAX_ROTATION_KEYS},
    keys::{PublicKey, DID_KEY_PREFIX, SIGNATURE_LEN},
    meter::CycleMeter,
    Error, Result,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_cbor::{value::from_value, Value};
use std::collections::BTreeMap;

pub const TYPE_OPERATION: &str = "plc_operation";
pub const TYPE_TOMBSTONE: &str = "plc_tombstone";
pub const TYPE_LEGACY_CREATE: &str = "create";

const OPERATION_FIELDS: [&str; 7] = [
    "type",
    "rotationKeys",
    "verificationMethods",
    "alsoKnownAs",
    "services",
    "prev",
    "sig",
];
const TOMBSTONE_FIELDS: [&str; 3] = ["type", "prev", "sig"];
const LEGACY_CREATE_FIELDS: [&str; 7] = [
    "type",
    "signingKey",
    "recoveryKey",
    "handle",
    "service",
    "prev",
    "sig",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Service {
    #[serde(rename = "type")]
    pub kind: String,
    pub endpoint: String,
}

/// Regular operation: genesis when `prev` is absent, update otherwise.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlcOperation {
    /// Ranked by authority, index 0 is the highest.
    pub rotation_keys: Vec<String>,
    pub verification_methods: BTreeMap<String, String>,
    pub also_known_as: Vec<String>,
    pub services: BTreeMap<String, Service>,
    pub prev: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub prev: String,
}

/// Deprecated genesis format, self-signed by `signing_key`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCreate {
    pub signing_key: String,
    pub recovery_key: String,
    pub handle: String,
    pub service: String,
    pub prev: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Operation(PlcOperation),
    Tombstone(Tombstone),
    LegacyCreate(LegacyCreate),
}

impl OperationKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Operation(_) => TYPE_OPERATION,
            Self::Tombstone(_) => TYPE_TOMBSTONE,
            Self::LegacyCreate(_) => TYPE_LEGACY_CREATE,
        }
    }

    /// Keys this operation hands over to its successor, in rank order.
    fn authorities(&self, limits: &Limits) -> Result<Vec<PublicKey>> {
        match self {
            Self::Operation(op) => {
                if op.rotation_keys.is_empty() {
                    return Err(Error::MalformedEncoding("rotationKeys is empty".into()));
                }
                if op.rotation_keys.len() > limits.max_rotation_keys.min(MAX_ROTATION_KEYS) {
                    return Err(Error::MalformedEncoding(format!(
                        "{} rotation keys exceed the limit of {}",
                        op.rotation_keys.len(),
                        limits.max_rotation_keys
                    )));
                }
                for (i, key) in op.rotation_keys.iter().enumerate() {
                    if op.rotation_keys[..i].contains(key) {
                        return Err(Error::MalformedEncoding(format!(
                            "duplicate rotation key {key}"
                        )));
                    }
                }
                if let Some(method) = op
                    .verification_methods
                    .values()
                    .find(|m| !m.starts_with(DID_KEY_PREFIX))
                {
                    return Err(Error::MalformedEncoding(format!(
                        "verification method {method} is not a did:key"
                    )));
                }
                op.rotation_keys
                    .iter()
                    .map(|k| PublicKey::from_did_key(k))
                    .collect()
            }
            Self::Tombstone(_) => Ok(vec![]),
            // signing key ranks first, as it is the one that signed the genesis
            Self::LegacyCreate(op) => Ok(vec![
                PublicKey::from_did_key(&op.signing_key)?,
                PublicKey::from_did_key(&op.recovery_key)?,
            ]),
        }
    }
}

/// One entry of a DID's log as it was encoded on the wire.
///
/// Everything derived from the bytes is computed once at decode time:
///  the signing bytes (canonical map without `sig`), the digest the CID and
///  DID come from, and the parsed rotation keys.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOperation {
    pub(crate) kind: OperationKind,
    pub(crate) authorities: Vec<PublicKey>,
    pub(crate) encoded: Vec<u8>,
    pub(crate) unsigned: Vec<u8>,
    pub(crate) sig: Vec<u8>,
    pub(crate) digest: [u8; 32],
    pub(crate) cid: String,
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub(crate) fn decode_signature(sig: &str) -> Result<Vec<u8>> {
    let sig = URL_SAFE_NO_PAD
        .decode(sig)
        .map_err(|_| Error::InvalidSignatureBytes)?;
    if sig.len() != SIGNATURE_LEN {
        return Err(Error::InvalidSignatureBytes);
    }
    Ok(sig)
}

impl SignedOperation {
    /// Structural validation only, no signature is checked here.
    pub fn decode(bytes: &[u8], limits: &Limits, meter: &mut CycleMeter) -> Result<Self> {
        if bytes.len() > limits.max_operation_bytes {
            return Err(Error::MalformedEncoding(format!(
                "operation of {} bytes exceeds {}",
                bytes.len(),
                limits.max_operation_bytes
            )));
        }
        meter.charge_decode(bytes.len())?;
        let Value::Map(mut map) = codec::decode_canonical_value(bytes)? else {
            return Err(Error::MalformedEncoding("operation is not a map".into()));
        };
        if map.keys().any(|k| !matches!(k, Value::Text(_))) {
            return Err(Error::MalformedEncoding("operation keys must be text".into()));
        }
        let type_name = match map.get(&text("type")) {
            Some(Value::Text(t)) => t.clone(),
            _ => return Err(Error::MalformedEncoding("type must be text".into())),
        };
        let required: &[&str] = match type_name.as_str() {
            TYPE_OPERATION => &OPERATION_FIELDS,
            TYPE_TOMBSTONE => &TOMBSTONE_FIELDS,
            TYPE_LEGACY_CREATE => &LEGACY_CREATE_FIELDS,
            _ => return Err(Error::UnknownOperationType(type_name)),
        };
        if let Some(missing) = required.iter().find(|f| !map.contains_key(&text(f))) {
            return Err(Error::MalformedEncoding(format!(
                "{type_name} is missing {missing}"
            )));
        }
        let sig = match map.remove(&text("sig")) {
            Some(Value::Text(sig)) => decode_signature(&sig)?,
            _ => return Err(Error::InvalidSignatureBytes),
        };
        let unsigned_value = Value::Map(map);
        let unsigned = codec::encode(&unsigned_value)?;
        let kind = match type_name.as_str() {
            TYPE_OPERATION => OperationKind::Operation(from_value(unsigned_value)?),
            TYPE_TOMBSTONE => OperationKind::Tombstone(from_value(unsigned_value)?),
            _ => OperationKind::LegacyCreate(from_value(unsigned_value)?),
        };
        let authorities = kind.authorities(limits)?;
        meter.charge_sha256(bytes.len())?;
        let digest = cid::sha256(bytes);
        Ok(Self {
            kind,
            authorities,
            encoded: bytes.to_vec(),
            unsigned,
            sig,
            cid: cid::cid_from_digest(&digest),
            digest,
        })
    }

    /// Keys allowed to sign this operation when it opens a log.
    fn genesis_authorities(&self) -> Result<&[PublicKey]> {
        match &self.kind {
            OperationKind::Operation(op) if op.prev.is_none() => Ok(&self.authorities),
            OperationKind::LegacyCreate(op) if op.prev.is_none() => Ok(&self.authorities[..1]),
            _ => Err(Error::NotGenesis),
        }
    }

    /// Checks the self-signature of a genesis operation and returns the
    ///  rank of the key that produced it.
    pub fn verify_genesis(&self, hint: Option<u8>, meter: &mut CycleMeter) -> Result<usize> {
        let authorities = self.genesis_authorities()?;
        authorized_rank(authorities, hint, &self.unsigned, &self.sig, meter)
    }

    /// Checks that `next` extends `self`: its `prev` is our CID and it is
    ///  signed by one of our rotation keys. Returns the signer's rank.
    pub fn verify_successor(
        &self,
        next: &SignedOperation,
        hint: Option<u8>,
        meter: &mut CycleMeter,
    ) -> Result<usize> {
        if self.is_tombstone() {
            return Err(Error::TombstoneExtended);
        }
        if next.prev() != Some(self.cid.as_str()) || next.is_legacy() {
            tracing::warn!(
                expected = %self.cid,
                prev = ?next.prev(),
                "operation does not extend its predecessor"
            );
            return Err(Error::BrokenChain);
        }
        authorized_rank(&self.authorities, hint, &next.unsigned, &next.sig, meter)
    }
}

/// Rank of the key in `keys` that produced `sig` over `msg`.
///
/// With a `hint` only that key is tried, otherwise keys are tried from the
///  highest rank down so the first match is the best ranked signer.
///
pub(crate) fn authorized_rank(
    keys: &[PublicKey],
    hint: Option<u8>,
    msg: &[u8],
    sig: &[u8],
    meter: &mut CycleMeter,
) -> Result<usize> {
    if let Some(index) = hint {
        let index = index as usize;
        let key = keys.get(index).ok_or(Error::KeyIndexOutOfRange {
            index,
            len: keys.len(),
        })?;
        meter.charge_verify(key.key_type())?;
        return if key.verify(msg, sig)? {
            Ok(index)
        } else {
            Err(Error::UnauthorizedSigner)
        };
    }
    for (rank, key) in keys.iter().enumerate().take(MAX_ROTATION_KEYS) {
        meter.charge_verify(key.key_type())?;
        if key.verify(msg, sig)? {
            return Ok(rank);
        }
    }
    Err(Error::UnauthorizedSigner)
}
