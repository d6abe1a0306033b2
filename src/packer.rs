use crate::{
    codec,
    document::{
        ensure_prefix, Document, ATPROTO_PDS_KIND, ATPROTO_PDS_TYPE, ATPROTO_VERIFICATION_METHOD,
    },
    keys::SIGNATURE_LEN,
    operation::{LegacyCreate, OperationKind, PlcOperation, Service, SignedOperation, Tombstone},
    Error, Result,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_cbor::{value::to_value, Value};
use std::collections::BTreeMap;

/// Operation being assembled, everything but `sig`.
///
/// Signing happens outside of this crate: take [`signing_bytes`], sign
///  them with a rotation key (ECDSA over SHA-256, low-S, compact form) and
///  hand the signature to [`into_signed`].
///
/// [`signing_bytes`]: UnsignedOperation::signing_bytes
/// [`into_signed`]: UnsignedOperation::into_signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedOperation {
    kind: OperationKind,
}

impl UnsignedOperation {
    pub fn genesis(
        rotation_keys: Vec<String>,
        atproto_key: impl Into<String>,
        handle: &str,
        pds: &str,
    ) -> Self {
        Self {
            kind: OperationKind::Operation(PlcOperation {
                rotation_keys,
                verification_methods: BTreeMap::from([(
                    ATPROTO_VERIFICATION_METHOD.to_string(),
                    atproto_key.into(),
                )]),
                also_known_as: vec![ensure_prefix(handle, "at://")],
                services: BTreeMap::from([(
                    ATPROTO_PDS_KIND.to_string(),
                    Service {
                        kind: ATPROTO_PDS_TYPE.to_string(),
                        endpoint: ensure_prefix(pds, "https://"),
                    },
                )]),
                prev: None,
            }),
        }
    }

    pub fn legacy_create(
        signing_key: impl Into<String>,
        recovery_key: impl Into<String>,
        handle: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            kind: OperationKind::LegacyCreate(LegacyCreate {
                signing_key: signing_key.into(),
                recovery_key: recovery_key.into(),
                handle: handle.into(),
                service: service.into(),
                prev: None,
            }),
        }
    }

    /// Update carrying over the document of `prev`.
    pub fn update(prev: &SignedOperation) -> Result<Self> {
        let doc =
            Document::from_operation(String::new(), prev).ok_or(Error::TombstoneExtended)?;
        Ok(Self {
            kind: OperationKind::Operation(PlcOperation {
                rotation_keys: doc.rotation_keys,
                verification_methods: doc.verification_methods,
                also_known_as: doc.also_known_as,
                services: doc.services,
                prev: Some(prev.cid().to_string()),
            }),
        })
    }

    pub fn tombstone(prev: &SignedOperation) -> Result<Self> {
        if prev.is_tombstone() {
            return Err(Error::TombstoneExtended);
        }
        Ok(Self {
            kind: OperationKind::Tombstone(Tombstone {
                prev: prev.cid().to_string(),
            }),
        })
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    fn operation_mut(&mut self) -> Option<&mut PlcOperation> {
        match &mut self.kind {
            OperationKind::Operation(op) => Some(op),
            _ => None,
        }
    }

    // the setters below leave tombstones and legacy creates untouched

    pub fn with_handle(mut self, handle: &str) -> Self {
        if let Some(op) = self.operation_mut() {
            op.also_known_as = vec![ensure_prefix(handle, "at://")];
        }
        self
    }

    pub fn with_pds(mut self, pds: &str) -> Self {
        if let Some(op) = self.operation_mut() {
            op.services.insert(
                ATPROTO_PDS_KIND.to_string(),
                Service {
                    kind: ATPROTO_PDS_TYPE.to_string(),
                    endpoint: ensure_prefix(pds, "https://"),
                },
            );
        }
        self
    }

    pub fn with_atproto_key(mut self, key: impl Into<String>) -> Self {
        if let Some(op) = self.operation_mut() {
            op.verification_methods
                .insert(ATPROTO_VERIFICATION_METHOD.to_string(), key.into());
        }
        self
    }

    pub fn with_rotation_keys(mut self, keys: Vec<String>) -> Self {
        if let Some(op) = self.operation_mut() {
            op.rotation_keys = keys;
        }
        self
    }

    fn to_map(&self) -> Result<BTreeMap<Value, Value>> {
        let value = match &self.kind {
            OperationKind::Operation(op) => to_value(op)?,
            OperationKind::Tombstone(t) => to_value(t)?,
            OperationKind::LegacyCreate(op) => to_value(op)?,
        };
        let Value::Map(mut map) = value else {
            return Err(Error::MalformedEncoding("operation is not a map".into()));
        };
        map.insert(
            Value::Text("type".into()),
            Value::Text(self.kind.type_name().into()),
        );
        Ok(map)
    }

    /// Canonical encoding without `sig`, the message rotation keys sign.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        codec::encode(&Value::Map(self.to_map()?))
    }

    /// Canonical encoding of the signed operation.
    pub fn into_signed(self, sig: &[u8]) -> Result<Vec<u8>> {
        if sig.len() != SIGNATURE_LEN {
            return Err(Error::InvalidSignatureBytes);
        }
        let mut map = self.to_map()?;
        map.insert(
            Value::Text("sig".into()),
            Value::Text(URL_SAFE_NO_PAD.encode(sig)),
        );
        codec::encode(&Value::Map(map))
    }

    pub fn sign_with<F>(self, signer: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&[u8]) -> Vec<u8>,
    {
        let sig = signer(&self.signing_bytes()?);
        self.into_signed(&sig)
    }
}
