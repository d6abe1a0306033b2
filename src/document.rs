use crate::operation::{OperationKind, Service, SignedOperation};
use serde::Serialize;
use std::collections::BTreeMap;

pub const ATPROTO_VERIFICATION_METHOD: &str = "atproto";
pub const ATPROTO_PDS_KIND: &str = "atproto_pds";
pub const ATPROTO_PDS_TYPE: &str = "AtprotoPersonalDataServer";

/// State of a DID after folding its log.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub did: String,
    pub rotation_keys: Vec<String>,
    pub verification_methods: BTreeMap<String, String>,
    pub also_known_as: Vec<String>,
    pub services: BTreeMap<String, Service>,
}

/// Outcome of a valid log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogState {
    Active(Document),
    /// Permanently retired, there is no document.
    Tombstoned { did: String },
}

impl LogState {
    pub fn did(&self) -> &str {
        match self {
            Self::Active(doc) => &doc.did,
            Self::Tombstoned { did } => did,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Active(doc) => Some(doc),
            Self::Tombstoned { .. } => None,
        }
    }
}

pub(crate) fn ensure_prefix(value: &str, prefix: &str) -> String {
    if value.starts_with(prefix) {
        value.to_string()
    } else {
        format!("{prefix}{value}")
    }
}

impl Document {
    /// Document described by `op`, `None` for a tombstone.
    /// Legacy creates are normalized to the current shape.
    pub fn from_operation(did: impl Into<String>, op: &SignedOperation) -> Option<Self> {
        let did = did.into();
        match op.kind() {
            OperationKind::Operation(op) => Some(Self {
                did,
                rotation_keys: op.rotation_keys.clone(),
                verification_methods: op.verification_methods.clone(),
                also_known_as: op.also_known_as.clone(),
                services: op.services.clone(),
            }),
            OperationKind::LegacyCreate(legacy) => Some(Self {
                did,
                rotation_keys: vec![legacy.signing_key.clone(), legacy.recovery_key.clone()],
                verification_methods: BTreeMap::from([(
                    ATPROTO_VERIFICATION_METHOD.to_string(),
                    legacy.signing_key.clone(),
                )]),
                also_known_as: vec![ensure_prefix(&legacy.handle, "at://")],
                services: BTreeMap::from([(
                    ATPROTO_PDS_KIND.to_string(),
                    Service {
                        kind: ATPROTO_PDS_TYPE.to_string(),
                        endpoint: ensure_prefix(&legacy.service, "https://"),
                    },
                )]),
            }),
            OperationKind::Tombstone(_) => None,
        }
    }

    pub fn atproto_key(&self) -> Option<&str> {
        self.verification_methods
            .get(ATPROTO_VERIFICATION_METHOD)
            .map(String::as_str)
    }

    pub fn pds_endpoint(&self) -> Option<&str> {
        self.services
            .get(ATPROTO_PDS_KIND)
            .map(|s| s.endpoint.as_str())
    }

    pub fn handle(&self) -> Option<&str> {
        self.also_known_as
            .first()
            .map(|aka| aka.strip_prefix("at://").unwrap_or(aka))
    }
}
