use super::{
    cid::{self, BinaryDid},
    keys::PublicKey,
    operation::{OperationKind, SignedOperation},
};

impl SignedOperation {
    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
    pub fn prev(&self) -> Option<&str> {
        match &self.kind {
            OperationKind::Operation(op) => op.prev.as_deref(),
            OperationKind::Tombstone(t) => Some(&t.prev),
            OperationKind::LegacyCreate(op) => op.prev.as_deref(),
        }
    }
    pub fn is_genesis(&self) -> bool {
        !self.is_tombstone() && self.prev().is_none()
    }
    pub fn is_tombstone(&self) -> bool {
        matches!(self.kind, OperationKind::Tombstone(_))
    }
    pub fn is_legacy(&self) -> bool {
        matches!(self.kind, OperationKind::LegacyCreate(_))
    }
    /// Rotation keys handed to the successor, empty for a tombstone.
    pub fn rotation_keys(&self) -> &[PublicKey] {
        &self.authorities
    }
    pub fn cid(&self) -> &str {
        &self.cid
    }
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }
    /// Only meaningful for a genesis operation.
    pub fn binary_did(&self) -> BinaryDid {
        cid::binary_did_from_digest(&self.digest)
    }
    pub fn did(&self) -> String {
        cid::did_from_binary(&self.binary_did())
    }
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }
    pub fn signing_bytes(&self) -> &[u8] {
        &self.unsigned
    }
    pub fn signature(&self) -> &[u8] {
        &self.sig
    }
}
