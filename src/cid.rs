//! Content addressing of operations.
//!
//! No multibase/multihash crates: the only CID this crate ever produces is
//!  CIDv1, dag-cbor (0x71), sha2-256 (0x12, 32 bytes), base32 multibase.

use crate::{Error, Result};
use base32::Alphabet;
use sha2::{Digest, Sha256};

pub const DID_PLC_PREFIX: &str = "did:plc:";
/// Length of the method specific part of a `did:plc`.
pub const DID_SUFFIX_LEN: usize = 24;
/// 24 base32 characters carry exactly 15 bytes.
pub const BINARY_DID_LEN: usize = 15;

const CID_V1_DAG_CBOR_SHA256: [u8; 4] = [0x01, 0x71, 0x12, 0x20];
const BASE32: Alphabet = Alphabet::Rfc4648Lower { padding: false };

pub type BinaryDid = [u8; BINARY_DID_LEN];

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// CID string of an already hashed operation.
pub fn cid_from_digest(digest: &[u8; 32]) -> String {
    let mut raw = Vec::with_capacity(CID_V1_DAG_CBOR_SHA256.len() + digest.len());
    raw.extend_from_slice(&CID_V1_DAG_CBOR_SHA256);
    raw.extend_from_slice(digest);
    format!("b{}", base32::encode(BASE32, &raw))
}

pub fn cid_for(bytes: &[u8]) -> String {
    cid_from_digest(&sha256(bytes))
}

pub fn binary_did_from_digest(digest: &[u8; 32]) -> BinaryDid {
    let mut did = [0u8; BINARY_DID_LEN];
    did.copy_from_slice(&digest[..BINARY_DID_LEN]);
    did
}

pub fn did_from_binary(did: &BinaryDid) -> String {
    format!("{DID_PLC_PREFIX}{}", base32::encode(BASE32, did))
}

/// DID of the log whose genesis operation encodes to `genesis`.
pub fn did_for(genesis: &[u8]) -> String {
    did_from_binary(&binary_did_from_digest(&sha256(genesis)))
}

/// Parses `did:plc:<24 base32 chars>` into its 15 bytes.
pub fn parse_did(did: &str) -> Result<BinaryDid> {
    let suffix = did
        .strip_prefix(DID_PLC_PREFIX)
        .ok_or_else(|| Error::MalformedEncoding(format!("not a did:plc: {did}")))?;
    if suffix.len() != DID_SUFFIX_LEN {
        return Err(Error::MalformedEncoding(format!(
            "did:plc suffix must be {DID_SUFFIX_LEN} characters"
        )));
    }
    let decoded = base32::decode(BASE32, suffix)
        .ok_or_else(|| Error::MalformedEncoding(format!("invalid base32 in {did}")))?;
    let did: BinaryDid = decoded
        .as_slice()
        .try_into()
        .map_err(|_| Error::MalformedEncoding("did:plc suffix length".into()))?;
    // uppercase or trailing bits would decode to the same bytes
    if did_from_binary(&did) != format!("{DID_PLC_PREFIX}{suffix}") {
        return Err(Error::MalformedEncoding(format!(
            "non-canonical did:plc suffix {suffix}"
        )));
    }
    Ok(did)
}
