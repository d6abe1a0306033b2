//! Binding verifier.
//!
//! A binding cell is an identity of its own, unique through a type id
//!  derived from the transaction that created it. It may claim to be
//!  transferred from a `did:plc`; the claim is a staging identifier stored
//!  in the cell and backed, in every transaction that creates or updates the
//!  cell, by a witness that replays the DID's log and signs the transaction
//!  hash with one of its current rotation keys.

use crate::{
    cid::{self, BinaryDid},
    codec,
    config::Limits,
    meter::CycleMeter,
    operation::authorized_rank,
    processor::{decode_history, replay},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use tracing::{debug, warn};

/// Bytes of the type id carried at the start of the script args.
pub const TYPE_ID_LEN: usize = 20;
pub const STAGING_ID_PREFIX: &str = "web5:plc:";

const TYPE_ID_CONTEXT: &str = "did-plc-cell 2025-01-01 binding type id";

/// Versioned payload of a binding cell.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum BindingData {
    #[serde(rename = "v1")]
    V1(BindingDataV1),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BindingDataV1 {
    /// Opaque to this crate.
    pub document: ByteBuf,
    /// Staging identifier of the DID this identity is transferred from.
    /// Set at creation, never changed afterwards.
    pub transferred_from: Option<ByteBuf>,
}

impl BindingData {
    pub fn new(document: Vec<u8>, transferred_from: Option<Vec<u8>>) -> Self {
        Self::V1(BindingDataV1 {
            document: ByteBuf::from(document),
            transferred_from: transferred_from.map(ByteBuf::from),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode_canonical(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    pub fn document(&self) -> &[u8] {
        match self {
            Self::V1(v1) => &v1.document,
        }
    }

    pub fn transferred_from(&self) -> Option<&[u8]> {
        match self {
            Self::V1(v1) => v1.transferred_from.as_deref().map(|b| b.as_slice()),
        }
    }
}

/// Replay of a DID's log proving control over it.
///
/// Fields are declared in canonical key order, as they are encoded.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Signature over the transaction hash.
    pub sig: ByteBuf,
    /// Encoded operations, genesis first.
    pub history: Vec<ByteBuf>,
    /// One key index per history entry plus one for `sig`.
    pub signing_keys: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BindingWitness {
    pub transferred_from: Authorization,
}

impl BindingWitness {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode_canonical(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub tx_hash: [u8; 32],
    pub index: u32,
}

/// Cells of one binding script group, as loaded by the host.
#[derive(Debug, Clone, Copy)]
pub struct BindingTransition<'a> {
    /// Starts with the type id.
    pub script_args: &'a [u8],
    /// First input of the whole transaction.
    pub first_input: OutPoint,
    /// Index among all outputs of the first one carrying this script.
    pub output_index: u64,
    pub inputs: &'a [Vec<u8>],
    pub outputs: &'a [Vec<u8>],
    pub witness: Option<&'a [u8]>,
    /// Hash of the enclosing transaction, signed by the authorization.
    pub tx_hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOutcome {
    Created { transferred_from: Option<String> },
    Updated { transferred_from: Option<String> },
    Burned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingVerdict {
    pub outcome: BindingOutcome,
    pub cycles: u64,
}

/// Domain separated hash of the outpoint consumed by the creating
///  transaction; script args carry its first [`TYPE_ID_LEN`] bytes.
pub fn type_id(first_input: &OutPoint, output_index: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(TYPE_ID_CONTEXT);
    hasher.update(&first_input.tx_hash);
    hasher.update(&first_input.index.to_le_bytes());
    hasher.update(&output_index.to_le_bytes());
    *hasher.finalize().as_bytes()
}

pub fn staging_id_from_binary(did: &BinaryDid) -> Vec<u8> {
    let did = cid::did_from_binary(did);
    let suffix = &did[cid::DID_PLC_PREFIX.len()..];
    format!("{STAGING_ID_PREFIX}{suffix}").into_bytes()
}

/// Staging identifier of `did:plc:<suffix>`, computed off-chain when a
///  binding cell is created.
pub fn staging_id(did: &str) -> Result<Vec<u8>> {
    Ok(staging_id_from_binary(&cid::parse_did(did)?))
}

/// Replays `auth` and checks it ends in a signature of `message` by a
///  rotation key of the DID whose staging identifier is `transferred_from`.
/// Returns that DID.
pub fn verify_authorization(
    auth: &Authorization,
    transferred_from: &[u8],
    message: &[u8],
    limits: &Limits,
    meter: &mut CycleMeter,
) -> Result<String> {
    if auth.history.is_empty() {
        return Err(Error::EmptyLog);
    }
    if auth.signing_keys.len() != auth.history.len() + 1 {
        warn!(
            history = auth.history.len(),
            signing_keys = auth.signing_keys.len(),
            "history and signing keys disagree"
        );
        return Err(Error::HistoryLengthMismatch {
            history: auth.history.len(),
            signing_keys: auth.signing_keys.len(),
        });
    }
    let ops = decode_history(&auth.history, limits, meter)?;
    let genesis = &ops[0];
    if staging_id_from_binary(&genesis.binary_did()) != transferred_from {
        warn!(
            did = %genesis.did(),
            transferred_from = %String::from_utf8_lossy(transferred_from),
            "history belongs to another DID"
        );
        return Err(Error::DidMismatch);
    }
    let tail = &ops[ops.len() - 1];
    if tail.is_tombstone() {
        return Err(Error::TombstoneExtended);
    }
    replay(&ops, Some(&auth.signing_keys), meter)?;
    let last = auth.signing_keys[ops.len()];
    authorized_rank(tail.rotation_keys(), Some(last), message, &auth.sig, meter)?;
    Ok(genesis.did())
}

fn check_type_id(tx: &BindingTransition, meter: &mut CycleMeter) -> Result<()> {
    meter.charge_blake3(32 + 4 + 8)?;
    let expected = type_id(&tx.first_input, tx.output_index);
    let actual = &tx.script_args[..TYPE_ID_LEN];
    if actual != &expected[..TYPE_ID_LEN] {
        warn!(
            actual = hex::encode(actual),
            expected = hex::encode(&expected[..TYPE_ID_LEN]),
            "type id mismatched"
        );
        return Err(Error::TypeIdMismatch);
    }
    Ok(())
}

/// Validates one binding transition, all or nothing.
pub fn verify_binding_transition(
    tx: &BindingTransition,
    limits: &Limits,
) -> Result<BindingVerdict> {
    let mut meter = CycleMeter::new(limits.max_cycles);
    if tx.script_args.len() < TYPE_ID_LEN {
        return Err(Error::MalformedEncoding(format!(
            "script args of {} bytes can't hold a type id",
            tx.script_args.len()
        )));
    }
    // minting, transfer or burning, never more than one cell on each side
    if tx.inputs.len() > 1 || tx.outputs.len() > 1 || tx.inputs.len() + tx.outputs.len() == 0 {
        warn!(
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            "invalid cells"
        );
        return Err(Error::CardinalityViolation);
    }
    let prev = tx
        .inputs
        .first()
        .map(|data| {
            meter.charge_decode(data.len())?;
            BindingData::decode(data)
        })
        .transpose()?;
    let next = tx
        .outputs
        .first()
        .map(|data| {
            meter.charge_decode(data.len())?;
            BindingData::decode(data)
        })
        .transpose()?;
    let witness = tx
        .witness
        .map(|bytes| {
            meter.charge_decode(bytes.len())?;
            BindingWitness::decode(bytes)
        })
        .transpose()?;

    let outcome = match (prev, next) {
        (None, Some(next)) => {
            check_type_id(tx, &mut meter)?;
            let transferred_from =
                authorize(next.transferred_from(), witness.as_ref(), tx, limits, &mut meter)?;
            BindingOutcome::Created { transferred_from }
        }
        (Some(prev), Some(next)) => {
            if prev.transferred_from() != next.transferred_from() {
                warn!("transferredFrom changed");
                return Err(Error::ImmutableFieldChanged);
            }
            let transferred_from =
                authorize(next.transferred_from(), witness.as_ref(), tx, limits, &mut meter)?;
            BindingOutcome::Updated { transferred_from }
        }
        (Some(_), None) => BindingOutcome::Burned,
        (None, None) => return Err(Error::CardinalityViolation),
    };
    debug!(?outcome, cycles = meter.consumed(), "binding transition accepted");
    Ok(BindingVerdict {
        outcome,
        cycles: meter.consumed(),
    })
}

fn authorize(
    transferred_from: Option<&[u8]>,
    witness: Option<&BindingWitness>,
    tx: &BindingTransition,
    limits: &Limits,
    meter: &mut CycleMeter,
) -> Result<Option<String>> {
    let Some(transferred_from) = transferred_from else {
        return Ok(None);
    };
    let witness = witness.ok_or(Error::MissingWitness)?;
    verify_authorization(
        &witness.transferred_from,
        transferred_from,
        &tx.tx_hash,
        limits,
        meter,
    )
    .map(Some)
}
