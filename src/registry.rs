//! Registry transition validator.
//!
//! One cell per DID carries the latest operation of its log. Every
//!  transaction touching that cell commits exactly one step of the log:
//!
//! * 0 input, 1 output: genesis, the output holds the genesis operation
//!   whose DID is the one bound in the script args;
//! * 1 input, 1 output: update or tombstone, the output extends the input;
//! * 1 input, 0 output: burn, the witness carries the tombstone that
//!   retires the DID, unless the input already holds one.
//!
//! Anything else would let one transaction commit two conflicting steps.

use crate::{
    cid::{self, BinaryDid, BINARY_DID_LEN},
    codec,
    config::Limits,
    meter::CycleMeter,
    operation::SignedOperation,
    Error, Result,
};
use arrayref::array_ref;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use tracing::{debug, warn};

pub const SCRIPT_ARGS_OP_DEFAULT: u8 = 1;
pub const SCRIPT_ARGS_LEN: usize = 1 + BINARY_DID_LEN;

/// Cells of one registry script group, as loaded by the host.
#[derive(Debug, Clone, Copy)]
pub struct RegistryTransition<'a> {
    /// `0x01 || binary DID`.
    pub script_args: &'a [u8],
    pub inputs: &'a [Vec<u8>],
    pub outputs: &'a [Vec<u8>],
    pub witness: Option<&'a [u8]>,
}

/// Optional witness of a registry transition.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryWitness {
    /// Signed tombstone, required to burn a live cell.
    pub operation: Option<ByteBuf>,
    /// Rank of the rotation key that signed the new operation.
    /// When absent every rotation key is tried in rank order.
    pub signing_key: Option<u8>,
}

impl RegistryWitness {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode_canonical(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOutcome {
    Genesis { did: String, signer: usize },
    Updated { signer: usize },
    Tombstoned { signer: usize },
    /// The cell is destroyed; `signer` is `None` when it already held a
    ///  tombstone.
    Burned { signer: Option<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryVerdict {
    pub outcome: RegistryOutcome,
    pub cycles: u64,
}

fn parse_args(args: &[u8]) -> Result<BinaryDid> {
    match args.first() {
        Some(&SCRIPT_ARGS_OP_DEFAULT) => {}
        Some(op) => {
            warn!(op, "invalid script op");
            return Err(Error::InvalidScriptArgs);
        }
        None => return Err(Error::InvalidScriptArgs),
    }
    if args.len() != SCRIPT_ARGS_LEN {
        return Err(Error::MalformedEncoding(format!(
            "script args of {} bytes, expected {SCRIPT_ARGS_LEN}",
            args.len()
        )));
    }
    Ok(*array_ref!(args, 1, BINARY_DID_LEN))
}

/// Validates one registry transition, all or nothing.
pub fn verify_registry_transition(
    tx: &RegistryTransition,
    limits: &Limits,
) -> Result<RegistryVerdict> {
    let mut meter = CycleMeter::new(limits.max_cycles);
    let did = parse_args(tx.script_args)?;
    if tx.inputs.len() > 1 || tx.outputs.len() > 1 || tx.outputs.len() + tx.inputs.len() == 0 {
        warn!(
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            "invalid cells"
        );
        return Err(Error::CardinalityViolation);
    }
    let witness = match tx.witness {
        Some(bytes) => {
            meter.charge_decode(bytes.len())?;
            RegistryWitness::decode(bytes)?
        }
        None => RegistryWitness::default(),
    };
    // decode everything before the first signature is checked
    let prev = tx
        .inputs
        .first()
        .map(|data| SignedOperation::decode(data, limits, &mut meter))
        .transpose()?;
    let next = tx
        .outputs
        .first()
        .map(|data| SignedOperation::decode(data, limits, &mut meter))
        .transpose()?;
    let witnessed = witness
        .operation
        .as_ref()
        .map(|data| SignedOperation::decode(data, limits, &mut meter))
        .transpose()?;

    let outcome = match (prev, next) {
        (None, Some(genesis)) => {
            if !genesis.is_genesis() {
                return Err(Error::NotGenesis);
            }
            check_did(&genesis, &did)?;
            let signer = genesis.verify_genesis(witness.signing_key, &mut meter)?;
            RegistryOutcome::Genesis {
                did: genesis.did(),
                signer,
            }
        }
        (Some(prev), Some(next)) => {
            if prev.is_genesis() {
                check_did(&prev, &did)?;
            }
            let signer = prev.verify_successor(&next, witness.signing_key, &mut meter)?;
            if next.is_tombstone() {
                RegistryOutcome::Tombstoned { signer }
            } else {
                RegistryOutcome::Updated { signer }
            }
        }
        (Some(prev), None) if prev.is_tombstone() => RegistryOutcome::Burned { signer: None },
        (Some(prev), None) => {
            let tombstone = match witnessed {
                Some(op) if op.is_tombstone() => op,
                _ => {
                    warn!("burning a live DID cell without a witnessed tombstone");
                    return Err(Error::CardinalityViolation);
                }
            };
            if prev.is_genesis() {
                check_did(&prev, &did)?;
            }
            let signer = prev.verify_successor(&tombstone, witness.signing_key, &mut meter)?;
            RegistryOutcome::Burned {
                signer: Some(signer),
            }
        }
        (None, None) => return Err(Error::CardinalityViolation),
    };
    debug!(
        did = %cid::did_from_binary(&did),
        ?outcome,
        cycles = meter.consumed(),
        "registry transition accepted"
    );
    Ok(RegistryVerdict {
        outcome,
        cycles: meter.consumed(),
    })
}

fn check_did(genesis: &SignedOperation, did: &BinaryDid) -> Result<()> {
    if genesis.binary_did() != *did {
        warn!(
            expected = hex::encode(did),
            actual = hex::encode(genesis.binary_did()),
            "DID mismatch"
        );
        return Err(Error::DidMismatch);
    }
    Ok(())
}
