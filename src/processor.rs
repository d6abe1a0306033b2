use crate::{
    config::Limits,
    document::{Document, LogState},
    meter::CycleMeter,
    operation::SignedOperation,
    Error, Result,
};

/// Folds a whole log into the state of its DID.
///
/// Every entry is decoded before any signature is checked, so a malformed
///  entry anywhere in the log is reported as such.
pub fn validate_log<B: AsRef<[u8]>>(log: &[B], limits: &Limits) -> Result<LogState> {
    let mut meter = CycleMeter::new(limits.max_cycles);
    validate_log_metered(log, limits, &mut meter)
}

pub fn validate_log_metered<B: AsRef<[u8]>>(
    log: &[B],
    limits: &Limits,
    meter: &mut CycleMeter,
) -> Result<LogState> {
    let ops = decode_history(log, limits, meter)?;
    replay(&ops, None, meter)?;
    let did = ops[0].did();
    let tail = &ops[ops.len() - 1];
    Ok(match Document::from_operation(did.clone(), tail) {
        Some(doc) => LogState::Active(doc),
        None => LogState::Tombstoned { did },
    })
}

/// Decodes a log and checks its shape: non empty, bounded, opened by a
///  genesis and closed by at most one tombstone.
pub(crate) fn decode_history<B: AsRef<[u8]>>(
    log: &[B],
    limits: &Limits,
    meter: &mut CycleMeter,
) -> Result<Vec<SignedOperation>> {
    if log.is_empty() {
        return Err(Error::EmptyLog);
    }
    if log.len() > limits.max_history_len {
        tracing::warn!(
            len = log.len(),
            max = limits.max_history_len,
            "history exceeds the replay bound"
        );
        return Err(Error::CycleBudgetExceeded {
            limit: meter.limit(),
        });
    }
    let ops = log
        .iter()
        .map(|bytes| SignedOperation::decode(bytes.as_ref(), limits, meter))
        .collect::<Result<Vec<_>>>()?;
    if !ops[0].is_genesis() {
        return Err(Error::NotGenesis);
    }
    if ops[..ops.len() - 1].iter().any(SignedOperation::is_tombstone) {
        return Err(Error::TombstoneExtended);
    }
    Ok(ops)
}

/// Checks the genesis self-signature and every link of `ops`, returning
///  the rank of each signer.
///
/// `signing_keys[i]`, when given, selects the key expected to have signed
///  entry `i`; extra trailing entries are ignored.
pub(crate) fn replay(
    ops: &[SignedOperation],
    signing_keys: Option<&[u8]>,
    meter: &mut CycleMeter,
) -> Result<Vec<usize>> {
    let hint = |i: usize| signing_keys.and_then(|keys| keys.get(i).copied());
    let genesis = ops.first().ok_or(Error::EmptyLog)?;
    let mut ranks = Vec::with_capacity(ops.len());
    ranks.push(genesis.verify_genesis(hint(0), meter)?);
    for (i, pair) in ops.windows(2).enumerate() {
        ranks.push(pair[0].verify_successor(&pair[1], hint(i + 1), meter)?);
    }
    Ok(ranks)
}

/// Picks the canonical successor of `pred` among operations that all claim
///  it as `prev`.
///
/// The candidate signed by the highest ranked rotation key of `pred` wins;
///  on equal rank the earlier candidate is kept. Candidates that don't
///  validly extend `pred` are ignored; if none does, the first rejection is
///  returned.
pub fn canonical_successor<'a>(
    pred: &SignedOperation,
    candidates: &'a [SignedOperation],
    limits: &Limits,
    meter: &mut CycleMeter,
) -> Result<&'a SignedOperation> {
    if candidates.len() > limits.max_history_len {
        return Err(Error::CycleBudgetExceeded {
            limit: meter.limit(),
        });
    }
    let mut best: Option<(usize, &SignedOperation)> = None;
    let mut rejection = None;
    for candidate in candidates {
        match pred.verify_successor(candidate, None, meter) {
            Ok(rank) => {
                if best.map_or(true, |(best_rank, _)| rank < best_rank) {
                    best = Some((rank, candidate));
                }
                if rank == 0 {
                    break;
                }
            }
            Err(e @ Error::CycleBudgetExceeded { .. }) => return Err(e),
            Err(e) => {
                tracing::debug!(cid = candidate.cid(), error = %e, "fork candidate rejected");
                rejection.get_or_insert(e);
            }
        }
    }
    match best {
        Some((_, winner)) => Ok(winner),
        None => Err(rejection.unwrap_or(Error::EmptyLog)),
    }
}
