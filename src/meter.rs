use crate::{keys::KeyType, Error, Result};

/// Cycle costs charged by the validators.
/// Calibrated so that a genesis listing 5 P-256 rotation keys, signed by
///  the lowest ranked one, stays below 26M cycles.
///
pub mod cost {
    pub const DECODE_BASE: u64 = 40_000;
    pub const DECODE_PER_BYTE: u64 = 120;
    pub const SHA256_PER_BLOCK: u64 = 2_600;
    pub const BLAKE3_PER_CHUNK: u64 = 4_000;
    pub const SECP256K1_VERIFY: u64 = 3_600_000;
    pub const P256_VERIFY: u64 = 4_500_000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleMeter {
    consumed: u64,
    limit: u64,
}

impl CycleMeter {
    pub fn new(limit: u64) -> Self {
        Self { consumed: 0, limit }
    }

    pub fn unbounded() -> Self {
        Self::new(u64::MAX)
    }

    /// Adds `cycles` and fails once the total passes the limit.
    pub fn charge(&mut self, cycles: u64) -> Result<()> {
        self.consumed = self.consumed.saturating_add(cycles);
        if self.consumed > self.limit {
            tracing::warn!(
                consumed = self.consumed,
                limit = self.limit,
                "cycle budget exceeded"
            );
            return Err(Error::CycleBudgetExceeded { limit: self.limit });
        }
        Ok(())
    }

    pub fn charge_decode(&mut self, len: usize) -> Result<()> {
        self.charge(cost::DECODE_BASE + cost::DECODE_PER_BYTE * len as u64)
    }

    pub fn charge_sha256(&mut self, len: usize) -> Result<()> {
        // padding always adds at least one byte and the 8 byte length
        let blocks = (len as u64 + 9).div_ceil(64);
        self.charge(cost::SHA256_PER_BLOCK * blocks)
    }

    pub fn charge_blake3(&mut self, len: usize) -> Result<()> {
        let chunks = (len as u64).div_ceil(1024).max(1);
        self.charge(cost::BLAKE3_PER_CHUNK * chunks)
    }

    pub fn charge_verify(&mut self, key_type: KeyType) -> Result<()> {
        self.charge(match key_type {
            KeyType::Secp256k1 => cost::SECP256K1_VERIFY,
            KeyType::P256 => cost::P256_VERIFY,
        })
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }
}
