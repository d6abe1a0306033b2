use serde_cbor::Error as CborError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),
    #[error("unknown operation type {0:?}")]
    UnknownOperationType(String),
    #[error("operation log is empty")]
    EmptyLog,
    #[error("first log entry is not a genesis operation")]
    NotGenesis,
    #[error("prev does not reference the preceding operation")]
    BrokenChain,
    #[error("signature does not verify against any authorized rotation key")]
    UnauthorizedSigner,
    #[error("signature bytes are not a valid compact ECDSA signature")]
    InvalidSignatureBytes,
    #[error("operation appended after a tombstone")]
    TombstoneExtended,
    #[error("DID does not match the genesis operation")]
    DidMismatch,
    #[error("type id does not match the first input")]
    TypeIdMismatch,
    #[error("unexpected number of input or output cells")]
    CardinalityViolation,
    #[error("transferredFrom can't be changed once set")]
    ImmutableFieldChanged,
    #[error("history of {history} operations needs {} signing keys, got {signing_keys}", .history + 1)]
    HistoryLengthMismatch { history: usize, signing_keys: usize },
    #[error("key index {index} out of range for {len} rotation keys")]
    KeyIndexOutOfRange { index: usize, len: usize },
    #[error("cycle budget of {limit} exceeded")]
    CycleBudgetExceeded { limit: u64 },
    #[error("authorization witness is missing")]
    MissingWitness,
    #[error("script args carry an unknown operation")]
    InvalidScriptArgs,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<CborError> for Error {
    fn from(e: CborError) -> Self {
        Error::MalformedEncoding(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl Error {
    /// Non-zero exit code reported by a validator that rejects.
    pub fn error_code(&self) -> i8 {
        match self {
            // encoding errors start from 31
            Error::MalformedEncoding(_) => 31,
            Error::UnknownOperationType(_) => 32,
            Error::InvalidSignatureBytes => 33,
            Error::InvalidScriptArgs => 34,
            // log errors start from 41
            Error::EmptyLog => 41,
            Error::NotGenesis => 42,
            Error::BrokenChain => 43,
            Error::UnauthorizedSigner => 44,
            Error::TombstoneExtended => 45,
            Error::DidMismatch => 46,
            Error::HistoryLengthMismatch { .. } => 47,
            Error::KeyIndexOutOfRange { .. } => 48,
            // transition errors start from 51
            Error::CardinalityViolation => 51,
            Error::ImmutableFieldChanged => 52,
            Error::TypeIdMismatch => 53,
            Error::MissingWitness => 54,
            Error::CycleBudgetExceeded { .. } => 55,
            Error::InvalidConfig(_) => 61,
        }
    }
}
