use thiserror::Error;

/// Caller-facing errors from the payment service.
///
/// Everything here is rejected before (or instead of) a state transition;
/// ledger-level anomalies never surface as errors, they are classified into
/// the verification result instead.
#[derive(Error, Debug)]
pub enum PayError {
    #[error("Missing settlement reference")]
    MissingReference,

    #[error("Payment request not found: {0}")]
    RecordNotFound(String),

    #[error("Payment request already exists: {0}")]
    DuplicateSession(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, PayError>;

/// Classified reason a verification did not confirm.
///
/// Only `AmountMismatch` is proof of non-payment; the others are transient
/// or caller errors and must not drive a record to `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    #[error("Missing settlement reference")]
    MissingReference,

    #[error("Received {received} below expected {expected}")]
    AmountMismatch { received: u64, expected: u64 },

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

impl VerifyFailure {
    /// Transient failures leave the record `Pending`; the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LedgerUnavailable(_))
    }
}
