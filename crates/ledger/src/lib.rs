//! TipRail Ledger Client
//!
//! Thin capability wrapper over the Solana ledger:
//!
//! - fetch a transaction's parsed detail by reference, at confirmed-or-
//!   stronger commitment only
//! - submit a signed transaction and await its confirmation (anchor path)
//!
//! The client is injected as a trait so the verification engine never talks
//! to a module-level connection singleton; tests substitute
//! [`MockLedgerClient`] and run without network access. A transaction that
//! is not visible yet is an expected, retryable outcome (`Ok(None)`), never
//! a hard failure. Retry and backoff policy belong to the caller.

mod client;
mod mock;
mod types;

pub use client::{LedgerClient, RpcLedgerClient};
pub use mock::MockLedgerClient;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Deadline exceeded")]
    Timeout,

    #[error("Invalid transaction reference: {0}")]
    InvalidReference(String),

    #[error("Transaction decode error: {0}")]
    Decode(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Confirmation not reached for {0}")]
    Unconfirmed(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
