//! Payment record store interface
//!
//! The core never read-modify-writes a record. Status changes go through
//! `transition_if_pending`, an atomic conditional update, so two concurrent
//! verifications of the same session cannot both finalize it.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use tiprail_core::{PaymentRequest, PaymentStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate session: {0}")]
    DuplicateSession(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence interface the core requires from its host.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_by_session(&self, session: &str) -> Result<Option<PaymentRequest>>;

    /// Insert a new record; the session must be unused.
    async fn create(&self, request: PaymentRequest) -> Result<()>;

    /// Atomically apply `Pending -> status` and set the settlement
    /// reference, only if the record is still `Pending`. Returns whether the
    /// transition was applied. At most one call per session ever returns
    /// true.
    async fn transition_if_pending(
        &self,
        session: &str,
        status: PaymentStatus,
        settlement_ref: &str,
    ) -> Result<bool>;
}

/// In-memory store. Stands in for real persistence behind the trait; a
/// single lock makes the conditional transition atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, PaymentRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn find_by_session(&self, session: &str) -> Result<Option<PaymentRequest>> {
        let records = self.records.read().expect("store lock poisoned");
        Ok(records.get(session).cloned())
    }

    async fn create(&self, request: PaymentRequest) -> Result<()> {
        let mut records = self.records.write().expect("store lock poisoned");
        if records.contains_key(&request.session) {
            return Err(StoreError::DuplicateSession(request.session.clone()));
        }
        records.insert(request.session.clone(), request);
        Ok(())
    }

    async fn transition_if_pending(
        &self,
        session: &str,
        status: PaymentStatus,
        settlement_ref: &str,
    ) -> Result<bool> {
        // Pending is not a legal transition target
        if !status.is_terminal() {
            return Ok(false);
        }

        let mut records = self.records.write().expect("store lock poisoned");
        let Some(record) = records.get_mut(session) else {
            return Ok(false);
        };
        if record.status != PaymentStatus::Pending {
            debug!("Transition refused for {}: already {:?}", session, record.status);
            return Ok(false);
        }

        record.status = status;
        record.settlement_ref = Some(settlement_ref.to_string());
        Ok(true)
    }
}
