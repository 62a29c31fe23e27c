//! TipRail Verification
//!
//! The verification and anchoring core:
//!
//! 1. **Verification Engine**: decides whether a claimed settlement actually
//!    transferred at least the expected amount to the expected recipient,
//!    using balance deltas as primary evidence and parsed transfer
//!    instructions as explicitly weaker fallback evidence.
//! 2. **Digest & Anchor Service**: computes a deterministic audit digest of a
//!    settled payment and best-effort anchors it on the ledger as a memo.
//! 3. **Payment Record Store**: the atomic conditional-transition interface
//!    the core requires; lifecycle correctness under concurrent, redundant
//!    verification calls rests entirely on it.
//! 4. **PaymentService**: the facade the host system calls.

mod anchor;
mod digest;
mod engine;
mod service;
mod store;

pub use anchor::AnchorService;
pub use digest::{canonical_digest, compute_digest};
pub use engine::{to_atomic, VerificationEngine};
pub use service::{PaymentPayload, PaymentService, TipSplit};
pub use store::{MemoryStore, PaymentStore, StoreError};
