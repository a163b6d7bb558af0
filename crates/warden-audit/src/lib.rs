//! Warden Audit - Chain-linked cryptographic audit logging.
//!
//! This crate provides:
//! - Cryptographically signed audit entries
//! - Chain-linked entries (each contains the hash of the previous)
//! - Persistent storage with `SurrealKV`
//! - Chain integrity verification
//!
//! # Security Model
//!
//! Every audit entry is:
//! - Signed by the runtime's ed25519 key
//! - Linked to the previous entry for the same identity via content hash
//! - Timestamped
//! - Indexed by identity
//!
//! The chain linking provides tamper evidence: any modification to a
//! historical entry breaks the chain and is detectable by
//! [`AuditLog::verify_chain`].
//!
//! # Example
//!
//! ```
//! use warden_audit::{AuditLog, AuditCategory};
//! use warden_crypto::KeyPair;
//! use std::sync::Arc;
//!
//! let runtime_key = Arc::new(KeyPair::generate());
//! let log = AuditLog::in_memory(runtime_key);
//!
//! let entry_id = log
//!     .success("luma", AuditCategory::System, "orchestrator.start")
//!     .record()
//!     .unwrap();
//!
//! let result = log.verify_chain("luma").unwrap();
//! assert!(result.valid);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod entry;
mod error;
mod log;
mod storage;

pub use entry::{AuditCategory, AuditEntry, NewAuditEntry};
pub use error::{AuditError, AuditResult};
pub use log::{AuditBuilder, AuditLog, AuditQuery, ChainIssue, ChainVerificationResult};
pub use storage::{AuditStorage, SurrealKvAuditStorage};

// Re-export for convenience so callers don't need a direct warden-core
// dependency just to name entry IDs.
pub use warden_core::AuditEntryId;
