//! Convenience re-exports.
//!
//! ```
//! use warden_audit::prelude::*;
//! use warden_crypto::KeyPair;
//! use std::sync::Arc;
//!
//! let log = AuditLog::in_memory(Arc::new(KeyPair::generate()));
//! let entry_id = log
//!     .success("luma", AuditCategory::System, "orchestrator.start")
//!     .record()
//!     .unwrap();
//!
//! let result = log.verify_chain("luma").unwrap();
//! assert!(result.valid);
//! ```

pub use crate::{
    AuditBuilder, AuditCategory, AuditEntry, AuditError, AuditLog, AuditQuery, AuditResult,
    AuditStorage, ChainIssue, ChainVerificationResult, NewAuditEntry, SurrealKvAuditStorage,
};
