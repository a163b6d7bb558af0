//! Small factory helpers for in-memory collaborators.

use std::sync::Arc;

use warden_audit::AuditLog;
use warden_crypto::KeyPair;

/// An in-memory audit log with a freshly generated signing key, for tests
/// that need an [`AuditLog`] but not durability.
#[must_use]
pub fn in_memory_audit_log() -> AuditLog {
    AuditLog::in_memory(Arc::new(KeyPair::generate()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit::AuditCategory;

    #[test]
    fn in_memory_log_accepts_entries() {
        let log = in_memory_audit_log();
        let id = log
            .success("testy", AuditCategory::System, "test.fixture")
            .record()
            .expect("in-memory log never fails to append");
        assert!(log.get(&id).expect("lookup succeeds").is_some());
    }
}
