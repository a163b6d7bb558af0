//! The audit log: chain-linking, signing, and verification on top of an
//! [`AuditStorage`] backend.

use std::sync::Arc;
use std::sync::RwLock;

use warden_core::AuditEntryId;
use warden_crypto::KeyPair;

use crate::entry::{AuditEntry, NewAuditEntry};
use crate::error::{AuditError, AuditResult};
use crate::storage::{AuditStorage, SurrealKvAuditStorage};

/// Filter parameters for [`AuditLog::query`] (spec.md §4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditQuery<'a> {
    /// Identity whose chain to search.
    pub identity: &'a str,
    /// Restrict to entries whose `action` equals this string.
    pub action: Option<&'a str>,
    /// Restrict to entries of this category.
    pub category: Option<crate::entry::AuditCategory>,
    /// Restrict to entries at or after this timestamp.
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    /// Maximum number of entries to return.
    pub limit: usize,
}

impl<'a> AuditQuery<'a> {
    /// Start a query for `identity` with an unbounded limit.
    #[must_use]
    pub const fn for_identity(identity: &'a str) -> Self {
        Self {
            identity,
            action: None,
            category: None,
            since: None,
            limit: usize::MAX,
        }
    }

    /// Restrict to a specific action.
    #[must_use]
    pub const fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Restrict to a specific category.
    #[must_use]
    pub const fn category(mut self, category: crate::entry::AuditCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Restrict to entries at or after `since`.
    #[must_use]
    pub const fn since(mut self, since: chrono::DateTime<chrono::Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(category) = self.category {
            if entry.category != category {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp.0 < since {
                return false;
            }
        }
        true
    }
}

/// A single detected problem in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainIssue {
    /// An entry's signature does not verify against its own contents.
    InvalidSignature {
        /// The offending entry.
        entry_id: AuditEntryId,
    },
    /// An entry does not chain from its claimed predecessor.
    BrokenLink {
        /// The offending entry.
        entry_id: AuditEntryId,
        /// The entry it was expected to follow.
        expected_previous: AuditEntryId,
    },
}

impl std::fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSignature { entry_id } => {
                write!(f, "entry {entry_id} has an invalid signature")
            },
            Self::BrokenLink {
                entry_id,
                expected_previous,
            } => write!(
                f,
                "entry {entry_id} does not follow expected predecessor {expected_previous}"
            ),
        }
    }
}

/// Result of verifying an identity's audit chain.
#[derive(Debug, Clone)]
pub struct ChainVerificationResult {
    /// Whether the whole chain is valid.
    pub valid: bool,
    /// Every issue found, in chain order. Empty iff `valid`.
    pub issues: Vec<ChainIssue>,
    /// Number of entries examined.
    pub entries_checked: usize,
}

/// Builder for a [`NewAuditEntry`], attached to a log so `.record()` can
/// append directly without a separate `log.append(builder.build())` step.
pub struct AuditBuilder<'a> {
    log: &'a AuditLog,
    new_entry: NewAuditEntry,
}

impl<'a> AuditBuilder<'a> {
    fn new(log: &'a AuditLog, new_entry: NewAuditEntry) -> Self {
        Self { log, new_entry }
    }

    /// Attach a plugin name.
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.new_entry = self.new_entry.with_plugin(plugin);
        self
    }

    /// Attach a structured detail payload.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.new_entry = self.new_entry.with_details(details);
        self
    }

    /// Record how long the action took.
    #[must_use]
    pub const fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.new_entry = self.new_entry.with_duration_ms(duration_ms);
        self
    }

    /// Append the built entry to the chain.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the entry fails.
    pub fn record(self) -> AuditResult<AuditEntryId> {
        self.log.append(self.new_entry)
    }
}

/// The audit log.
///
/// Wraps an [`AuditStorage`] backend with chain-linking and signing.
/// Every identity has its own chain: the first entry for an identity
/// links to [`warden_crypto::ContentHash::zero`], and every subsequent
/// entry links to the content hash of the previous entry for that same
/// identity.
pub struct AuditLog {
    storage: Arc<dyn AuditStorage>,
    runtime_key: Arc<KeyPair>,
    // Serializes append() so two concurrent writers for the same identity
    // cannot both read the same chain head and double-link.
    append_lock: RwLock<()>,
}

impl AuditLog {
    /// Create a log backed by the given storage and runtime signing key.
    #[must_use]
    pub fn new(storage: Arc<dyn AuditStorage>, runtime_key: Arc<KeyPair>) -> Self {
        Self {
            storage,
            runtime_key,
            append_lock: RwLock::new(()),
        }
    }

    /// Create an in-memory log with a freshly generated signing key, for
    /// tests and short-lived processes that don't need durability.
    #[must_use]
    pub fn in_memory(runtime_key: Arc<KeyPair>) -> Self {
        Self::new(Arc::new(SurrealKvAuditStorage::in_memory()), runtime_key)
    }

    /// Start building an entry for a successful action.
    pub fn success(
        &self,
        identity: impl Into<String>,
        category: crate::entry::AuditCategory,
        action: impl Into<String>,
    ) -> AuditBuilder<'_> {
        AuditBuilder::new(self, NewAuditEntry::success(identity, category, action))
    }

    /// Start building an entry for a failed action.
    pub fn failure(
        &self,
        identity: impl Into<String>,
        category: crate::entry::AuditCategory,
        action: impl Into<String>,
        error: impl Into<String>,
    ) -> AuditBuilder<'_> {
        AuditBuilder::new(self, NewAuditEntry::failure(identity, category, action, error))
    }

    /// Append a new entry to its identity's chain, signing it with the
    /// runtime key.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the current chain head or persisting
    /// the new entry fails.
    pub fn append(&self, new_entry: NewAuditEntry) -> AuditResult<AuditEntryId> {
        let _guard = self
            .append_lock
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let previous_hash = match self.storage.get_chain_head(&new_entry.identity)? {
            Some(head_id) => {
                let head = self.storage.get(&head_id)?.ok_or_else(|| {
                    AuditError::EntryNotFound {
                        entry_id: head_id.to_string(),
                    }
                })?;
                head.content_hash()
            },
            None => warden_crypto::ContentHash::zero(),
        };

        let entry = AuditEntry::create(new_entry, previous_hash, &self.runtime_key);
        let entry_id = entry.id.clone();
        self.storage.store(&entry)?;
        Ok(entry_id)
    }

    /// Fetch an entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn get(&self, id: &AuditEntryId) -> AuditResult<Option<AuditEntry>> {
        self.storage.get(id)
    }

    /// Fetch every entry for an identity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn entries_for_identity(&self, identity: &str) -> AuditResult<Vec<AuditEntry>> {
        self.storage.get_identity_entries(identity)
    }

    /// Fetch every entry across all identities within a time range, sorted
    /// by timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn entries_in_range(
        &self,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> AuditResult<Vec<AuditEntry>> {
        self.storage.get_entries_in_range(start, end)
    }

    /// Verify the signature and chain-linkage of every entry in an
    /// identity's chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails while reading entries.
    /// A broken chain is reported in the returned
    /// [`ChainVerificationResult`], not as an `Err`.
    pub fn verify_chain(&self, identity: &str) -> AuditResult<ChainVerificationResult> {
        let entries = self.storage.get_identity_entries(identity)?;
        let mut issues = Vec::new();

        for (i, entry) in entries.iter().enumerate() {
            if entry.verify_signature().is_err() {
                issues.push(ChainIssue::InvalidSignature {
                    entry_id: entry.id.clone(),
                });
            }

            if i == 0 {
                if entry.previous_hash != warden_crypto::ContentHash::zero() {
                    issues.push(ChainIssue::BrokenLink {
                        entry_id: entry.id.clone(),
                        expected_previous: entry.id.clone(),
                    });
                }
            } else {
                let previous = &entries[i - 1];
                if !entry.follows(previous) {
                    issues.push(ChainIssue::BrokenLink {
                        entry_id: entry.id.clone(),
                        expected_previous: previous.id.clone(),
                    });
                }
            }
        }

        Ok(ChainVerificationResult {
            valid: issues.is_empty(),
            issues,
            entries_checked: entries.len(),
        })
    }

    /// Total number of entries across all identities.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn count(&self) -> AuditResult<usize> {
        self.storage.count()
    }

    /// Query an identity's chain with the filters from spec.md §4.4:
    /// optional `action`, optional `category`, optional `since`, and a
    /// result cap. Entries are returned newest-first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn query(&self, filter: AuditQuery<'_>) -> AuditResult<Vec<AuditEntry>> {
        let mut entries = self.storage.get_identity_entries(filter.identity)?;
        entries.reverse();

        entries.retain(|entry| filter.matches(entry));
        entries.truncate(filter.limit);
        Ok(entries)
    }

    /// Count entries for an identity matching `action`/`since`, per
    /// spec.md §4.4's `count(action?, since?)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn count_matching(&self, identity: &str, action: Option<&str>, since: Option<chrono::DateTime<chrono::Utc>>) -> AuditResult<usize> {
        let filter = AuditQuery {
            identity,
            action,
            category: None,
            since,
            limit: usize::MAX,
        };
        Ok(self
            .storage
            .get_identity_entries(identity)?
            .iter()
            .filter(|entry| filter.matches(entry))
            .count())
    }

    /// Every identity with at least one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn identities(&self) -> AuditResult<Vec<String>> {
        self.storage.list_identities()
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditCategory;

    fn test_log() -> AuditLog {
        AuditLog::in_memory(Arc::new(KeyPair::generate()))
    }

    #[test]
    fn test_append_and_get() {
        let log = test_log();
        let id = log
            .success("luma", AuditCategory::System, "orchestrator.start")
            .record()
            .unwrap();

        let entry = log.get(&id).unwrap().unwrap();
        assert_eq!(entry.identity, "luma");
        assert_eq!(entry.action, "orchestrator.start");
    }

    #[test]
    fn test_chain_links_successive_entries() {
        let log = test_log();
        log.success("luma", AuditCategory::System, "orchestrator.start")
            .record()
            .unwrap();
        log.success("luma", AuditCategory::Pipeline, "chat.pipeline.run")
            .record()
            .unwrap();
        log.success("luma", AuditCategory::Pipeline, "chat.pipeline.run")
            .record()
            .unwrap();

        let result = log.verify_chain("luma").unwrap();
        assert!(result.valid);
        assert_eq!(result.entries_checked, 3);
    }

    #[test]
    fn test_verify_chain_detects_tampering() {
        let log = test_log();
        let id = log
            .success("luma", AuditCategory::System, "orchestrator.start")
            .record()
            .unwrap();
        log.success("luma", AuditCategory::Pipeline, "chat.pipeline.run")
            .record()
            .unwrap();

        // Simulate tampering by storing a mutated copy of the first entry
        // directly through the storage layer, bypassing the log.
        let mut tampered = log.get(&id).unwrap().unwrap();
        tampered.action = "tampered".to_string();
        log.storage.store(&tampered).unwrap();

        let result = log.verify_chain("luma").unwrap();
        assert!(!result.valid);
        assert!(!result.issues.is_empty());
    }

    #[test]
    fn test_identities_are_independent_chains() {
        let log = test_log();
        log.success("luma", AuditCategory::System, "orchestrator.start")
            .record()
            .unwrap();
        log.success("nyx", AuditCategory::System, "orchestrator.start")
            .record()
            .unwrap();

        assert_eq!(log.entries_for_identity("luma").unwrap().len(), 1);
        assert_eq!(log.entries_for_identity("nyx").unwrap().len(), 1);
        assert_eq!(log.identities().unwrap().len(), 2);
    }

    #[test]
    fn test_query_filters_by_action_and_limit() {
        let log = test_log();
        log.success("luma", AuditCategory::System, "orchestrator.start")
            .record()
            .unwrap();
        log.success("luma", AuditCategory::Pipeline, "chat.pipeline.run")
            .record()
            .unwrap();
        log.success("luma", AuditCategory::Pipeline, "chat.pipeline.run")
            .record()
            .unwrap();

        let filtered = log
            .query(AuditQuery::for_identity("luma").action("chat.pipeline.run"))
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|e| e.action == "chat.pipeline.run"));

        let limited = log
            .query(AuditQuery::for_identity("luma").limit(1))
            .unwrap();
        assert_eq!(limited.len(), 1);

        assert_eq!(
            log.count_matching("luma", Some("chat.pipeline.run"), None)
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_builder_attaches_details_and_duration() {
        let log = test_log();
        let id = log
            .success("luma", AuditCategory::Plugin, "plugin.tick")
            .with_plugin("weather")
            .with_details(serde_json::json!({"city": "Boston"}))
            .with_duration_ms(42)
            .record()
            .unwrap();

        let entry = log.get(&id).unwrap().unwrap();
        assert_eq!(entry.plugin.as_deref(), Some("weather"));
        assert_eq!(entry.duration_ms, 42);
    }
}
