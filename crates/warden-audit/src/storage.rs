//! Audit log storage trait and `SurrealKV`-based implementation.

use std::path::Path;
use std::sync::Arc;

use warden_core::AuditEntryId;
use warden_storage::{KvStore, MemoryKvStore, SurrealKvStore};

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Storage backend for audit logs.
///
/// Implementations must be thread-safe and support storing and retrieving
/// entries by ID, by identity, and by time range. There is deliberately no
/// `update` or `delete` — audit entries are append-only.
pub trait AuditStorage: Send + Sync {
    /// Store an audit entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be persisted.
    fn store(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// Get an entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    fn get(&self, id: &AuditEntryId) -> AuditResult<Option<AuditEntry>>;

    /// Get the chain head (latest entry ID) for an identity.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or parsing fails.
    fn get_chain_head(&self, identity: &str) -> AuditResult<Option<AuditEntryId>>;

    /// Get all entries for an identity, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    fn get_identity_entries(&self, identity: &str) -> AuditResult<Vec<AuditEntry>>;

    /// Get entries in a time range, across all identities, sorted by time.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    fn get_entries_in_range(
        &self,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> AuditResult<Vec<AuditEntry>>;

    /// Count total entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    fn count(&self) -> AuditResult<usize>;

    /// Count entries for an identity.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    fn count_identity(&self, identity: &str) -> AuditResult<usize>;

    /// List all identities that have at least one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    fn list_identities(&self) -> AuditResult<Vec<String>>;
}

// -- Namespace constants --

const NS_ENTRIES: &str = "audit:entries";
const NS_IDENTITY_INDEX: &str = "audit:identity_index";
const NS_CHAIN_HEADS: &str = "audit:chain_heads";

/// Run an async future synchronously.
///
/// `SurrealKV` operations are fast in-process (no network), so bridging
/// the sync [`AuditStorage`] trait to the async `KvStore` trait is safe.
fn block_on<F>(f: F) -> F::Output
where
    F: std::future::Future + Send,
    F::Output: Send,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => std::thread::scope(|s| {
            s.spawn(|| handle.block_on(f))
                .join()
                .expect("async thread panicked")
        }),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to create tokio runtime")
            .block_on(f),
    }
}

/// `SurrealKV`-based storage backend for audit logs.
pub struct SurrealKvAuditStorage {
    store: Arc<dyn KvStore>,
}

impl SurrealKvAuditStorage {
    /// Open or create audit storage at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the `SurrealKV` store fails to open.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let store =
            SurrealKvStore::open(path).map_err(|e| AuditError::StorageError(e.to_string()))?;
        Ok(Self {
            store: Arc::new(store),
        })
    }

    /// Create an in-memory storage (for testing).
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryKvStore::new()),
        }
    }

    fn get_identity_entry_ids(&self, identity: &str) -> AuditResult<Vec<AuditEntryId>> {
        let data = block_on(self.store.get(NS_IDENTITY_INDEX, identity))
            .map_err(|e| AuditError::StorageError(e.to_string()))?;

        match data {
            Some(bytes) => {
                let ids: Vec<AuditEntryId> = serde_json::from_slice(&bytes)
                    .map_err(|e| AuditError::SerializationError(e.to_string()))?;
                Ok(ids)
            },
            None => Ok(Vec::new()),
        }
    }
}

impl AuditStorage for SurrealKvAuditStorage {
    fn store(&self, entry: &AuditEntry) -> AuditResult<()> {
        let entry_key = entry.id.0.to_string();

        let entry_data =
            serde_json::to_vec(entry).map_err(|e| AuditError::SerializationError(e.to_string()))?;

        block_on(self.store.set(NS_ENTRIES, &entry_key, entry_data))
            .map_err(|e| AuditError::StorageError(e.to_string()))?;

        let mut entry_ids = self.get_identity_entry_ids(&entry.identity)?;
        entry_ids.push(entry.id.clone());
        let index_data = serde_json::to_vec(&entry_ids)
            .map_err(|e| AuditError::SerializationError(e.to_string()))?;
        block_on(self.store.set(NS_IDENTITY_INDEX, &entry.identity, index_data))
            .map_err(|e| AuditError::StorageError(e.to_string()))?;

        block_on(
            self.store
                .set(NS_CHAIN_HEADS, &entry.identity, entry_key.into_bytes()),
        )
        .map_err(|e| AuditError::StorageError(e.to_string()))?;

        Ok(())
    }

    fn get(&self, id: &AuditEntryId) -> AuditResult<Option<AuditEntry>> {
        let key = id.0.to_string();

        let data = block_on(self.store.get(NS_ENTRIES, &key))
            .map_err(|e| AuditError::StorageError(e.to_string()))?;

        match data {
            Some(bytes) => {
                let entry = serde_json::from_slice(&bytes)
                    .map_err(|e| AuditError::SerializationError(e.to_string()))?;
                Ok(Some(entry))
            },
            None => Ok(None),
        }
    }

    fn get_chain_head(&self, identity: &str) -> AuditResult<Option<AuditEntryId>> {
        let data = block_on(self.store.get(NS_CHAIN_HEADS, identity))
            .map_err(|e| AuditError::StorageError(e.to_string()))?;

        match data {
            Some(bytes) => {
                let id_str = std::str::from_utf8(&bytes)
                    .map_err(|e| AuditError::StorageError(e.to_string()))?;
                let uuid = uuid::Uuid::parse_str(id_str)
                    .map_err(|e| AuditError::StorageError(e.to_string()))?;
                Ok(Some(AuditEntryId(uuid)))
            },
            None => Ok(None),
        }
    }

    fn get_identity_entries(&self, identity: &str) -> AuditResult<Vec<AuditEntry>> {
        let ids = self.get_identity_entry_ids(identity)?;
        let mut entries = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some(entry) = self.get(&id)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    fn get_entries_in_range(
        &self,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> AuditResult<Vec<AuditEntry>> {
        let identities = self.list_identities()?;
        let mut entries = Vec::new();

        for identity in identities {
            for entry in self.get_identity_entries(&identity)? {
                let ts = entry.timestamp.0;
                if ts >= start && ts <= end {
                    entries.push(entry);
                }
            }
        }

        entries.sort_by(|a, b| a.timestamp.0.cmp(&b.timestamp.0));

        Ok(entries)
    }

    fn count(&self) -> AuditResult<usize> {
        let keys = block_on(self.store.list_keys(NS_ENTRIES))
            .map_err(|e| AuditError::StorageError(e.to_string()))?;
        Ok(keys.len())
    }

    fn count_identity(&self, identity: &str) -> AuditResult<usize> {
        Ok(self.get_identity_entry_ids(identity)?.len())
    }

    fn list_identities(&self) -> AuditResult<Vec<String>> {
        block_on(self.store.list_keys(NS_IDENTITY_INDEX))
            .map_err(|e| AuditError::StorageError(e.to_string()))
    }
}

impl std::fmt::Debug for SurrealKvAuditStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvAuditStorage")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditCategory, NewAuditEntry};
    use warden_crypto::{ContentHash, KeyPair};

    #[test]
    fn test_store_and_retrieve() {
        let storage = SurrealKvAuditStorage::in_memory();
        let keypair = KeyPair::generate();

        let entry = AuditEntry::create(
            NewAuditEntry::success("luma", AuditCategory::System, "orchestrator.start"),
            ContentHash::zero(),
            &keypair,
        );
        let entry_id = entry.id.clone();

        storage.store(&entry).unwrap();

        let retrieved = storage.get(&entry_id).unwrap().unwrap();
        assert_eq!(retrieved.id, entry_id);
    }

    #[test]
    fn test_identity_index() {
        let storage = SurrealKvAuditStorage::in_memory();
        let keypair = KeyPair::generate();

        let mut prev_hash = ContentHash::zero();
        for i in 0..3 {
            let entry = AuditEntry::create(
                NewAuditEntry::success("luma", AuditCategory::Pipeline, format!("chat.pipeline.run.{i}")),
                prev_hash,
                &keypair,
            );
            prev_hash = entry.content_hash();
            storage.store(&entry).unwrap();
        }

        let entries = storage.get_identity_entries("luma").unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_chain_head() {
        let storage = SurrealKvAuditStorage::in_memory();
        let keypair = KeyPair::generate();

        let entry1 = AuditEntry::create(
            NewAuditEntry::success("luma", AuditCategory::System, "orchestrator.start"),
            ContentHash::zero(),
            &keypair,
        );
        storage.store(&entry1).unwrap();

        let entry2 = AuditEntry::create(
            NewAuditEntry::success("luma", AuditCategory::System, "orchestrator.stop"),
            entry1.content_hash(),
            &keypair,
        );
        storage.store(&entry2).unwrap();

        let head = storage.get_chain_head("luma").unwrap().unwrap();
        assert_eq!(head, entry2.id);
    }
}
