//! Raw key-value storage.
//!
//! [`KvStore`] is the trait every namespace-scoped caller (capabilities,
//! secrets, plugin data) programs against. Two implementations are always
//! available — [`MemoryKvStore`] for tests and ephemeral state, and
//! [`ScopedKvStore`] for prefixing an existing store into a sub-namespace —
//! plus [`SurrealKvStore`] behind the `kv` feature for the on-disk backend.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// One stored value together with the bookkeeping every tier needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvEntry {
    /// Raw value bytes.
    pub value: Vec<u8>,
    /// When this entry was last written.
    pub updated_at: DateTime<Utc>,
}

impl KvEntry {
    /// Wrap a value with the current time as its `updated_at`.
    #[must_use]
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
        }
    }
}

fn namespaced_key(namespace: &str, key: &str) -> StorageResult<String> {
    if namespace.is_empty() || key.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "namespace and key must be non-empty (got {namespace:?}, {key:?})"
        )));
    }
    Ok(format!("{namespace}:{key}"))
}

/// Namespace-scoped byte-level key-value storage.
///
/// All methods take an explicit `namespace` so a single backing store can
/// hold capability tokens, secrets metadata, and plugin data side by side
/// without key collisions.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write a value, overwriting any existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a value. Returns `true` if a value was present.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List every key currently stored in `namespace` (without its prefix).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Check whether a key exists, without paying for a full read.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }
}

/// In-memory [`KvStore`], for tests and session-scoped state that should
/// never touch disk.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    inner: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let full = namespaced_key(namespace, key)?;
        let guard = self
            .inner
            .read()
            .map_err(|_| StorageError::Internal("kv store lock poisoned".into()))?;
        Ok(guard.get(&full).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let full = namespaced_key(namespace, key)?;
        let mut guard = self
            .inner
            .write()
            .map_err(|_| StorageError::Internal("kv store lock poisoned".into()))?;
        guard.insert(full, value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let full = namespaced_key(namespace, key)?;
        let mut guard = self
            .inner
            .write()
            .map_err(|_| StorageError::Internal("kv store lock poisoned".into()))?;
        Ok(guard.remove(&full).is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        let prefix = format!("{namespace}:");
        let guard = self
            .inner
            .read()
            .map_err(|_| StorageError::Internal("kv store lock poisoned".into()))?;
        Ok(guard
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(str::to_string)
            .collect())
    }
}

/// A [`KvStore`] that transparently prefixes every namespace with a fixed
/// scope, so unrelated callers sharing one backing store cannot collide.
///
/// Used to hand a plugin its own isolated view of the per-identity store
/// without giving it access to any other plugin's namespace.
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    scope: String,
}

impl ScopedKvStore {
    /// Wrap `inner`, prefixing every namespace it sees with `scope`.
    #[must_use]
    pub fn new(inner: Arc<dyn KvStore>, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }

    fn scoped_namespace(&self, namespace: &str) -> String {
        format!("{}.{namespace}", self.scope)
    }
}

#[async_trait]
impl KvStore for ScopedKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(&self.scoped_namespace(namespace), key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner
            .set(&self.scoped_namespace(namespace), key, value)
            .await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.inner
            .delete(&self.scoped_namespace(namespace), key)
            .await
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        self.inner.list_keys(&self.scoped_namespace(namespace)).await
    }
}

/// `SurrealKV`-backed [`KvStore`] — an embedded, versioned, ACID LSM-tree
/// store used for anything that must survive a restart but does not need
/// `SurrealDB`'s query surface (plugin data, capability tokens).
#[cfg(feature = "kv")]
pub struct SurrealKvStore {
    inner: surrealkv::Store,
}

#[cfg(feature = "kv")]
impl SurrealKvStore {
    /// Open (or create) a `SurrealKV` store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the store cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut opts = surrealkv::Options::new();
        opts.dir = path.as_ref().to_path_buf();
        let inner = surrealkv::Store::new(opts)
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "kv")]
#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let full = namespaced_key(namespace, key)?;
        let mut txn = self
            .inner
            .begin()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let value = txn
            .get(full.as_bytes())
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(value.map(|v| v.to_vec()))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let full = namespaced_key(namespace, key)?;
        let mut txn = self
            .inner
            .begin()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        txn.set(full.as_bytes(), &value)
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        txn.commit()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let full = namespaced_key(namespace, key)?;
        let mut txn = self
            .inner
            .begin()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let existed = txn
            .get(full.as_bytes())
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .is_some();
        if existed {
            txn.delete(full.as_bytes())
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            txn.commit()
                .await
                .map_err(|e| StorageError::Internal(e.to_string()))?;
        }
        Ok(existed)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        let prefix = format!("{namespace}:");
        let mut txn = self
            .inner
            .begin()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let range = prefix.as_bytes().to_vec()..;
        let scanned = txn
            .scan(range, None)
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let mut keys = Vec::new();
        for (k, _, _) in scanned {
            let Ok(k) = String::from_utf8(k) else {
                continue;
            };
            if let Some(stripped) = k.strip_prefix(&prefix) {
                keys.push(stripped.to_string());
            } else {
                break;
            }
        }
        Ok(keys)
    }
}

#[cfg(feature = "kv")]
impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryKvStore::new();
        store.set("ns", "a", b"hello".to_vec()).await.unwrap();

        assert_eq!(store.get("ns", "a").await.unwrap(), Some(b"hello".to_vec()));
        assert!(store.exists("ns", "a").await.unwrap());
        assert_eq!(store.get("ns", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_delete() {
        let store = MemoryKvStore::new();
        store.set("ns", "a", b"v".to_vec()).await.unwrap();

        assert!(store.delete("ns", "a").await.unwrap());
        assert!(!store.delete("ns", "a").await.unwrap());
        assert_eq!(store.get("ns", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_list_keys() {
        let store = MemoryKvStore::new();
        store.set("ns", "a", b"1".to_vec()).await.unwrap();
        store.set("ns", "b", b"2".to_vec()).await.unwrap();
        store.set("other", "c", b"3".to_vec()).await.unwrap();

        let mut keys = store.list_keys("ns").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn scoped_store_isolates_namespaces() {
        let inner: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let plugin_a = ScopedKvStore::new(inner.clone(), "plugin-a");
        let plugin_b = ScopedKvStore::new(inner, "plugin-b");

        plugin_a.set("ns", "key", b"a".to_vec()).await.unwrap();
        plugin_b.set("ns", "key", b"b".to_vec()).await.unwrap();

        assert_eq!(plugin_a.get("ns", "key").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(plugin_b.get("ns", "key").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn empty_namespace_or_key_rejected() {
        let store = MemoryKvStore::new();
        assert!(store.set("", "key", vec![]).await.is_err());
        assert!(store.set("ns", "", vec![]).await.is_err());
    }
}
