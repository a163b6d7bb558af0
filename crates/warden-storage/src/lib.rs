//! Warden Storage — unified persistence layer.
//!
//! Provides two tiers of storage for the Warden runtime:
//!
//! # Tier 1: Raw Key-Value ([`KvStore`])
//!
//! Direct byte-level `get`/`set`/`delete` backed by **`SurrealKV`** — an
//! embedded, versioned, ACID-compliant LSM-tree KV store. Zero query
//! overhead.
//!
//! Primary use case: per-plugin scoped data directories and the secrets
//! store's ciphertext index.
//!
//! Enable with the **`kv`** feature.
//!
//! # Tier 2: Query Engine ([`Database`])
//!
//! Full **`SurrealDB`** with `SurrealQL` — document-graph database
//! supporting relations, graph traversal, and complex queries.
//!
//! Primary use case: the audit log.
//!
//! Enable with the **`db`** feature.
//!
//! # OS Keychain
//!
//! The `keychain` feature exposes [`keychain::get_secret`] /
//! [`keychain::set_secret`] for the secrets-store master key, preferred
//! over the on-disk fallback when the platform provides one.
//!
//! # Feature Flags
//!
//! - **`kv`** — `SurrealKV` raw key-value store
//! - **`db`** — `SurrealDB` full query engine
//! - **`keychain`** — OS keychain secret storage
//! - **`full`** — `kv` and `db`

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

#[cfg(feature = "db")]
pub mod db;

#[cfg(feature = "keychain")]
pub mod keychain;

pub use error::{StorageError, StorageResult};
pub use kv::{KvEntry, KvStore, MemoryKvStore, ScopedKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;

#[cfg(feature = "db")]
pub use db::Database;
