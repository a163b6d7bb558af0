//! Convenience re-exports.

pub use crate::{SecretsError, SecretsResult, SecretsStore, acquire_master_key};
