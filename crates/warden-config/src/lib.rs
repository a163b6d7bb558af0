//! Warden Config — layered YAML configuration loading.
//!
//! Loads a global `{framework_name}.yaml` document and merges it
//! underneath each per-identity YAML document, expanding `${VAR}` /
//! `${VAR:-default}` references in string values against the process
//! environment before deserializing into a frozen [`warden_core::Identity`].
//!
//! Secrets never flow through this crate: the secrets store is opened
//! separately and is never populated from the environment or from any
//! YAML document.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod env;
pub mod global;
pub mod loader;
mod merge;

pub use global::GlobalConfig;
pub use loader::{load_global, load_identity};
