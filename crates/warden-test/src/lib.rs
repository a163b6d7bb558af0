//! Warden Test — shared test fixtures used as a dev-dependency across the
//! workspace: a throwaway identity, a scaffolded temporary
//! [`warden_core::dirs::WardenRoot`], an in-memory [`warden_audit::AuditLog`],
//! a configurable stub LLM backend, and small process-environment helpers.
//!
//! Add to a crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! warden-test = { workspace = true }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
// Mutating the process environment is an `unsafe fn` as of this edition;
// this crate is dev-only test tooling, never shipped in a running
// orchestrator, and `EnvVarGuard` serializes access via a process-wide
// lock so concurrent tests cannot race each other.
#![allow(unsafe_code)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mock_llm;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mock_llm::*;
pub use mocks::*;
