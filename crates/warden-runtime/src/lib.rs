//! Warden Runtime — the per-identity orchestrator (spec.md §4.14).
//!
//! [`Orchestrator::run`] executes the full lifecycle for one identity:
//! load its configuration, wire up the security substrate and the safe
//! pipeline, load its whitelisted plugins, start the scheduler, and block
//! until a shutdown signal, then tear everything down in reverse order.
//!
//! Grounded on the donor's `astrid-runtime::runtime` module split (a
//! `config`/`workspace`/`execution`/`security` decomposition composed by a
//! top-level runtime struct), generalized from the donor's single process
//! to one runtime per identity, run as a standalone child process under
//! the supervisor (`warden-supervisor`).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
pub mod logging;
mod orchestrator;

pub use error::{RuntimeError, RuntimeResult};
pub use orchestrator::Orchestrator;

/// Common imports for crates that drive an orchestrator.
pub mod prelude {
    pub use crate::{Orchestrator, RuntimeError, RuntimeResult};
}
