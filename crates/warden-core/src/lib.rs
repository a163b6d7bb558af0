//! Warden Core — foundation types shared across the agent execution core.
//!
//! This crate provides:
//! - [`Identity`] and [`Persona`]: the frozen, YAML-loaded configuration
//!   entities every other crate in the workspace builds on.
//! - [`dirs::WardenRoot`]: the bit-exact on-disk layout (spec.md §6).
//! - Common scalar types ([`Timestamp`], [`RiskLevel`], [`AuditEntryId`],
//!   [`UserId`]) used at crate boundaries throughout the workspace.
//!
//! No crate in this workspace performs LLM inference or network I/O
//! through `warden-core` itself — it is pure data and validation.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod dirs;
mod error;
mod identity;
mod persona;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use identity::{
    Identity, LlmProvider, LlmSettings, PermissionRule, QuietHoursSettings, ScheduleSettings,
    SecuritySettings, validate_identity_name,
};
pub use persona::{FewShotExample, Persona};
pub use types::{AuditEntryId, IdentityName, RiskLevel, Timestamp, UserId};
