//! Unified prelude for the Warden agent execution core.
//!
//! A single import brings in the commonly used types from every crate in
//! the workspace. Plugins and binaries (`warden-runtime`, `warden-cli`)
//! use this instead of depending on each leaf crate individually.
//!
//! ```rust,ignore
//! use warden_prelude::*;
//! ```
//!
//! Crates with their own focused `prelude` module are re-exported through
//! it; crates small enough that a prelude would just repeat their public
//! surface (`warden-sanitize`, `warden-ratelimit`, `warden-events`,
//! `warden-scheduler`, `warden-quiethours`, `warden-permissions`,
//! `warden-storage`, `warden-config`) are re-exported directly.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub use warden_audit::prelude::*;
pub use warden_core::prelude::*;
pub use warden_crypto::prelude::*;
pub use warden_llm::prelude::*;
pub use warden_secrets::prelude::*;
pub use warden_outputsafety::{BlockedBy, OutputSafetyFilter, Verdict as OutputSafetyVerdict};
pub use warden_pipeline::prelude::*;
pub use warden_preflight::prelude::*;

pub use warden_sanitize::{DEFAULT_MAX_LENGTH, sanitize, sanitize_default, wrap_external_content};

pub use warden_ratelimit::{DEFAULT_MAX_BUCKETS, DEFAULT_MAX_TOKENS, DEFAULT_REFILL_RATE, RateLimiter, RateLimiterConfig};

pub use warden_permissions::PermissionChecker;

pub use warden_events::{EventBus, EventHandler, HandlerFuture};

pub use warden_scheduler::{Scheduler, SchedulerError, SchedulerResult, TaskCallback, TaskStats};

pub use warden_quiethours::{QuietHoursError, QuietHoursGate, QuietHoursResult, QuietHoursStatus};

pub use warden_storage::{Database, KvEntry, KvStore, MemoryKvStore, ScopedKvStore, StorageError, StorageResult};

pub use warden_config::{GlobalConfig, load_global, load_identity};

pub use warden_capsule::prelude::*;
pub use warden_ipc::prelude::*;
