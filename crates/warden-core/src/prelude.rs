//! Convenience re-exports. `use warden_core::prelude::*;` brings in the
//! types collaborators across the workspace pass at almost every boundary.

pub use crate::{
    ConfigError, ConfigResult, Identity, LlmProvider, LlmSettings, Persona, QuietHoursSettings,
    RiskLevel, ScheduleSettings, SecuritySettings, Timestamp, UserId,
};
pub use crate::dirs::WardenRoot;
