//! Convenience re-exports for test modules.

pub use crate::fixtures::{TempRoot, throwaway_identity, throwaway_identity_named};
pub use crate::harness::EnvVarGuard;
pub use crate::mock_llm::{StubBehavior, StubLlmClient};
pub use crate::mocks::in_memory_audit_log;
