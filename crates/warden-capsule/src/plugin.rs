//! The [`Plugin`] lifecycle trait (spec.md §4.13).

use async_trait::async_trait;

use crate::context::PluginContext;

/// A loaded plugin's lifecycle. `setup()` must complete before `tick()`
/// is ever scheduled; `tick()` is the only entry point for periodic
/// work; `teardown()` runs once on shutdown, in reverse load order.
///
/// Plugins reach every framework capability through the [`PluginContext`]
/// handed to [`crate::registry::PluginConstructor`] and are forbidden from
/// importing core internals directly (spec.md §4.13). Any external data a
/// plugin ingests must be passed through `warden_sanitize::wrap_external_content`
/// before inclusion in a pipeline message.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// One-time initialization. Returning `Err` aborts loading this
    /// plugin; its `tick()` is never scheduled.
    async fn setup(&self, ctx: &PluginContext) -> Result<(), String>;

    /// One periodic unit of work. Errors are logged by the scheduler and
    /// do not stop future ticks (spec.md §4.10).
    async fn tick(&self, ctx: &PluginContext) -> Result<(), String>;

    /// Release any held resources. Runs once at shutdown.
    async fn teardown(&self, ctx: &PluginContext) -> Result<(), String>;
}
