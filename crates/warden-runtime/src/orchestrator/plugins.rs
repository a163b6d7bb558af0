//! Loading an identity's connectors and wiring their `tick()` into the
//! scheduler (spec.md §4.14 "load plugins (in declared order) ...
//! register each plugin's tick() with the scheduler").
//!
//! `Identity.connectors` is a `BTreeSet`, so "declared order" is realized
//! as sorted whitelist-name order rather than YAML source order — the
//! same order [`PluginRegistry::available_plugins`] already reports.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use warden_audit::AuditLog;
use warden_capsule::{CapabilityTable, Plugin, PluginContext, PluginRegistry, SecretsAccessor};
use warden_core::Identity;
use warden_core::dirs::WardenRoot;
use warden_events::EventBus;
use warden_permissions::PermissionChecker;
use warden_pipeline::SafePipeline;
use warden_quiethours::QuietHoursGate;
use warden_scheduler::{Scheduler, TaskCallback, TaskFuture};

use crate::error::{RuntimeError, RuntimeResult};

/// A plugin the orchestrator loaded, kept around so shutdown can call
/// `teardown()` in reverse load order.
pub(crate) struct LoadedPlugin {
    pub(crate) name: String,
    pub(crate) plugin: Arc<dyn Plugin>,
    pub(crate) ctx: PluginContext,
}

struct PluginTick {
    plugin: Arc<dyn Plugin>,
    ctx: PluginContext,
}

impl TaskCallback for PluginTick {
    fn call(&self) -> TaskFuture {
        let plugin = Arc::clone(&self.plugin);
        let ctx = self.ctx.clone();
        let fut: Pin<Box<dyn Future<Output = Result<(), String>> + Send>> = Box::pin(async move { plugin.tick(&ctx).await });
        fut
    }
}

/// Tick interval, in seconds, for a whitelisted connector. The two
/// reference plugins read their own named schedule field; any future
/// whitelisted plugin falls back to the heartbeat period.
fn tick_interval_seconds(identity: &Identity, plugin_name: &str) -> u64 {
    let seconds = match plugin_name {
        "feed-poll" => identity.schedule.feed_poll_minutes * 60.0,
        _ => identity.schedule.heartbeat_hours * 3600.0,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let seconds = seconds.round() as u64;
    seconds.max(1)
}

/// Build every connector named in `identity.connectors`, call its
/// `setup()`, and register its `tick()` with `scheduler`.
///
/// # Errors
///
/// Returns [`RuntimeError::Capsule`] if a connector name is not in the
/// whitelist, [`RuntimeError::Plugin`] if `setup()` fails, or
/// [`RuntimeError::Scheduler`] if registering the tick fails.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn load_plugins(
    identity: &Arc<Identity>,
    root: &WardenRoot,
    registry: &PluginRegistry,
    scheduler: &Arc<Scheduler>,
    safe_pipeline: &Arc<SafePipeline>,
    event_bus: &Arc<EventBus>,
    audit: &Arc<AuditLog>,
    quiet_hours: &Arc<QuietHoursGate>,
    permissions: &Arc<PermissionChecker>,
    capabilities: &CapabilityTable,
    secrets: &SecretsAccessor,
    log_dir: &Path,
) -> RuntimeResult<Vec<LoadedPlugin>> {
    let mut loaded = Vec::with_capacity(identity.connectors.len());

    for name in &identity.connectors {
        let data_dir = root
            .plugin_data_dir(&identity.name, name)
            .map_err(|source| RuntimeError::Config(source))?;

        let ctx = PluginContext {
            identity_name: identity.name.clone(),
            plugin_name: name.clone(),
            data_dir,
            log_dir: log_dir.to_path_buf(),
            safe_pipeline: Arc::clone(safe_pipeline),
            event_bus: Arc::clone(event_bus),
            scheduler: Arc::clone(scheduler),
            audit: Arc::clone(audit),
            quiet_hours: Arc::clone(quiet_hours),
            permissions: Arc::clone(permissions),
            identity: Arc::clone(identity),
            secrets: Arc::clone(secrets),
            capabilities: capabilities.clone(),
        };

        let plugin: Arc<dyn Plugin> = registry.load(name, &ctx)?.into();

        plugin.setup(&ctx).await.map_err(|reason| RuntimeError::Plugin {
            plugin: name.clone(),
            phase: "setup",
            reason,
        })?;

        let interval = tick_interval_seconds(identity, name);
        let callback: Arc<dyn TaskCallback> = Arc::new(PluginTick {
            plugin: Arc::clone(&plugin),
            ctx: ctx.clone(),
        });
        scheduler.add(name.clone(), callback, interval, false)?;

        loaded.push(LoadedPlugin {
            name: name.clone(),
            plugin,
            ctx,
        });
    }

    Ok(loaded)
}
