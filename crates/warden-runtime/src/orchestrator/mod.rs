//! The per-identity orchestrator (spec.md §4.14): "constructed with an
//! identity name, `run()` executes the full lifecycle and blocks until
//! termination."
//!
//! Grounded on the donor's `astrid-runtime` top-level struct composing a
//! `config`/`workspace`/`execution`/`security` split into one
//! `AstridRuntime::run`, generalized here to the spec's strict
//! setup/shutdown ordering and to a single identity per OS process
//! (one `Orchestrator` per `warden run <identity>` invocation, spawned by
//! `warden-supervisor` as a standalone child).

pub(crate) mod backend;
pub(crate) mod plugins;
pub(crate) mod security;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{info, warn};

use warden_audit::{AuditCategory, AuditLog, SurrealKvAuditStorage};
use warden_capsule::{CapabilityTable, PluginRegistry};
use warden_core::dirs::WardenRoot;
use warden_core::{Identity, Persona, UserId};
use warden_crypto::KeyPair;
use warden_events::EventBus;
use warden_llm::{ChatMessage, LlmRegistry, Priority};
use warden_permissions::PermissionChecker;
use warden_pipeline::{ChatOptions, SafePipeline};
use warden_quiethours::QuietHoursGate;
use warden_scheduler::{Scheduler, TaskCallback, TaskFuture};
use warden_sanitize::MARKER_TRUST_INSTRUCTION;
use warden_secrets::SecretsStore;

use crate::error::{RuntimeError, RuntimeResult};
use plugins::LoadedPlugin;

/// The runtime's own signing key file, distinct from any plugin data:
/// `{root}/data/{identity}/runtime.key`.
const RUNTIME_KEY_FILE: &str = "runtime.key";

/// Name the runtime-owned heartbeat task is registered under with the
/// scheduler. Not a whitelisted plugin name, so it can never collide with
/// a connector (spec.md §9 Open Question: `internal = true` is reachable
/// only from here).
const HEARTBEAT_TASK_NAME: &str = "__runtime_heartbeat";

fn system_prompt_for(identity: &Identity, persona: Option<&Persona>) -> String {
    let mut prompt = String::new();
    if let Some(persona) = persona {
        prompt.push_str(&persona.voice);
        if !persona.signature_phrases.is_empty() {
            prompt.push_str(" Signature phrases you may use: ");
            prompt.push_str(&persona.signature_phrases.join(", "));
            prompt.push('.');
        }
    } else {
        prompt.push_str(&format!("You are {}.", identity.display_name));
    }
    prompt.push(' ');
    prompt.push_str(MARKER_TRUST_INSTRUCTION);
    prompt
}

fn load_persona(root: &WardenRoot, identity_name: &str) -> RuntimeResult<Option<Persona>> {
    let path = root.persona_config_path(identity_name)?;
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let persona = Persona::from_yaml(&path.display().to_string(), &contents)?;
            Ok(Some(persona))
        },
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RuntimeError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

struct RuntimeHeartbeat {
    identity: Arc<Identity>,
    system_prompt: String,
    safe_pipeline: Arc<SafePipeline>,
    quiet_hours: Arc<QuietHoursGate>,
    event_bus: Arc<EventBus>,
}

impl TaskCallback for RuntimeHeartbeat {
    fn call(&self) -> TaskFuture {
        let identity = Arc::clone(&self.identity);
        let system_prompt = self.system_prompt.clone();
        let safe_pipeline = Arc::clone(&self.safe_pipeline);
        let quiet_hours = Arc::clone(&self.quiet_hours);
        let event_bus = Arc::clone(&self.event_bus);

        Box::pin(async move {
            if quiet_hours.is_quiet_hours() {
                info!(identity = %identity.name, "runtime heartbeat skipped: quiet hours");
                return Ok(());
            }

            let messages = [
                ChatMessage::system(system_prompt),
                ChatMessage::user("Heartbeat tick. Confirm you are running with a short status line."),
            ];
            let user_id = UserId::from(format!("{}:runtime", identity.name));

            // The only call site in this workspace permitted to set
            // `internal = true` (spec.md §9 Open Question resolution).
            let options = ChatOptions {
                internal: true,
                backend: None,
                complexity: None,
                priority: Priority::Normal,
            };

            let result = safe_pipeline.chat(&messages, &user_id, "runtime.heartbeat", None, options).await;

            if result.blocked {
                warn!(identity = %identity.name, "runtime heartbeat blocked");
                return Err("runtime heartbeat blocked".to_string());
            }

            event_bus
                .emit("runtime.heartbeat", serde_json::json!({"identity": identity.name}))
                .await;
            Ok(())
        })
    }
}

/// The per-identity orchestrator.
///
/// Owns every collaborator built during [`Orchestrator::setup`] and
/// drives them through [`Orchestrator::run`]'s strict lifecycle
/// (spec.md §4.14).
pub struct Orchestrator {
    identity: Arc<Identity>,
    root: WardenRoot,
    audit: Arc<AuditLog>,
    scheduler: Arc<Scheduler>,
    event_bus: Arc<EventBus>,
    safe_pipeline: Arc<SafePipeline>,
    llm_registry: Arc<LlmRegistry>,
    loaded_plugins: Vec<LoadedPlugin>,
    shutdown: Arc<Notify>,
}

impl Orchestrator {
    /// Run the full setup -> run -> shutdown lifecycle for `identity_name`
    /// under `root`, blocking until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if any setup step fails. A setup failure
    /// leaves nothing running: collaborators built before the failing
    /// step are simply dropped, there is no partial teardown to perform.
    pub async fn run(root: WardenRoot, identity_name: &str) -> RuntimeResult<()> {
        let orchestrator = Self::setup(root, identity_name).await?;
        orchestrator.serve().await
    }

    async fn setup(root: WardenRoot, identity_name: &str) -> RuntimeResult<Self> {
        // 1. load identity
        let identity = Arc::new(warden_config::load_identity(&root, identity_name)?);
        let persona = load_persona(&root, identity_name)?;

        // 2. create data/log paths
        root.ensure_scaffold().map_err(|source| RuntimeError::Io {
            path: root.path().display().to_string(),
            source,
        })?;
        let data_dir = root.data_dir(&identity.name)?;
        let log_dir = root.log_dir(&identity.name)?;
        std::fs::create_dir_all(&data_dir).map_err(|source| RuntimeError::Io {
            path: data_dir.display().to_string(),
            source,
        })?;
        std::fs::create_dir_all(&log_dir).map_err(|source| RuntimeError::Io {
            path: log_dir.display().to_string(),
            source,
        })?;

        // 3. open secrets + audit
        let master_key = warden_secrets::acquire_master_key(&root)?;
        let secrets_store = SecretsStore::open(&root, &identity.name, master_key)?;

        let audit_db_path = root.audit_db_path(&identity.name)?;
        let audit_storage = Arc::new(SurrealKvAuditStorage::open(&audit_db_path)?);
        let runtime_key_path: PathBuf = data_dir.join(RUNTIME_KEY_FILE);
        let runtime_key = Arc::new(KeyPair::load_or_generate(&runtime_key_path).map_err(|e| RuntimeError::Io {
            path: runtime_key_path.display().to_string(),
            source: std::io::Error::other(e.to_string()),
        })?);
        let audit = Arc::new(AuditLog::new(audit_storage, runtime_key));

        // 4. build quiet-hours gate
        let quiet_hours = Arc::new(QuietHoursGate::new(identity.quiet_hours.clone())?);

        // 5. create backend client(s)
        let llm_registry = backend::build_llm_registry(&identity, &secrets_store).await?;
        let secrets = secrets_accessor(secrets_store);

        // 6. create preflight/output-safety/rate-limiter + 7. build safe pipeline
        let safe_pipeline = security::build_pipeline(
            Arc::clone(&identity),
            persona.as_ref(),
            Arc::clone(&llm_registry),
            Arc::clone(&audit),
        )?;

        // 8. build capabilities
        let capabilities = CapabilityTable::from_identity(&identity);
        let permissions = Arc::new(PermissionChecker::new(identity.permissions.clone()));
        let event_bus = Arc::new(EventBus::new());
        let scheduler = Arc::new(Scheduler::new());

        // 9. load plugins (declared order) + setup() + 10. register tick()
        let registry = PluginRegistry::with_builtins();
        let loaded_plugins = plugins::load_plugins(
            &identity,
            &root,
            &registry,
            &scheduler,
            &safe_pipeline,
            &event_bus,
            &audit,
            &quiet_hours,
            &permissions,
            &capabilities,
            &secrets,
            &log_dir,
        )
        .await?;

        // Runtime-owned heartbeat, distinct from any plugin tick.
        let heartbeat_interval = (identity.schedule.heartbeat_hours * 3600.0).round().max(1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let heartbeat_interval = heartbeat_interval as u64;
        let heartbeat = RuntimeHeartbeat {
            identity: Arc::clone(&identity),
            system_prompt: system_prompt_for(&identity, persona.as_ref()),
            safe_pipeline: Arc::clone(&safe_pipeline),
            quiet_hours: Arc::clone(&quiet_hours),
            event_bus: Arc::clone(&event_bus),
        };
        scheduler.add(HEARTBEAT_TASK_NAME, Arc::new(heartbeat), heartbeat_interval, false)?;

        audit
            .success(identity.name.clone(), AuditCategory::System, "orchestrator.start")
            .record()?;

        Ok(Self {
            identity,
            root,
            audit,
            scheduler,
            event_bus,
            safe_pipeline,
            llm_registry,
            loaded_plugins,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// 11. start scheduler and shutdown-signal listener, then block until
    /// a shutdown signal arrives, then tear everything down in reverse
    /// order (spec.md §4.14 "Shutdown order").
    async fn serve(mut self) -> RuntimeResult<()> {
        self.scheduler.start();
        info!(identity = %self.identity.name, "orchestrator running");

        self.wait_for_shutdown_signal().await;

        info!(identity = %self.identity.name, "orchestrator shutting down");
        self.scheduler.stop();

        for loaded in self.loaded_plugins.iter().rev() {
            if let Err(reason) = loaded.plugin.teardown(&loaded.ctx).await {
                warn!(identity = %self.identity.name, plugin = %loaded.name, reason, "plugin teardown failed");
            }
        }

        self.llm_registry.close_all().await;

        if let Err(e) = self
            .audit
            .success(self.identity.name.clone(), AuditCategory::System, "orchestrator.stop")
            .record()
        {
            warn!(identity = %self.identity.name, error = %e, "final audit entry failed");
        }

        self.event_bus.clear();
        Ok(())
    }

    #[cfg(unix)]
    async fn wait_for_shutdown_signal(&self) {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
            () = self.shutdown.notified() => {},
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_shutdown_signal(&self) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            () = self.shutdown.notified() => {},
        }
    }

    /// Name of the identity this orchestrator is running.
    #[must_use]
    pub fn identity_name(&self) -> &str {
        &self.identity.name
    }

    /// Root this orchestrator was constructed with.
    #[must_use]
    pub fn root(&self) -> &WardenRoot {
        &self.root
    }

    /// Request shutdown programmatically (used by tests and by a future
    /// IPC-driven shutdown path), equivalent to receiving SIGTERM.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }
}

fn secrets_accessor(store: SecretsStore) -> warden_capsule::SecretsAccessor {
    let store = Arc::new(std::sync::Mutex::new(store));
    Arc::new(move |key: &str| store.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(key).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_task_name_is_not_a_connector_name() {
        assert!(HEARTBEAT_TASK_NAME.starts_with("__"));
    }
}
