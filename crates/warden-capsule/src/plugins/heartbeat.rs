//! `heartbeat-post` — the first of the two reference plugins named in
//! spec.md §4.13.
//!
//! Grounded on the donor's `astrid-capsule::context::CapsuleContext`
//! pattern of a plugin doing useful work purely through its handed-in
//! context, and on `astrid-openclaw`'s notion of a periodic
//! self-initiated post. Every tick writes a short status line through
//! the safe pipeline and records the post under the plugin's isolated
//! data directory.
//!
//! Does not use the pipeline's `internal` exemption (spec.md §4.7's
//! heartbeat exemption): per SPEC_FULL.md's Open Question resolution,
//! that flag is reserved for `warden-runtime` itself and is never
//! reachable from plugin code, including this one. A quiet-hours post is
//! simply skipped rather than forced through with preflight bypassed.

use warden_llm::ChatMessage;
use warden_core::UserId;

use crate::context::PluginContext;
use crate::plugin::Plugin;

const LAST_POST_FILE: &str = "last_post.txt";

/// Build a fresh [`Plugin`] instance. Matches [`crate::registry::PluginConstructor`].
pub fn construct(_ctx: &PluginContext) -> Box<dyn Plugin> {
    Box::new(HeartbeatPost)
}

/// Periodically posts a short self-initiated status update.
pub struct HeartbeatPost;

impl HeartbeatPost {
    fn scheduler_user_id(ctx: &PluginContext) -> UserId {
        UserId::from(format!("{}:scheduler", ctx.identity_name))
    }
}

#[async_trait::async_trait]
impl Plugin for HeartbeatPost {
    async fn setup(&self, ctx: &PluginContext) -> Result<(), String> {
        tokio::fs::create_dir_all(&ctx.data_dir)
            .await
            .map_err(|e| e.to_string())?;
        tracing::debug!(identity = %ctx.identity_name, "heartbeat-post set up");
        Ok(())
    }

    async fn tick(&self, ctx: &PluginContext) -> Result<(), String> {
        if ctx.quiet_hours.is_quiet_hours() {
            tracing::debug!(identity = %ctx.identity_name, "heartbeat-post skipped: quiet hours");
            return Ok(());
        }

        let messages = [
            ChatMessage::system(
                "You maintain a lightweight, periodic self-status update. Keep it to one \
                 short sentence.",
            ),
            ChatMessage::user("Write this period's heartbeat status update."),
        ];

        let result = ctx
            .safe_pipeline
            .chat(
                &messages,
                &Self::scheduler_user_id(ctx),
                "plugin.heartbeat_post.tick",
                None,
                warden_pipeline::ChatOptions::default(),
            )
            .await;

        if result.blocked {
            return Err(format!(
                "heartbeat post blocked at {}",
                result
                    .block_stage
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ));
        }

        let path = ctx.data_dir.join(LAST_POST_FILE);
        tokio::fs::write(&path, &result.content)
            .await
            .map_err(|e| e.to_string())?;

        ctx.event_bus
            .emit("plugin.heartbeat_post.posted", serde_json::json!({"identity": ctx.identity_name}))
            .await;
        Ok(())
    }

    async fn teardown(&self, ctx: &PluginContext) -> Result<(), String> {
        tracing::debug!(identity = %ctx.identity_name, "heartbeat-post torn down");
        Ok(())
    }
}
