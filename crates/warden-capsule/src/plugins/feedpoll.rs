//! `feed-poll` — the second reference plugin named in spec.md §4.13.
//!
//! Operates purely through [`PluginContext`], with no direct network or
//! filesystem access outside its isolated data directory: new items are
//! expected to have been deposited into `{data_dir}/inbox.jsonl` by
//! whatever connector owns the actual external fetch (out of scope here,
//! same boundary the donor draws between `astrid-capsule` plugins and
//! `astrid-openclaw` connectors). Each unseen line is wrapped with
//! [`warden_sanitize::wrap_external_content`] before being summarized
//! through the safe pipeline, exactly as spec.md §4.13's outward-facing
//! contract requires for externally-sourced data.

use warden_core::UserId;
use warden_llm::ChatMessage;
use warden_sanitize::{MARKER_TRUST_INSTRUCTION, wrap_external_content};

use crate::context::PluginContext;
use crate::plugin::Plugin;

const INBOX_FILE: &str = "inbox.jsonl";
const STATE_FILE: &str = "feed_state.json";
const SUMMARIZE_ACTION: &str = "feed.summarize";

/// Build a fresh [`Plugin`] instance. Matches [`crate::registry::PluginConstructor`].
pub fn construct(_ctx: &PluginContext) -> Box<dyn Plugin> {
    Box::new(FeedPoll)
}

/// Periodically summarizes unseen inbox lines through the safe pipeline.
pub struct FeedPoll;

impl FeedPoll {
    fn scheduler_user_id(ctx: &PluginContext) -> UserId {
        UserId::from(format!("{}:scheduler", ctx.identity_name))
    }

    async fn read_processed_offset(ctx: &PluginContext) -> usize {
        let path = ctx.data_dir.join(STATE_FILE);
        let Ok(raw) = tokio::fs::read_to_string(&path).await else {
            return 0;
        };
        serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v.get("processed_lines").and_then(serde_json::Value::as_u64))
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(0)
    }

    async fn write_processed_offset(ctx: &PluginContext, offset: usize) -> Result<(), String> {
        let path = ctx.data_dir.join(STATE_FILE);
        let body = serde_json::json!({"processed_lines": offset});
        tokio::fs::write(&path, body.to_string())
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait::async_trait]
impl Plugin for FeedPoll {
    async fn setup(&self, ctx: &PluginContext) -> Result<(), String> {
        tokio::fs::create_dir_all(&ctx.data_dir)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn tick(&self, ctx: &PluginContext) -> Result<(), String> {
        if !ctx.permissions.is_allowed(SUMMARIZE_ACTION) {
            tracing::debug!(identity = %ctx.identity_name, "feed-poll: summarize action not permitted");
            return Ok(());
        }

        let inbox_path = ctx.data_dir.join(INBOX_FILE);
        let raw = match tokio::fs::read_to_string(&inbox_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.to_string()),
        };

        let lines: Vec<&str> = raw.lines().collect();
        let processed = Self::read_processed_offset(ctx).await;
        let unseen = lines.get(processed..).unwrap_or_default();
        if unseen.is_empty() {
            return Ok(());
        }

        for item in unseen {
            let wrapped = wrap_external_content(item, "feed_item");
            let system_prompt = format!("Summarize the external feed item in one sentence. {MARKER_TRUST_INSTRUCTION}");
            let messages = [ChatMessage::system(system_prompt), ChatMessage::user(wrapped)];

            let result = ctx
                .safe_pipeline
                .chat(
                    &messages,
                    &Self::scheduler_user_id(ctx),
                    "plugin.feed_poll.summarize",
                    None,
                    warden_pipeline::ChatOptions::default(),
                )
                .await;

            if result.blocked {
                tracing::warn!(identity = %ctx.identity_name, "feed-poll: item summarization blocked");
                continue;
            }

            ctx.event_bus
                .emit(
                    "plugin.feed_poll.summarized",
                    serde_json::json!({"identity": ctx.identity_name, "summary": result.content}),
                )
                .await;
        }

        ctx.permissions.record_action(SUMMARIZE_ACTION);
        Self::write_processed_offset(ctx, lines.len()).await
    }

    async fn teardown(&self, ctx: &PluginContext) -> Result<(), String> {
        tracing::debug!(identity = %ctx.identity_name, "feed-poll torn down");
        Ok(())
    }
}
