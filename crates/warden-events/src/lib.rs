//! Warden Events — in-process pub/sub fan-out with isolated handler
//! failure (spec.md §4.9).
//!
//! Unlike the donor's closed `AstridEvent` enum, the spec calls for an
//! open, string-named event surface (`subscribe(event_name, handler)`,
//! `emit(event_name, payload) -> handler_success_count`); the isolation
//! *mechanism* — one handler's panic or error invisible to the emitter
//! and to sibling handlers — is kept from the donor's `SubscriberRegistry`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::RwLock;

use futures::FutureExt;
use tracing::warn;

/// A boxed, cloneable async event handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// An event handler: receives the emitted payload, returns `Ok(())` on
/// success or `Err(reason)` on failure. Failures are logged and counted
/// but never propagated to the emitter or to sibling handlers.
pub trait EventHandler: Send + Sync {
    /// Handle one emission of the subscribed event.
    fn handle(&self, payload: serde_json::Value) -> HandlerFuture;
}

impl<F, Fut> EventHandler for F
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    fn handle(&self, payload: serde_json::Value) -> HandlerFuture {
        Box::pin((self)(payload))
    }
}

/// In-process event bus. Subscriptions are keyed by an open event-name
/// string, not a closed enum, per spec.md §4.9.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` to run whenever `event_name` is emitted.
    pub fn subscribe(&self, event_name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        handlers.entry(event_name.into()).or_default().push(handler);
    }

    /// Fan out `payload` to every subscriber of `event_name` concurrently.
    ///
    /// Each handler's future is isolated: a panic inside one is caught and
    /// logged, an `Err` return is logged, and neither affects any other
    /// handler or the count returned here. Returns the number of handlers
    /// that completed successfully.
    pub async fn emit(&self, event_name: &str, payload: serde_json::Value) -> usize {
        let subscribers = {
            let handlers = self.handlers.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            handlers.get(event_name).cloned().unwrap_or_default()
        };

        if subscribers.is_empty() {
            return 0;
        }

        let tasks: Vec<_> = subscribers
            .into_iter()
            .map(|handler| {
                let payload = payload.clone();
                let event_name = event_name.to_string();
                tokio::spawn(async move {
                    match std::panic::AssertUnwindSafe(handler.handle(payload))
                        .catch_unwind()
                        .await
                    {
                        Ok(Ok(())) => true,
                        Ok(Err(reason)) => {
                            warn!(event = %event_name, reason, "event handler returned an error");
                            false
                        },
                        Err(_panic) => {
                            warn!(event = %event_name, "event handler panicked");
                            false
                        },
                    }
                })
            })
            .collect();

        let mut success_count = 0;
        for task in tasks {
            if let Ok(true) = task.await {
                success_count += 1;
            }
        }
        success_count
    }

    /// Remove every subscription from every event.
    pub fn clear(&self) {
        self.handlers.write().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
    }

    /// Number of handlers subscribed to `event_name`.
    #[must_use]
    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(event_name)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn emit_with_no_subscribers_returns_zero() {
        let bus = EventBus::new();
        assert_eq!(bus.emit("nobody.listens", serde_json::json!({})).await, 0);
    }

    #[tokio::test]
    async fn all_handlers_run_and_count_successes() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            bus.subscribe(
                "plugin.tick",
                Arc::new(move |_payload: serde_json::Value| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            );
        }

        let successes = bus.emit("plugin.tick", serde_json::json!({"n": 1})).await;
        assert_eq!(successes, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn one_handler_failure_does_not_affect_others() {
        let bus = EventBus::new();
        let ok_ran = Arc::new(AtomicUsize::new(0));

        bus.subscribe("x", Arc::new(|_: serde_json::Value| async { Err("boom".to_string()) }));

        let ok_ran_clone = Arc::clone(&ok_ran);
        bus.subscribe(
            "x",
            Arc::new(move |_: serde_json::Value| {
                let ok_ran = Arc::clone(&ok_ran_clone);
                async move {
                    ok_ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        let successes = bus.emit("x", serde_json::json!(null)).await;
        assert_eq!(successes, 1);
        assert_eq!(ok_ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_handler_panic_does_not_affect_others() {
        let bus = EventBus::new();
        bus.subscribe("x", Arc::new(|_: serde_json::Value| async {
            panic!("handler exploded")
        }));
        let survived = Arc::new(AtomicUsize::new(0));
        let survived_clone = Arc::clone(&survived);
        bus.subscribe(
            "x",
            Arc::new(move |_: serde_json::Value| {
                let survived = Arc::clone(&survived_clone);
                async move {
                    survived.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        let successes = bus.emit("x", serde_json::json!(null)).await;
        assert_eq!(successes, 1);
        assert_eq!(survived.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_removes_all_subscriptions() {
        let bus = EventBus::new();
        bus.subscribe("x", Arc::new(|_: serde_json::Value| async { Ok(()) }));
        assert_eq!(bus.subscriber_count("x"), 1);
        bus.clear();
        assert_eq!(bus.subscriber_count("x"), 0);
    }
}
