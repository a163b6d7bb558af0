//! Warden Scheduler — named periodic task runner with per-task backoff
//! (spec.md §4.10).
//!
//! Grounded on the donor's `astrid-hooks::executor` style of timed,
//! error-captured async invocation, generalized from "run one hook" to
//! "run one named task forever on an interval, isolating its errors."

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Errors raised by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A task with this name is already registered.
    #[error("task `{0}` is already registered")]
    DuplicateName(String),
    /// No task with this name is registered.
    #[error("no such task `{0}`")]
    UnknownTask(String),
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// A boxed async task body.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// A scheduled task's callback. Implemented for any `Fn() -> Future`
/// closure returning `Result<(), String>`.
pub trait TaskCallback: Send + Sync {
    /// Run one tick of the task.
    fn call(&self) -> TaskFuture;
}

impl<F, Fut> TaskCallback for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    fn call(&self) -> TaskFuture {
        Box::pin((self)())
    }
}

/// Execution statistics for one named task.
#[derive(Debug, Clone, Default)]
pub struct TaskStats {
    /// Number of times the task has run (successful or not).
    pub runs: u64,
    /// Number of runs that returned an error.
    pub errors: u64,
    /// Timestamp of the most recent run, if any.
    pub last_run: Option<DateTime<Utc>>,
}

struct TaskEntry {
    callback: Arc<dyn TaskCallback>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

/// Named periodic task runner.
///
/// Each registered task runs on its own `tokio` task, looping on its
/// configured interval. A handler error does not stop the loop: the
/// scheduler sleeps `min(interval, 60s)` and retries, incrementing an
/// error counter (spec.md §4.10).
pub struct Scheduler {
    tasks: Arc<std::sync::Mutex<HashMap<String, TaskEntry>>>,
    stats: Arc<RwLock<HashMap<String, TaskStats>>>,
    started: std::sync::atomic::AtomicBool,
}

impl Scheduler {
    /// Create an empty, unstarted scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(std::sync::Mutex::new(HashMap::new())),
            stats: Arc::new(RwLock::new(HashMap::new())),
            started: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Register a named task. If the scheduler has already been
    /// [`start`](Self::start)ed, the task's loop begins immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DuplicateName`] if `name` is already
    /// registered.
    pub fn add(
        &self,
        name: impl Into<String>,
        callback: Arc<dyn TaskCallback>,
        interval_seconds: u64,
        run_immediately: bool,
    ) -> SchedulerResult<()> {
        let name = name.into();
        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if tasks.contains_key(&name) {
            return Err(SchedulerError::DuplicateName(name));
        }

        self.stats
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.clone(), TaskStats::default());

        let interval = Duration::from_secs(interval_seconds.max(1));
        let handle = if self.started.load(std::sync::atomic::Ordering::SeqCst) {
            Some(self.spawn_loop(name.clone(), Arc::clone(&callback), interval, run_immediately))
        } else {
            None
        };

        tasks.insert(
            name,
            TaskEntry {
                callback,
                interval,
                handle,
            },
        );
        Ok(())
    }

    /// Unregister a task, aborting its running loop if any.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownTask`] if `name` is not registered.
    pub fn remove(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = tasks.remove(name).ok_or_else(|| SchedulerError::UnknownTask(name.to_string()))?;
        if let Some(handle) = entry.handle {
            handle.abort();
        }
        self.stats.write().unwrap_or_else(std::sync::PoisonError::into_inner).remove(name);
        Ok(())
    }

    /// Run `name` once, immediately, outside its regular interval.
    /// Updates the same stats counters as a regular tick.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownTask`] if `name` is not registered.
    pub async fn run_immediately(&self, name: &str) -> SchedulerResult<()> {
        let callback = {
            let tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            tasks
                .get(name)
                .map(|entry| Arc::clone(&entry.callback))
                .ok_or_else(|| SchedulerError::UnknownTask(name.to_string()))?
        };
        Self::run_once(&self.stats, name, callback.as_ref()).await;
        Ok(())
    }

    /// Start every registered task's loop. Tasks registered after
    /// `start()` start their loop immediately upon registration.
    pub fn start(&self) {
        self.started.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (name, entry) in tasks.iter_mut() {
            if entry.handle.is_none() {
                entry.handle = Some(self.spawn_loop(
                    name.clone(),
                    Arc::clone(&entry.callback),
                    entry.interval,
                    false,
                ));
            }
        }
        info!(task_count = tasks.len(), "scheduler started");
    }

    /// Stop every task loop. The scheduler can be [`start`](Self::start)ed
    /// again afterward; tasks remain registered.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for entry in tasks.values_mut() {
            if let Some(handle) = entry.handle.take() {
                handle.abort();
            }
        }
        self.started.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    /// Snapshot of every task's run/error/last-run counters.
    #[must_use]
    pub fn get_stats(&self) -> HashMap<String, TaskStats> {
        self.stats.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn spawn_loop(
        &self,
        name: String,
        callback: Arc<dyn TaskCallback>,
        interval: Duration,
        run_immediately: bool,
    ) -> JoinHandle<()> {
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            if run_immediately {
                Self::run_once(&stats, &name, callback.as_ref()).await;
            }
            loop {
                let outcome_was_error = {
                    tokio::time::sleep(interval).await;
                    !Self::run_once(&stats, &name, callback.as_ref()).await
                };
                if outcome_was_error {
                    let backoff = interval.min(Duration::from_secs(60));
                    warn!(task = %name, backoff_secs = backoff.as_secs(), "task errored, backing off");
                    tokio::time::sleep(backoff).await;
                }
            }
        })
    }

    /// Run one tick of `callback`, updating `name`'s stats. Returns
    /// `true` on success.
    async fn run_once(
        stats: &Arc<RwLock<HashMap<String, TaskStats>>>,
        name: &str,
        callback: &dyn TaskCallback,
    ) -> bool {
        let result = callback.call().await;
        let mut stats = stats.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = stats.entry(name.to_string()).or_default();
        entry.runs += 1;
        entry.last_run = Some(Utc::now());
        match result {
            Ok(()) => true,
            Err(reason) => {
                entry.errors += 1;
                error!(task = %name, reason, "scheduled task failed");
                false
            },
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("task_count", &self.tasks.lock().map(|t| t.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn run_immediately_updates_stats() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        scheduler
            .add(
                "heartbeat",
                Arc::new(move || {
                    let counter = Arc::clone(&counter_clone);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
                3600,
                false,
            )
            .unwrap();

        scheduler.run_immediately("heartbeat").await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let stats = scheduler.get_stats();
        assert_eq!(stats["heartbeat"].runs, 1);
        assert_eq!(stats["heartbeat"].errors, 0);
    }

    #[tokio::test]
    async fn errors_increment_error_counter() {
        let scheduler = Scheduler::new();
        scheduler
            .add(
                "flaky",
                Arc::new(|| async { Err("boom".to_string()) }),
                3600,
                false,
            )
            .unwrap();

        scheduler.run_immediately("flaky").await.unwrap();
        let stats = scheduler.get_stats();
        assert_eq!(stats["flaky"].runs, 1);
        assert_eq!(stats["flaky"].errors, 1);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let scheduler = Scheduler::new();
        scheduler
            .add("a", Arc::new(|| async { Ok(()) }), 60, false)
            .unwrap();
        let result = scheduler.add("a", Arc::new(|| async { Ok(()) }), 60, false);
        assert!(matches!(result, Err(SchedulerError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn remove_unregisters_task() {
        let scheduler = Scheduler::new();
        scheduler
            .add("a", Arc::new(|| async { Ok(()) }), 60, false)
            .unwrap();
        scheduler.remove("a").unwrap();
        assert!(scheduler.get_stats().get("a").is_none());
        assert!(matches!(
            scheduler.remove("a"),
            Err(SchedulerError::UnknownTask(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn start_runs_tasks_on_their_interval() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        scheduler
            .add(
                "tick",
                Arc::new(move || {
                    let counter = Arc::clone(&counter_clone);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
                10,
                false,
            )
            .unwrap();

        scheduler.start();
        tokio::time::advance(Duration::from_secs(25)).await;
        tokio::task::yield_now().await;

        assert!(counter.load(Ordering::SeqCst) >= 2);
        scheduler.stop();
    }
}
