//! Small process-global test helpers.

use std::sync::Mutex;

/// Serializes tests that mutate process environment variables so
/// parallel test execution cannot interleave `set`/`unset` calls across
/// threads sharing the same process environment.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Sets an environment variable for the duration of the guard, restoring
/// its previous value (or removing it) on drop.
pub struct EnvVarGuard {
    key: String,
    previous: Option<String>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    /// Set `key` to `value`, remembering whatever was there before.
    ///
    /// # Panics
    ///
    /// Panics if the environment lock is poisoned by an earlier test
    /// panicking while holding it.
    #[must_use]
    pub fn set(key: &str, value: &str) -> Self {
        let lock = ENV_LOCK.lock().expect("env lock is not poisoned");
        let previous = std::env::var(key).ok();
        // SAFETY-equivalent: single-threaded with respect to other env
        // mutators thanks to `ENV_LOCK`; `unsafe_code` is denied at the
        // workspace level so this crate uses the safe std wrappers, which
        // are sound as long as no other code mutates the environment
        // concurrently.
        unsafe {
            std::env::set_var(key, value);
        }
        Self {
            key: key.to_string(),
            previous,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        unsafe {
            match &self.previous {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_value_on_drop() {
        unsafe {
            std::env::set_var("WARDEN_TEST_HARNESS_VAR", "before");
        }
        {
            let _guard = EnvVarGuard::set("WARDEN_TEST_HARNESS_VAR", "during");
            assert_eq!(std::env::var("WARDEN_TEST_HARNESS_VAR").as_deref(), Ok("during"));
        }
        assert_eq!(std::env::var("WARDEN_TEST_HARNESS_VAR").as_deref(), Ok("before"));
        unsafe {
            std::env::remove_var("WARDEN_TEST_HARNESS_VAR");
        }
    }
}
