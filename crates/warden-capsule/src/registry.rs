//! The compile-time plugin whitelist (spec.md §4.13, §9 redesign note).
//!
//! The donor loads plugins dynamically, compiling and instantiating WASM
//! modules named in a manifest (`astrid-capsule::registry`/`engine::wasm`).
//! spec.md §9 calls that out for replacement: here, a plugin name resolves
//! to a `fn(PluginContext) -> Box<dyn Plugin>` fixed at compile time. There
//! is no module path, no dynamic loading, and no way to run a plugin whose
//! name is not in the whitelist.

use std::collections::BTreeMap;

use crate::context::PluginContext;
use crate::error::{CapsuleError, CapsuleResult};
use crate::plugin::Plugin;

/// A plugin constructor: builds a fresh plugin instance from its context.
pub type PluginConstructor = fn(&PluginContext) -> Box<dyn Plugin>;

/// Maps whitelist names to plugin constructors.
///
/// [`PluginRegistry::with_builtins`] ships the two reference plugins named
/// in spec.md §4.13 (`heartbeat-post`, `feed-poll`); [`PluginRegistry::register`]
/// lets tests (or, at compile time, a downstream crate) extend the
/// whitelist further.
pub struct PluginRegistry {
    constructors: BTreeMap<String, PluginConstructor>,
}

impl PluginRegistry {
    /// An empty registry with no whitelisted plugins.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// A registry pre-populated with the two reference plugins shipped by
    /// this crate.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry
            .register("heartbeat-post", crate::plugins::heartbeat::construct)
            .expect("builtin names are distinct");
        registry
            .register("feed-poll", crate::plugins::feedpoll::construct)
            .expect("builtin names are distinct");
        registry
    }

    /// Add `name` to the whitelist. Permits test extensions (spec.md
    /// §4.13 `register(name, module, class)`), realized here as
    /// registering a constructor function directly since there is no
    /// dynamic module to name.
    ///
    /// # Errors
    ///
    /// Returns [`CapsuleError::DuplicatePlugin`] if `name` is already
    /// registered.
    pub fn register(&mut self, name: impl Into<String>, constructor: PluginConstructor) -> CapsuleResult<()> {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            return Err(CapsuleError::DuplicatePlugin(name));
        }
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Every whitelisted plugin name, in declared (sorted) order.
    #[must_use]
    pub fn available_plugins(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Whether `name` is in the whitelist.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Instantiate the plugin named `name` with `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`CapsuleError::UnknownPlugin`] if `name` is not
    /// whitelisted.
    pub fn load(&self, name: &str, ctx: &PluginContext) -> CapsuleResult<Box<dyn Plugin>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| CapsuleError::UnknownPlugin(name.to_string()))?;
        Ok(constructor(ctx))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("available_plugins", &self.available_plugins())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_whitelisted() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.contains("heartbeat-post"));
        assert!(registry.contains("feed-poll"));
        assert!(!registry.contains("not-a-plugin"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = PluginRegistry::empty();
        registry.register("a", crate::plugins::heartbeat::construct).unwrap();
        assert!(matches!(
            registry.register("a", crate::plugins::feedpoll::construct),
            Err(CapsuleError::DuplicatePlugin(_))
        ));
    }

    #[test]
    fn loading_an_unknown_name_is_an_error() {
        let registry = PluginRegistry::empty();
        let result = registry.load("nope", &crate::tests::fixture_context());
        assert!(matches!(result, Err(CapsuleError::UnknownPlugin(_))));
    }
}
