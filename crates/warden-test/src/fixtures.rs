//! Throwaway identities and filesystem roots for tests.

use warden_core::Identity;
use warden_core::dirs::WardenRoot;

const MINIMAL_IDENTITY_YAML: &str = r"
name: testy
display_name: Testy
llm:
  provider: local
  model: test-model
";

/// Parse the minimal valid identity document used across test suites.
#[must_use]
pub fn throwaway_identity() -> Identity {
    Identity::from_yaml("testy.yaml", MINIMAL_IDENTITY_YAML).expect("fixture identity is valid")
}

/// Build a throwaway identity with a different name, for tests that need
/// more than one (e.g. isolation checks).
#[must_use]
pub fn throwaway_identity_named(name: &str) -> Identity {
    let yaml = MINIMAL_IDENTITY_YAML.replace("name: testy", &format!("name: {name}"));
    Identity::from_yaml(&format!("{name}.yaml"), &yaml).expect("fixture identity is valid")
}

/// A [`WardenRoot`] backed by a `tempfile::TempDir`, scaffolded and ready
/// for immediate use. The directory is removed when the returned guard is
/// dropped.
pub struct TempRoot {
    _dir: tempfile::TempDir,
    root: WardenRoot,
}

impl TempRoot {
    /// Create and scaffold a new temporary root.
    ///
    /// # Panics
    ///
    /// Panics if a temporary directory cannot be created, since every
    /// caller is test code that has no meaningful recovery path.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = WardenRoot::new(dir.path());
        root.ensure_scaffold().expect("scaffold temp root");
        Self { _dir: dir, root }
    }

    /// Borrow the underlying root.
    #[must_use]
    pub fn root(&self) -> &WardenRoot {
        &self.root
    }
}

impl Default for TempRoot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throwaway_identity_parses() {
        let identity = throwaway_identity();
        assert_eq!(identity.name, "testy");
    }

    #[test]
    fn named_throwaway_identities_differ() {
        let a = throwaway_identity_named("alpha");
        let b = throwaway_identity_named("bravo");
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn temp_root_is_scaffolded() {
        let temp = TempRoot::new();
        assert!(temp.root().config_dir().join("identities").is_dir());
    }
}
