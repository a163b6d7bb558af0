//! Deep-merge for layered YAML documents (global defaults, per-identity
//! overrides), adapted from the donor's TOML table merge to
//! `serde_yaml::Value`.

use serde_yaml::Value;

/// Recursively merge `overlay` into `base`. Mappings merge key-by-key;
/// scalars and sequences from `overlay` replace the corresponding value
/// in `base`.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if let Some(base_val) = base_map.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_map.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_scalar_replaces_base_scalar() {
        let mut base: Value = serde_yaml::from_str("a: 1\nb: 2\n").expect("valid");
        let overlay: Value = serde_yaml::from_str("b: 3\n").expect("valid");
        deep_merge(&mut base, &overlay);
        assert_eq!(base["a"], Value::from(1));
        assert_eq!(base["b"], Value::from(3));
    }

    #[test]
    fn nested_mappings_merge_recursively() {
        let mut base: Value =
            serde_yaml::from_str("llm:\n  provider: hosted\n  temperature: 0.7\n").expect("valid");
        let overlay: Value = serde_yaml::from_str("llm:\n  temperature: 0.2\n").expect("valid");
        deep_merge(&mut base, &overlay);
        assert_eq!(base["llm"]["provider"], Value::from("hosted"));
        assert_eq!(base["llm"]["temperature"], Value::from(0.2));
    }

    #[test]
    fn overlay_introduces_new_keys() {
        let mut base: Value = serde_yaml::from_str("a: 1\n").expect("valid");
        let overlay: Value = serde_yaml::from_str("b: 2\n").expect("valid");
        deep_merge(&mut base, &overlay);
        assert_eq!(base["a"], Value::from(1));
        assert_eq!(base["b"], Value::from(2));
    }
}
