//! Dynamic print-configuration registry.
//!
//! The real option registry (typed options, defaults, validation) lives in
//! the slicer; the container only needs to shuttle serialized `key = value`
//! pairs between the sidecar files and the model, so this collaborator keeps
//! options as strings in deterministic order.

use std::collections::BTreeMap;

/// An ordered set of serialized configuration options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicConfig {
    options: BTreeMap<String, String>,
}

impl DynamicConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an option from its serialized form.
    pub fn set_deserialize(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    /// Serialized form of an option, if present.
    pub fn opt_serialize(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Option keys in deterministic (sorted) order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    /// Number of stored options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// True when no options are stored.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Load options from G-code style comment lines (`; key = value`).
    ///
    /// Lines that do not match the pattern are ignored, which lets the whole
    /// print-config member be fed through unfiltered.
    pub fn load_from_gcode_string(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            let Some(rest) = line.strip_prefix(';') else {
                continue;
            };
            let Some((key, value)) = rest.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            self.set_deserialize(key, value.trim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_sorted() {
        let mut config = DynamicConfig::new();
        config.set_deserialize("zig", "1");
        config.set_deserialize("alpha", "2");
        let keys: Vec<_> = config.keys().collect();
        assert_eq!(keys, ["alpha", "zig"]);
    }

    #[test]
    fn gcode_comments_parse() {
        let mut config = DynamicConfig::new();
        config.load_from_gcode_string(
            "; layer_height = 0.2\n; fill_density = 20%\n\nnot a comment\n; = broken\n",
        );
        assert_eq!(config.opt_serialize("layer_height"), Some("0.2"));
        assert_eq!(config.opt_serialize("fill_density"), Some("20%"));
        assert_eq!(config.len(), 2);
    }

    #[test]
    fn values_may_contain_equals() {
        let mut config = DynamicConfig::new();
        config.load_from_gcode_string("; notes = a=b\n");
        assert_eq!(config.opt_serialize("notes"), Some("a=b"));
    }
}
