//! Tag Registry
//!
//! The set of component tag names a transform pass is allowed to touch.
//! Built once per file from the host's component list and never mutated
//! afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One component as reported by the host compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub tag_name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ComponentRecord {
    pub fn new(tag_name: impl Into<String>, dependencies: &[&str]) -> Self {
        Self {
            tag_name: tag_name.into(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Ordered, deduplicated list of known tag names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRegistry {
    tags: Vec<String>,
    lookup: HashSet<String>,
}

impl TagRegistry {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::default();
        for tag in tags {
            registry.push(tag.into());
        }
        registry
    }

    /// Registry holding every component tag, used for the declaration file.
    pub fn from_components(components: &[ComponentRecord]) -> Self {
        Self::new(components.iter().map(|c| c.tag_name.as_str()))
    }

    /// Registry for one emitted module: its own tag first, then every
    /// dependency that is itself a known component.
    ///
    /// Returns `None` when `stem` is not a component tag (helper chunks,
    /// index files). Dependencies missing from the component list are dropped.
    pub fn for_module(stem: &str, components: &[ComponentRecord]) -> Option<Self> {
        let main = components.iter().find(|c| c.tag_name == stem)?;
        let mut registry = Self::default();
        registry.push(main.tag_name.clone());

        for dependency in &main.dependencies {
            if components.iter().any(|c| &c.tag_name == dependency) {
                registry.push(dependency.clone());
            } else {
                tracing::trace!(
                    tag = %main.tag_name,
                    dependency = %dependency,
                    "dependency is not a known component, skipping"
                );
            }
        }

        Some(registry)
    }

    fn push(&mut self, tag: String) {
        if tag.is_empty() || self.lookup.contains(&tag) {
            return;
        }
        self.lookup.insert(tag.clone());
        self.tags.push(tag);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains(name)
    }

    /// Matches `name` against the registry ignoring ASCII case, as done for
    /// `Element.tagName` comparisons where the browser reports upper case.
    pub fn contains_ignore_case(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.eq_ignore_ascii_case(name))
    }

    /// The longest registered tag that `text` starts with.
    pub fn longest_prefix_of(&self, text: &str) -> Option<&str> {
        self.tags
            .iter()
            .filter(|tag| text.starts_with(tag.as_str()))
            .max_by_key(|tag| tag.len())
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_dedup_keeps_order() {
        let registry = TagRegistry::new(["my-b", "my-a", "my-b", ""]);
        assert_eq!(registry.iter().collect::<Vec<_>>(), vec!["my-b", "my-a"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = TagRegistry::new(["my-button", "my-button-group"]);
        assert_eq!(
            registry.longest_prefix_of("my-button-group-item"),
            Some("my-button-group")
        );
        assert_eq!(registry.longest_prefix_of("my-button-sc"), Some("my-button"));
        assert_eq!(registry.longest_prefix_of("span"), None);
    }

    #[test]
    fn test_for_module_drops_unknown_dependencies() {
        let components = vec![
            ComponentRecord::new("my-component", &["my-button", "stn-missing"]),
            ComponentRecord::new("my-button", &[]),
        ];

        let registry = TagRegistry::for_module("my-component", &components).unwrap();
        assert_eq!(
            registry.iter().collect::<Vec<_>>(),
            vec!["my-component", "my-button"]
        );
        assert!(!registry.contains("stn-missing"));

        assert!(TagRegistry::for_module("index", &components).is_none());
    }

    #[test]
    fn test_contains_ignore_case() {
        let registry = TagRegistry::new(["my-icon"]);
        assert!(registry.contains_ignore_case("MY-ICON"));
        assert!(!registry.contains("MY-ICON"));
    }

    #[test]
    fn test_component_record_from_host_json() {
        let json = r#"{"tagName":"my-card","dependencies":["my-icon"]}"#;
        let record: ComponentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record, ComponentRecord::new("my-card", &["my-icon"]));

        let bare: ComponentRecord = serde_json::from_str(r#"{"tagName":"my-icon"}"#).unwrap();
        assert!(bare.dependencies.is_empty());
    }
}
