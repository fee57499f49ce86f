//! Language plugins
//!
//! A plugin supplies everything language-specific a scan needs: the file
//! extensions it owns, the graph policy, its zone rules and the import
//! graph itself. Plugins are created through an explicit
//! [`PluginRegistry`] assembled once from the project configuration and
//! passed by reference.

mod manifest;

pub use manifest::ManifestPlugin;

use crate::config::{LanguageConfig, ProjectConfig};
use crate::errors::{LedgerError, LedgerResult};
use crate::graph::{DepGraph, GraphPolicy};
use crate::zones::ZoneRule;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Capabilities of one language
pub trait LanguagePlugin: Send + Sync {
    /// Registry key, also used as the language tag on findings
    fn name(&self) -> &str;

    /// File extensions without the leading dot
    fn extensions(&self) -> &[String];

    fn policy(&self) -> &GraphPolicy;

    /// Zone rules in match order, including the rules shared by all
    /// languages
    fn zone_rules(&self) -> Vec<ZoneRule>;

    /// Build the import graph for the project at `root`
    fn build_graph(&self, root: &Path) -> anyhow::Result<DepGraph>;

    /// Whether `path` has one of this language's extensions
    fn owns_file(&self, path: &str) -> bool {
        let name = crate::paths::file_name(path);
        name.rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions().iter().any(|e| e == ext))
    }
}

/// Creates a plugin from the language's effective configuration
pub type PluginFactory = Box<dyn Fn(&str, &LanguageConfig) -> Arc<dyn LanguagePlugin> + Send + Sync>;

struct Registration {
    config: LanguageConfig,
    factory: PluginFactory,
}

/// Language name to plugin factory
#[derive(Default)]
pub struct PluginRegistry {
    entries: BTreeMap<String, Registration>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every language the configuration knows about (built-in
    /// defaults plus configured sections), each backed by its import
    /// manifest
    pub fn with_builtins(config: &ProjectConfig) -> Self {
        let mut registry = Self::new();
        for name in config.language_names() {
            if let Some(lang) = config.language(&name) {
                registry.register(
                    &name,
                    lang,
                    Box::new(|name: &str, lang: &LanguageConfig| {
                        Arc::new(ManifestPlugin::new(name, lang.clone())) as Arc<dyn LanguagePlugin>
                    }),
                );
            }
        }
        registry
    }

    /// Add or replace a language
    pub fn register(&mut self, name: &str, config: LanguageConfig, factory: PluginFactory) {
        self.entries
            .insert(name.to_string(), Registration { config, factory });
    }

    pub fn get(&self, name: &str) -> LedgerResult<Arc<dyn LanguagePlugin>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| LedgerError::UnknownLanguage {
                name: name.to_string(),
                available: self.names().join(", "),
            })?;
        Ok((entry.factory)(name, &entry.config))
    }

    /// Registered language names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    struct FixedPlugin {
        name: String,
        extensions: Vec<String>,
        policy: GraphPolicy,
    }

    impl LanguagePlugin for FixedPlugin {
        fn name(&self) -> &str {
            &self.name
        }
        fn extensions(&self) -> &[String] {
            &self.extensions
        }
        fn policy(&self) -> &GraphPolicy {
            &self.policy
        }
        fn zone_rules(&self) -> Vec<ZoneRule> {
            Vec::new()
        }
        fn build_graph(&self, _root: &Path) -> anyhow::Result<DepGraph> {
            let mut builder = GraphBuilder::new();
            builder.add_file("/r/a.rb", 10).add_file("/r/b.rb", 10).add_import("/r/a.rb", "/r/b.rb");
            Ok(builder.build())
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = PluginRegistry::with_builtins(&ProjectConfig::default());
        assert_eq!(registry.names(), vec!["go", "python", "typescript"]);
        let python = registry.get("python").unwrap();
        assert_eq!(python.name(), "python");
        assert!(python.policy().is_barrel("pkg/__init__.py"));
        assert!(python.owns_file("pkg/a.py"));
        assert!(!python.owns_file("pkg/a.pyc"));
    }

    #[test]
    fn test_unknown_language() {
        let registry = PluginRegistry::with_builtins(&ProjectConfig::default());
        match registry.get("cobol") {
            Err(LedgerError::UnknownLanguage { name, available }) => {
                assert_eq!(name, "cobol");
                assert_eq!(available, "go, python, typescript");
            }
            _ => panic!("expected UnknownLanguage"),
        }
    }

    #[test]
    fn test_custom_factory() {
        let mut registry = PluginRegistry::new();
        registry.register(
            "ruby",
            LanguageConfig::default(),
            Box::new(|name: &str, _: &LanguageConfig| {
                Arc::new(FixedPlugin {
                    name: name.to_string(),
                    extensions: vec!["rb".to_string()],
                    policy: GraphPolicy::default(),
                }) as Arc<dyn LanguagePlugin>
            }),
        );
        assert!(registry.contains("ruby"));
        let plugin = registry.get("ruby").unwrap();
        let graph = plugin.build_graph(Path::new("/r")).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edge_count(), 1);
    }
}
