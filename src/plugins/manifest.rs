//! Plugin backed by an import manifest
//!
//! Import extraction is language-specific and runs outside this crate.
//! The external builder writes a JSON manifest (see
//! [`ImportManifest`](crate::graph::ImportManifest)) and this plugin turns
//! it into a graph.

use super::LanguagePlugin;
use crate::config::LanguageConfig;
use crate::graph::{DepGraph, GraphPolicy, ImportManifest};
use crate::zones::{common_zone_rules, ZoneRule};
use anyhow::{bail, Context};
use std::path::Path;
use tracing::debug;

pub struct ManifestPlugin {
    name: String,
    config: LanguageConfig,
    policy: GraphPolicy,
}

impl ManifestPlugin {
    pub fn new(name: &str, config: LanguageConfig) -> Self {
        let policy = config.graph_policy();
        Self {
            name: name.to_string(),
            config,
            policy,
        }
    }
}

impl LanguagePlugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn extensions(&self) -> &[String] {
        &self.config.extensions
    }

    fn policy(&self) -> &GraphPolicy {
        &self.policy
    }

    fn zone_rules(&self) -> Vec<ZoneRule> {
        let mut rules = self.config.zones.clone();
        rules.extend(common_zone_rules());
        rules
    }

    fn build_graph(&self, root: &Path) -> anyhow::Result<DepGraph> {
        let path = root.join(self.config.manifest_path(&self.name));
        if !path.exists() {
            bail!(
                "No import manifest for {} at {}; run the {} graph builder first",
                self.name,
                path.display(),
                self.name
            );
        }
        let manifest = ImportManifest::load(&path)
            .with_context(|| format!("loading {} import manifest", self.name))?;
        let graph = manifest.into_graph();
        debug!(
            "Built {} graph from {}: {} files, {} edges",
            self.name,
            path.display(),
            graph.len(),
            graph.edge_count()
        );
        Ok(graph)
    }
}
