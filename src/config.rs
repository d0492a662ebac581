//! Operational configuration: the ambient knobs a deployment of this tree
//! needs that spec.md's data model itself has nothing to say about.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub fn load_config(config_file_path: Option<&Path>) -> anyhow::Result<Config> {
    let mut settings = config::Config::builder();

    if let Some(path) = config_file_path {
        settings = settings.add_source(config::File::from(path).required(true));
    }

    let settings = settings
        .add_source(
            config::Environment::with_prefix("LIVETREE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize::<Config>()?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tree: TreeConfig::default(),
            registry: RegistryConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Spec §4.5's `cleanInterval`: how long an idle watcher survives
    /// before the opportunistic GC sweep removes it.
    #[serde(with = "humantime_serde")]
    #[serde(default = "default::watcher_clean_interval")]
    pub watcher_clean_interval: Duration,

    /// The recursion/depth cap spec §4.3b and §8 (property 7) mandate for
    /// `AllParents`, `AllChildren`, and link chains.
    #[serde(default = "default::max_resolve_depth")]
    pub max_resolve_depth: usize,

    /// Cap on chained `@link` follows within a single path resolution.
    #[serde(default = "default::max_link_hops")]
    pub max_link_hops: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            watcher_clean_interval: default::watcher_clean_interval(),
            max_resolve_depth: default::max_resolve_depth(),
            max_link_hops: default::max_link_hops(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Type-provider identifiers to eagerly resolve (and thus warm the
    /// provider cache for) at startup.
    #[serde(default)]
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Used for log/span attribution.
    #[serde(default = "default::service_name")]
    pub service_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default::service_name(),
        }
    }
}

pub mod default {
    use std::time::Duration;

    pub fn watcher_clean_interval() -> Duration {
        Duration::from_secs(60)
    }

    pub fn max_resolve_depth() -> usize {
        64
    }

    pub fn max_link_hops() -> usize {
        32
    }

    pub fn service_name() -> String {
        "livetree".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = indoc::indoc! {r#"
        [tree]

        [registry]

        [service]
    "#};

    const FULL_TOML: &str = indoc::indoc! {r#"
        [tree]
        watcher_clean_interval = "60s"
        max_resolve_depth = 64
        max_link_hops = 32

        [registry]
        providers = ["plugins/crm"]

        [service]
        service_name = "livetree"
    "#};

    fn from_toml(s: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = from_toml(MINIMAL_TOML);
        assert_eq!(config.tree.watcher_clean_interval, Duration::from_secs(60));
        assert_eq!(config.tree.max_resolve_depth, 64);
        assert_eq!(config.tree.max_link_hops, 32);
        assert!(config.registry.providers.is_empty());
        assert_eq!(config.service.service_name, "livetree");
    }

    #[test]
    fn full_config_round_trips_fields() {
        let config = from_toml(FULL_TOML);
        assert_eq!(config.registry.providers, vec!["plugins/crm".to_string()]);
        assert_eq!(config.service.service_name, "livetree");
    }

    #[test]
    fn empty_document_falls_back_to_defaults() {
        let config = from_toml("");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn env_override_takes_precedence() {
        std::env::set_var("LIVETREE__SERVICE__SERVICE_NAME", "livetree-test");
        std::env::set_var("LIVETREE__TREE__MAX_LINK_HOPS", "16");

        let config = load_config(None).unwrap();
        assert_eq!(config.service.service_name, "livetree-test");
        assert_eq!(config.tree.max_link_hops, 16);

        std::env::remove_var("LIVETREE__SERVICE__SERVICE_NAME");
        std::env::remove_var("LIVETREE__TREE__MAX_LINK_HOPS");
    }
}
