//! Configuration for the static Bytebase plugin.

use std::collections::BTreeMap;

use bytebase_sdk::models::{Engine, EnvironmentTier};
use serde::Deserialize;

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticPluginConfig {
    /// Principal every request is served as.
    pub caller: CallerConfig,

    /// Title of the built-in `projects/default`.
    pub default_project_title: String,

    /// Upper bound for page sizes; also used when a request asks for 0.
    pub page_size_limit: u32,

    /// Environments present at startup.
    pub environments: Vec<EnvironmentConfig>,

    /// Instances present at startup, with the databases a sync discovers.
    pub instances: Vec<InstanceConfig>,
}

impl Default for StaticPluginConfig {
    fn default() -> Self {
        Self {
            caller: CallerConfig::default(),
            default_project_title: "Default project".to_owned(),
            page_size_limit: 1000,
            environments: vec![
                EnvironmentConfig::new("test", "Test", 0),
                EnvironmentConfig::new("prod", "Prod", 1),
            ],
            instances: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallerConfig {
    /// Seeds `users/{id}`.
    pub id: String,
    pub email: String,
    pub title: String,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            id: "admin".to_owned(),
            email: "admin@example.com".to_owned(),
            title: "Admin".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub tier: EnvironmentTier,
}

impl EnvironmentConfig {
    fn new(id: &str, title: &str, order: i32) -> Self {
        Self {
            id: id.to_owned(),
            title: title.to_owned(),
            order,
            tier: EnvironmentTier::Unprotected,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    pub id: String,
    pub title: String,
    pub engine: Engine,
    /// Environment id, e.g. `prod`.
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Discovered databases start out in the default project.
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}
