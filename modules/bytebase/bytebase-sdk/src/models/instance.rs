use std::collections::BTreeSet;
use std::time::Duration;

use bb_utils::SecretString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BytebaseError;
use crate::mask::{FieldMask, FieldSpec, Patch, assign, assign_opt};
use crate::models::{Engine, State};
use crate::names::{Collection, ResourceName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceType {
    #[default]
    Admin,
    ReadOnly,
}

/// Connection settings of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DataSourceType,
    pub username: String,
    #[serde(skip_serializing_if = "SecretString::is_empty")]
    pub password: SecretString,
    pub host: String,
    pub port: String,
    pub database: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ssl_ca: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ssl_cert: String,
    #[serde(skip_serializing_if = "SecretString::is_empty")]
    pub ssl_key: SecretString,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host_override: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub port_override: String,
}

impl DataSource {
    /// Host/port overrides are only meaningful for read-only replicas.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an empty id or an override on an admin
    /// data source.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        if self.id.is_empty() {
            return Err(BytebaseError::invalid_argument("data source id is required"));
        }
        if self.kind != DataSourceType::ReadOnly
            && (!self.host_override.is_empty() || !self.port_override.is_empty())
        {
            return Err(BytebaseError::invalid_argument(format!(
                "data source '{}': host_override/port_override require type READ_ONLY",
                self.id
            )));
        }
        Ok(())
    }

    /// Whether this data source points at `host` / `port` (either may be
    /// left out).
    #[must_use]
    pub fn points_at(&self, host: Option<&str>, port: Option<&str>) -> bool {
        host.is_none_or(|h| self.host == h || self.host_override == h)
            && port.is_none_or(|p| self.port == p || self.port_override == p)
    }
}

impl Instance {
    /// The instance as returned to callers: stored data source passwords and
    /// SSL keys are cleared, so they are write-only over the API.
    #[must_use]
    pub fn redacted(mut self) -> Self {
        for source in &mut self.data_sources {
            source.password = SecretString::default();
            source.ssl_key = SecretString::default();
        }
        self
    }
}

/// Validate a full data source list: each entry valid, ids unique.
///
/// # Errors
/// Returns `InvalidArgument` for the first offending entry.
pub fn validate_data_sources(sources: &[DataSource]) -> Result<(), BytebaseError> {
    let mut seen = BTreeSet::new();
    for ds in sources {
        ds.validate()?;
        if !seen.insert(ds.id.as_str()) {
            return Err(BytebaseError::invalid_argument(format!(
                "duplicate data source id '{}'",
                ds.id
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceOptions {
    /// How often the schema is synced; `None` disables periodic sync.
    #[serde(
        with = "bb_utils::humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub sync_interval: Option<Duration>,
    pub maximum_connections: i32,
}

/// A database server registered with Bytebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub title: String,
    pub engine: Engine,
    #[serde(default)]
    pub engine_version: String,
    #[serde(default)]
    pub external_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<ResourceName>,
    #[serde(default)]
    pub activation: bool,
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    #[serde(default)]
    pub options: InstanceOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
}

/// Data for creating a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInstance {
    pub title: String,
    pub engine: Engine,
    #[serde(default)]
    pub external_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<ResourceName>,
    #[serde(default)]
    pub activation: bool,
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    #[serde(default)]
    pub options: InstanceOptions,
}

impl NewInstance {
    #[must_use]
    pub fn new(title: impl Into<String>, engine: Engine) -> Self {
        Self {
            title: title.into(),
            engine,
            external_link: String::new(),
            environment: None,
            activation: false,
            data_sources: Vec::new(),
            options: InstanceOptions::default(),
        }
    }

    /// # Errors
    /// Returns `InvalidArgument` for an empty title, an environment name
    /// outside `environments/`, or an invalid data source.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        if self.title.is_empty() {
            return Err(BytebaseError::invalid_argument("instance title is required"));
        }
        if let Some(env) = &self.environment {
            env.expect(Collection::Environments)?;
        }
        validate_data_sources(&self.data_sources)
    }
}

/// Partial update data for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstancePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<ResourceName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_sources: Option<Vec<DataSource>>,
    #[serde(skip_serializing_if = "InstanceOptionsPatch::is_empty")]
    pub options: InstanceOptionsPatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceOptionsPatch {
    #[serde(
        with = "bb_utils::humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub sync_interval: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_connections: Option<i32>,
}

impl InstanceOptionsPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sync_interval.is_none() && self.maximum_connections.is_none()
    }
}

impl Patch for InstancePatch {
    type Target = Instance;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("title"),
        FieldSpec::clearable("external_link"),
        FieldSpec::clearable("environment"),
        FieldSpec::clearable("activation"),
        FieldSpec::required("data_sources"),
        FieldSpec::clearable("options.sync_interval"),
        FieldSpec::clearable("options.maximum_connections"),
    ];

    const IMMUTABLE: &'static [&'static str] = &["engine", "engine_version"];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "title" => self.title.is_some(),
            "external_link" => self.external_link.is_some(),
            "environment" => self.environment.is_some(),
            "activation" => self.activation.is_some(),
            "data_sources" => self.data_sources.is_some(),
            "options.sync_interval" => self.options.sync_interval.is_some(),
            "options.maximum_connections" => self.options.maximum_connections.is_some(),
            _ => false,
        }
    }

    fn check_values(&self, mask: &FieldMask) -> Result<(), BytebaseError> {
        if mask.contains("environment")
            && let Some(env) = &self.environment
        {
            env.expect(Collection::Environments)?;
        }
        if mask.contains("data_sources")
            && let Some(sources) = &self.data_sources
        {
            validate_data_sources(sources)?;
        }
        Ok(())
    }

    fn apply(&self, mask: &FieldMask, target: &mut Instance) {
        assign(mask, "title", self.title.as_ref(), &mut target.title);
        assign(mask, "external_link", self.external_link.as_ref(), &mut target.external_link);
        assign_opt(mask, "environment", self.environment.as_ref(), &mut target.environment);
        assign(mask, "activation", self.activation.as_ref(), &mut target.activation);
        assign(mask, "data_sources", self.data_sources.as_ref(), &mut target.data_sources);
        assign_opt(
            mask,
            "options.sync_interval",
            self.options.sync_interval.as_ref(),
            &mut target.options.sync_interval,
        );
        assign(
            mask,
            "options.maximum_connections",
            self.options.maximum_connections.as_ref(),
            &mut target.options.maximum_connections,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(id: &str) -> DataSource {
        DataSource {
            id: id.into(),
            host: "10.0.0.1".into(),
            port: "3306".into(),
            ..DataSource::default()
        }
    }

    #[test]
    fn overrides_require_read_only() {
        let mut ds = admin("admin");
        ds.host_override = "proxy".into();
        assert!(ds.validate().is_err());
        ds.kind = DataSourceType::ReadOnly;
        assert!(ds.validate().is_ok());
    }

    #[test]
    fn duplicate_data_source_ids_are_rejected() {
        assert!(validate_data_sources(&[admin("a"), admin("b")]).is_ok());
        assert!(validate_data_sources(&[admin("a"), admin("a")]).is_err());
    }

    #[test]
    fn nested_option_paths_apply() {
        let mut instance = Instance {
            name: ResourceName::instance("i1").unwrap(),
            state: State::Active,
            title: "mysql".into(),
            engine: Engine::Mysql,
            engine_version: "8.0".into(),
            external_link: String::new(),
            environment: None,
            activation: true,
            data_sources: vec![admin("admin")],
            options: InstanceOptions {
                sync_interval: Some(Duration::from_secs(3600)),
                maximum_connections: 10,
            },
            create_time: None,
        };
        let patch = InstancePatch {
            options: InstanceOptionsPatch {
                maximum_connections: Some(50),
                sync_interval: None,
            },
            title: Some("ignored".into()),
            ..InstancePatch::default()
        };
        let mask = FieldMask::from_paths(["options.maximum_connections", "options.sync_interval"])
            .unwrap();
        mask.validate(&patch).unwrap();
        patch.apply(&mask, &mut instance);
        assert_eq!(instance.options.maximum_connections, 50);
        assert_eq!(instance.options.sync_interval, None);
        assert_eq!(instance.title, "mysql");
    }

    #[test]
    fn redaction_drops_secrets_from_the_wire_form() {
        let mut source = admin("admin");
        source.password = "hunter2".into();
        source.ssl_key = "-----BEGIN KEY-----".into();
        source.ssl_cert = "cert".into();
        let instance = Instance {
            name: ResourceName::instance("i1").unwrap(),
            state: State::Active,
            title: "mysql".into(),
            engine: Engine::Mysql,
            engine_version: String::new(),
            external_link: String::new(),
            environment: None,
            activation: false,
            data_sources: vec![source],
            options: InstanceOptions::default(),
            create_time: None,
        };
        let json = serde_json::to_value(instance.redacted()).unwrap();
        let source = &json["dataSources"][0];
        assert!(source.get("password").is_none());
        assert!(source.get("sslKey").is_none());
        assert_eq!(source["sslCert"], "cert");
        assert_eq!(source["host"], "10.0.0.1");
    }

    #[test]
    fn engine_is_immutable() {
        let mask = FieldMask::from_paths(["engine"]).unwrap();
        assert!(mask.validate(&InstancePatch::default()).is_err());
    }

    #[test]
    fn wire_form_is_camel_case() {
        let patch = InstancePatch {
            external_link: Some("https://console".into()),
            options: InstanceOptionsPatch {
                sync_interval: Some(Duration::from_secs(90)),
                maximum_connections: None,
            },
            ..InstancePatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "externalLink": "https://console",
                "options": {"syncInterval": "1m 30s"}
            })
        );
    }
}
