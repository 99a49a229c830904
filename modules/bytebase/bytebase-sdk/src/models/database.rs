use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BytebaseError;
use crate::mask::{FieldMask, FieldSpec, Patch, assign, assign_opt};
use crate::models::{Engine, State};
use crate::names::{CATALOG_SUFFIX, Collection, ResourceName};
use crate::transport::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    #[default]
    Ok,
    NotFound,
}

/// A database discovered on an instance, `instances/{id}/databases/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub project: ResourceName,
    /// Environment set on the database itself, overriding the instance's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<ResourceName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_environment: Option<ResourceName>,
    pub engine: Engine,
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub sync_state: SyncState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_sync_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Database {
    /// The owning instance.
    #[must_use]
    pub fn instance(&self) -> Option<&ResourceName> {
        self.name.parent()
    }

    /// The database name on the server, i.e. the trailing id.
    #[must_use]
    pub fn database_name(&self) -> &str {
        self.name.id()
    }

    /// Whether the database still sits in the default project.
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.project == ResourceName::default_project()
    }
}

/// Partial update data for a database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabasePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ResourceName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<ResourceName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

impl Patch for DatabasePatch {
    type Target = Database;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("project"),
        FieldSpec::clearable("environment"),
        FieldSpec::clearable("labels"),
    ];

    const IMMUTABLE: &'static [&'static str] = &[
        "engine",
        "effective_environment",
        "schema_version",
        "sync_state",
        "successful_sync_time",
    ];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "project" => self.project.is_some(),
            "environment" => self.environment.is_some(),
            "labels" => self.labels.is_some(),
            _ => false,
        }
    }

    fn check_values(&self, mask: &FieldMask) -> Result<(), BytebaseError> {
        if mask.contains("project")
            && let Some(project) = &self.project
        {
            project.expect(Collection::Projects)?;
        }
        if mask.contains("environment")
            && let Some(env) = &self.environment
        {
            env.expect(Collection::Environments)?;
        }
        Ok(())
    }

    fn apply(&self, mask: &FieldMask, target: &mut Database) {
        if mask.contains("project")
            && let Some(project) = &self.project
        {
            target.project = project.clone();
        }
        assign_opt(mask, "environment", self.environment.as_ref(), &mut target.environment);
        assign(mask, "labels", self.labels.as_ref(), &mut target.labels);
    }
}

/// One entry of a batch update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDatabaseRequest {
    pub name: ResourceName,
    pub patch: DatabasePatch,
    pub update_mask: FieldMask,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateDatabasesRequest {
    pub requests: Vec<UpdateDatabaseRequest>,
}

/// Per-entry outcome as it travels on the wire: exactly one of `database`
/// and `status` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateEntryResult {
    pub name: ResourceName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<Database>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl BatchUpdateEntryResult {
    #[must_use]
    pub fn ok(database: Database) -> Self {
        Self {
            name: database.name.clone(),
            database: Some(database),
            status: None,
        }
    }

    #[must_use]
    pub fn failed(name: ResourceName, status: Status) -> Self {
        Self {
            name,
            database: None,
            status: Some(status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateDatabasesResponse {
    pub results: Vec<BatchUpdateEntryResult>,
}

/// Outcome of one batch entry as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseUpdateOutcome {
    pub name: ResourceName,
    pub result: Result<Database, BytebaseError>,
}

impl TryFrom<BatchUpdateEntryResult> for DatabaseUpdateOutcome {
    type Error = BytebaseError;

    fn try_from(entry: BatchUpdateEntryResult) -> Result<Self, Self::Error> {
        let result = match (entry.database, entry.status) {
            (Some(db), None) => Ok(db),
            (None, Some(status)) => Err(BytebaseError::from(status)),
            _ => {
                return Err(BytebaseError::internal(format!(
                    "batch entry for '{}' must carry exactly one of database and status",
                    entry.name
                )));
            }
        };
        Ok(Self {
            name: entry.name,
            result,
        })
    }
}

/// Column-level metadata of a database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseCatalog {
    /// `instances/{id}/databases/{name}/catalog`.
    pub name: String,
    pub schemas: Vec<SchemaCatalog>,
}

impl DatabaseCatalog {
    /// The database this catalog belongs to.
    ///
    /// # Errors
    /// Returns `MalformedName` unless `name` is a database name followed by
    /// `/catalog`.
    pub fn database(&self) -> Result<ResourceName, BytebaseError> {
        let db = self
            .name
            .strip_suffix(CATALOG_SUFFIX)
            .and_then(|s| s.strip_suffix('/'))
            .ok_or_else(|| BytebaseError::malformed_name(&self.name, "missing /catalog suffix"))?;
        let db = ResourceName::parse(db)?;
        db.expect(Collection::Databases)
            .map_err(|_| BytebaseError::malformed_name(&self.name, "catalog parent is not a database"))?;
        Ok(db)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaCatalog {
    pub name: String,
    pub tables: Vec<TableCatalog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableCatalog {
    pub name: String,
    pub columns: Vec<ColumnCatalog>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub classification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnCatalog {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub semantic_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub classification: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}
