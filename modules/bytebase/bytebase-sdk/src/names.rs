//! Hierarchical resource names.
//!
//! A name is a path of alternating collection/id segments, e.g.
//! `instances/i1/databases/orders` or `projects/proj-a/policies/backup`.
//! Construction checks the id grammar of the collection and whether the
//! collection may live under the given parent.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BytebaseError;
use crate::models::SettingName;

#[allow(clippy::expect_used)] // literal pattern, cannot fail
static STANDARD_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*$").expect("static regex should not panic")
});

#[allow(clippy::expect_used)] // literal pattern, cannot fail
static EMAIL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s/]+@[^@\s/]+\.[^@\s/]+$").expect("static regex should not panic")
});

/// Id used for "all" / "current" wildcards, e.g. `instances/-/databases`.
/// Only [`ResourceName::all_instances`], [`ResourceName::workspace`] and
/// [`ResourceName::parse`] of those two names produce it.
pub const WILDCARD_ID: &str = "-";

/// The built-in project every unassigned database belongs to.
pub const DEFAULT_PROJECT_ID: &str = "default";

/// Suffix addressing a database's catalog.
pub const CATALOG_SUFFIX: &str = "catalog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Environments,
    Instances,
    Databases,
    Projects,
    DatabaseGroups,
    Users,
    Groups,
    Roles,
    Policies,
    Settings,
    ReviewConfigs,
    Risks,
    Workspaces,
}

impl Collection {
    pub const ALL: [Collection; 13] = [
        Self::Environments,
        Self::Instances,
        Self::Databases,
        Self::Projects,
        Self::DatabaseGroups,
        Self::Users,
        Self::Groups,
        Self::Roles,
        Self::Policies,
        Self::Settings,
        Self::ReviewConfigs,
        Self::Risks,
        Self::Workspaces,
    ];

    /// The path segment of this collection.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Environments => "environments",
            Self::Instances => "instances",
            Self::Databases => "databases",
            Self::Projects => "projects",
            Self::DatabaseGroups => "databaseGroups",
            Self::Users => "users",
            Self::Groups => "groups",
            Self::Roles => "roles",
            Self::Policies => "policies",
            Self::Settings => "settings",
            Self::ReviewConfigs => "reviewConfigs",
            Self::Risks => "risks",
            Self::Workspaces => "workspaces",
        }
    }

    /// Query parameter carrying the caller-chosen id of a create call.
    #[must_use]
    pub fn id_param(self) -> &'static str {
        match self {
            Self::Environments => "environmentId",
            Self::Instances => "instanceId",
            Self::Databases => "databaseId",
            Self::Projects => "projectId",
            Self::DatabaseGroups => "databaseGroupId",
            Self::Users => "userId",
            Self::Groups => "groupEmail",
            Self::Roles => "roleId",
            Self::Policies => "policyId",
            Self::Settings => "settingId",
            Self::ReviewConfigs => "reviewConfigId",
            Self::Risks => "riskId",
            Self::Workspaces => "workspaceId",
        }
    }

    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == segment)
    }

    /// Whether a name in this collection may sit under `parent`.
    #[must_use]
    pub fn accepts_parent(self, parent: Option<Collection>) -> bool {
        match self {
            Self::Databases => parent == Some(Self::Instances),
            Self::DatabaseGroups => parent == Some(Self::Projects),
            Self::Policies => matches!(
                parent,
                None | Some(
                    Self::Environments | Self::Instances | Self::Databases | Self::Projects
                )
            ),
            _ => parent.is_none(),
        }
    }

    /// Whether deleting a resource of this collection removes it for good.
    #[must_use]
    pub fn hard_delete(self) -> bool {
        matches!(
            self,
            Self::Roles
                | Self::Groups
                | Self::DatabaseGroups
                | Self::Risks
                | Self::Policies
                | Self::ReviewConfigs
        )
    }

    fn check_id(self, id: &str) -> Result<(), String> {
        if id.is_empty() {
            return Err("empty id".to_owned());
        }
        match self {
            Self::Databases => {
                if id.contains('/') || id.chars().any(char::is_whitespace) {
                    return Err(format!("database name '{id}' contains '/' or whitespace"));
                }
            }
            Self::Groups => {
                if !EMAIL_ID.is_match(id) {
                    return Err(format!("group id '{id}' is not an email address"));
                }
            }
            Self::Settings => {
                SettingName::from_str(id).map_err(|e| e.to_string())?;
            }
            _ => {
                if !STANDARD_ID.is_match(id) {
                    return Err(format!(
                        "id '{id}' must start with a lowercase letter and use only lowercase letters, digits and '-'"
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated resource name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceName {
    parent: Option<Box<ResourceName>>,
    collection: Collection,
    id: String,
}

impl ResourceName {
    /// A top-level name `collection/{id}`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the id violates the collection's grammar
    /// or the collection requires a parent.
    pub fn new(collection: Collection, id: impl Into<String>) -> Result<Self, BytebaseError> {
        Self::build(None, collection, id.into()).map_err(BytebaseError::invalid_argument)
    }

    /// A nested name `parent/collection/{id}`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the id is invalid or `collection` may not
    /// live under `parent`.
    pub fn child(
        parent: &ResourceName,
        collection: Collection,
        id: impl Into<String>,
    ) -> Result<Self, BytebaseError> {
        Self::build(Some(parent.clone()), collection, id.into())
            .map_err(BytebaseError::invalid_argument)
    }

    fn build(
        parent: Option<ResourceName>,
        collection: Collection,
        id: String,
    ) -> Result<Self, String> {
        let parent_collection = parent.as_ref().map(|p| p.collection);
        if !collection.accepts_parent(parent_collection) {
            return Err(match parent_collection {
                Some(p) => format!("{collection} cannot be nested under {p}"),
                None => format!("{collection} requires a parent"),
            });
        }
        collection.check_id(&id)?;
        Ok(Self {
            parent: parent.map(Box::new),
            collection,
            id,
        })
    }

    /// Parse a canonical name. The wildcard id is accepted only in
    /// `instances/-` and `workspaces/-`.
    ///
    /// # Errors
    /// Returns `MalformedName` on an odd segment count, an unknown
    /// collection, a forbidden parent or an invalid id.
    pub fn parse(name: &str) -> Result<Self, BytebaseError> {
        let segments: Vec<&str> = name.split('/').collect();
        if name.is_empty() || segments.len() % 2 != 0 {
            return Err(BytebaseError::malformed_name(
                name,
                "expected alternating collection/id segments",
            ));
        }
        let mut current: Option<ResourceName> = None;
        for pair in segments.chunks_exact(2) {
            let collection = Collection::from_segment(pair[0]).ok_or_else(|| {
                BytebaseError::malformed_name(name, format!("unknown collection '{}'", pair[0]))
            })?;
            current = Some(match (current, collection, pair[1]) {
                (None, Collection::Instances, WILDCARD_ID) => Self::all_instances(),
                (None, Collection::Workspaces, WILDCARD_ID) => Self::workspace(),
                (parent, _, id) => Self::build(parent, collection, id.to_owned())
                    .map_err(|reason| BytebaseError::malformed_name(name, reason))?,
            });
        }
        current.ok_or_else(|| BytebaseError::malformed_name(name, "empty name"))
    }

    #[must_use]
    pub fn parent(&self) -> Option<&ResourceName> {
        self.parent.as_deref()
    }

    #[must_use]
    pub fn collection(&self) -> Collection {
        self.collection
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Check that this name belongs to `collection`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` naming the expected collection.
    pub fn expect(&self, collection: Collection) -> Result<&Self, BytebaseError> {
        if self.collection == collection {
            Ok(self)
        } else {
            Err(BytebaseError::invalid_argument(format!(
                "'{self}' is not a resource of {collection}"
            )))
        }
    }

    /// `parent/collection` as used by list and create requests.
    #[must_use]
    pub fn collection_path(parent: Option<&ResourceName>, collection: Collection) -> String {
        match parent {
            Some(p) => format!("{p}/{collection}"),
            None => collection.as_str().to_owned(),
        }
    }

    /// `<database>/catalog`.
    #[must_use]
    pub fn catalog_path(&self) -> String {
        format!("{self}/{CATALOG_SUFFIX}")
    }

    /// # Errors
    /// Returns `InvalidArgument` for an invalid id.
    pub fn environment(id: &str) -> Result<Self, BytebaseError> {
        Self::new(Collection::Environments, id)
    }

    /// # Errors
    /// Returns `InvalidArgument` for an invalid id.
    pub fn instance(id: &str) -> Result<Self, BytebaseError> {
        Self::new(Collection::Instances, id)
    }

    /// # Errors
    /// Returns `InvalidArgument` for an invalid instance id or database name.
    pub fn database(instance: &str, database: &str) -> Result<Self, BytebaseError> {
        Self::child(&Self::instance(instance)?, Collection::Databases, database)
    }

    /// # Errors
    /// Returns `InvalidArgument` for an invalid id.
    pub fn project(id: &str) -> Result<Self, BytebaseError> {
        Self::new(Collection::Projects, id)
    }

    /// `projects/default`.
    #[must_use]
    pub fn default_project() -> Self {
        Self {
            parent: None,
            collection: Collection::Projects,
            id: DEFAULT_PROJECT_ID.to_owned(),
        }
    }

    /// # Errors
    /// Returns `InvalidArgument` for an invalid project or group id.
    pub fn database_group(project: &str, id: &str) -> Result<Self, BytebaseError> {
        Self::child(&Self::project(project)?, Collection::DatabaseGroups, id)
    }

    /// # Errors
    /// Returns `InvalidArgument` for an invalid id.
    pub fn user(id: &str) -> Result<Self, BytebaseError> {
        Self::new(Collection::Users, id)
    }

    /// # Errors
    /// Returns `InvalidArgument` unless `email` looks like an email address.
    pub fn group(email: &str) -> Result<Self, BytebaseError> {
        Self::new(Collection::Groups, email)
    }

    /// A workspace IAM role, `roles/{id}`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an invalid id.
    pub fn role(id: &str) -> Result<Self, BytebaseError> {
        Self::new(Collection::Roles, id)
    }

    /// `policies/{id}` at the workspace level or under `parent`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an invalid id or a parent that cannot
    /// hold policies.
    pub fn policy(parent: Option<&ResourceName>, id: &str) -> Result<Self, BytebaseError> {
        match parent {
            Some(p) => Self::child(p, Collection::Policies, id),
            None => Self::new(Collection::Policies, id),
        }
    }

    #[must_use]
    pub fn setting(name: SettingName) -> Self {
        Self {
            parent: None,
            collection: Collection::Settings,
            id: name.as_str().to_owned(),
        }
    }

    /// # Errors
    /// Returns `InvalidArgument` for an invalid id.
    pub fn review_config(id: &str) -> Result<Self, BytebaseError> {
        Self::new(Collection::ReviewConfigs, id)
    }

    /// # Errors
    /// Returns `InvalidArgument` for an invalid id.
    pub fn risk(id: &str) -> Result<Self, BytebaseError> {
        Self::new(Collection::Risks, id)
    }

    /// The current workspace, `workspaces/-`.
    #[must_use]
    pub fn workspace() -> Self {
        Self {
            parent: None,
            collection: Collection::Workspaces,
            id: WILDCARD_ID.to_owned(),
        }
    }

    /// `instances/-`, the parent for listing databases across instances.
    #[must_use]
    pub fn all_instances() -> Self {
        Self {
            parent: None,
            collection: Collection::Instances,
            id: WILDCARD_ID.to_owned(),
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{parent}/")?;
        }
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for ResourceName {
    type Err = BytebaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
