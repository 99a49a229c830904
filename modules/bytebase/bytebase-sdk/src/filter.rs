//! List filters and pagination.
//!
//! Every predicate of a filter must hold for an item to match; the default
//! filter matches every ACTIVE item. Filters travel to the server as JSON
//! and each one exposes `matches` so results can be checked on either side.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{Database, Engine, IamPolicy, Instance, Project, State, User, UserType};
use crate::names::ResourceName;

/// Which lifecycle states a listing admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateFilter {
    #[default]
    Active,
    Deleted,
    All,
}

impl StateFilter {
    #[must_use]
    pub fn admits(self, state: State) -> bool {
        match self {
            Self::Active => state == State::Active,
            Self::Deleted => state == State::Deleted,
            Self::All => true,
        }
    }

    fn is_default(&self) -> bool {
        *self == Self::Active
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn engine_allowed(engines: &BTreeSet<Engine>, engine: Engine) -> bool {
    engines.is_empty() || engines.contains(&engine)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceFilter {
    /// Case-insensitive substring of the title.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<ResourceName>,
    /// Instances hosting at least one database of this project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ResourceName>,
    #[serde(skip_serializing_if = "StateFilter::is_default")]
    pub state: StateFilter,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub engines: BTreeSet<Engine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl InstanceFilter {
    /// `databases` is consulted only for the `project` predicate.
    #[must_use]
    pub fn matches(&self, instance: &Instance, databases: &[Database]) -> bool {
        self.state.admits(instance.state)
            && contains_ci(&instance.title, &self.query)
            && self
                .environment
                .as_ref()
                .is_none_or(|env| instance.environment.as_ref() == Some(env))
            && engine_allowed(&self.engines, instance.engine)
            && (self.host.is_none() && self.port.is_none()
                || instance
                    .data_sources
                    .iter()
                    .any(|ds| ds.points_at(self.host.as_deref(), self.port.as_deref())))
            && self.project.as_ref().is_none_or(|project| {
                databases.iter().any(|db| {
                    db.instance() == Some(&instance.name) && db.project == *project
                })
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectFilter {
    /// Case-insensitive substring of the title or the id.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub query: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exclude_default: bool,
    #[serde(skip_serializing_if = "StateFilter::is_default")]
    pub state: StateFilter,
}

impl ProjectFilter {
    #[must_use]
    pub fn matches(&self, project: &Project) -> bool {
        self.state.admits(project.state)
            && (contains_ci(&project.title, &self.query)
                || contains_ci(project.name.id(), &self.query))
            && !(self.exclude_default && project.is_default())
    }
}

/// An exact `key=value` label predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl LabelSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseFilter {
    /// Case-insensitive substring of the database name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub query: String,
    /// Compared against the effective environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<ResourceName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ResourceName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<ResourceName>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub engines: BTreeSet<Engine>,
    /// All selectors must match.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelSelector>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exclude_unassigned: bool,
    #[serde(skip_serializing_if = "StateFilter::is_default")]
    pub state: StateFilter,
}

impl DatabaseFilter {
    #[must_use]
    pub fn matches(&self, database: &Database) -> bool {
        self.state.admits(database.state)
            && contains_ci(database.database_name(), &self.query)
            && self
                .environment
                .as_ref()
                .is_none_or(|env| database.effective_environment.as_ref() == Some(env))
            && self.project.as_ref().is_none_or(|p| database.project == *p)
            && self
                .instance
                .as_ref()
                .is_none_or(|i| database.instance() == Some(i))
            && engine_allowed(&self.engines, database.engine)
            && self
                .labels
                .iter()
                .all(|l| database.labels.get(&l.key) == Some(&l.value))
            && !(self.exclude_unassigned && database.is_unassigned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserFilter {
    /// Case-insensitive substring of the title.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Restrict to members of this project's IAM policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ResourceName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_types: Vec<UserType>,
    #[serde(skip_serializing_if = "StateFilter::is_default")]
    pub state: StateFilter,
}

impl UserFilter {
    /// `project_policy` is the IAM policy of `self.project`; a project
    /// filter without a policy matches nothing.
    #[must_use]
    pub fn matches(&self, user: &User, project_policy: Option<&IamPolicy>) -> bool {
        self.state.admits(user.state)
            && contains_ci(&user.title, &self.name)
            && self.email.as_ref().is_none_or(|e| user.email == *e)
            && (self.user_types.is_empty() || self.user_types.contains(&user.user_type))
            && (self.project.is_none() || project_policy.is_some_and(|p| p.has_user(user)))
    }
}

/// Cursor request. A zero `page_size` lets the client pick its default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageRequest {
    pub page_size: u32,
    /// Opaque; pass back exactly what the previous page returned.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_token: String,
}

impl PageRequest {
    #[must_use]
    pub fn first(page_size: u32) -> Self {
        Self {
            page_size,
            page_token: String::new(),
        }
    }

    #[must_use]
    pub fn next(&self, page_token: impl Into<String>) -> Self {
        Self {
            page_size: self.page_size,
            page_token: page_token.into(),
        }
    }
}

/// One page of a listing. An empty `next_page_token` marks the last page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: String,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, next_page_token: impl Into<String>) -> Self {
        Self {
            items,
            next_page_token: next_page_token.into(),
        }
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_empty()
    }
}
