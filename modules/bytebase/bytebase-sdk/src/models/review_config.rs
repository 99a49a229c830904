use serde::{Deserialize, Serialize};

use crate::error::BytebaseError;
use crate::mask::{FieldMask, FieldSpec, Patch, Upsert, assign};
use crate::models::{Engine, State};
use crate::names::{Collection, ResourceName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleLevel {
    Error,
    #[default]
    Warning,
    Disabled,
}

/// One SQL review rule, e.g. `column.no-null` at level ERROR for MYSQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlReviewRule {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub level: RuleLevel,
    /// Rule-specific JSON, kept as an opaque string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload: String,
    pub engine: Engine,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// A named set of SQL review rules applied to environments or projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewConfig {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub title: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<SqlReviewRule>,
    /// Environments and projects the config is attached to.
    #[serde(default)]
    pub resources: Vec<ResourceName>,
}

/// Create-or-replace input for a review config. `rules` is the payload and
/// always replaces; the other fields follow the update mask.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewConfigUpsert {
    pub rules: Vec<SqlReviewRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ResourceName>>,
}

impl ReviewConfigUpsert {
    /// The record created when nothing exists at `name` yet.
    #[must_use]
    pub fn into_review_config(self, name: ResourceName) -> ReviewConfig {
        ReviewConfig {
            name,
            state: State::Active,
            title: self.title.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(false),
            rules: self.rules,
            resources: self.resources.unwrap_or_default(),
        }
    }
}

impl Upsert for ReviewConfigUpsert {
    const PAYLOAD: &'static str = "rules";
}

impl Patch for ReviewConfigUpsert {
    type Target = ReviewConfig;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("rules"),
        FieldSpec::required("title"),
        FieldSpec::clearable("enabled"),
        FieldSpec::clearable("resources"),
    ];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "rules" => true,
            "title" => self.title.is_some(),
            "enabled" => self.enabled.is_some(),
            "resources" => self.resources.is_some(),
            _ => false,
        }
    }

    fn check_values(&self, _mask: &FieldMask) -> Result<(), BytebaseError> {
        for resource in self.resources.iter().flatten() {
            if !matches!(
                resource.collection(),
                Collection::Environments | Collection::Projects
            ) {
                return Err(BytebaseError::invalid_argument(format!(
                    "review configs attach to environments or projects, not '{resource}'"
                )));
            }
        }
        Ok(())
    }

    fn apply(&self, mask: &FieldMask, target: &mut ReviewConfig) {
        target.rules.clone_from(&self.rules);
        assign(mask, "title", self.title.as_ref(), &mut target.title);
        assign(mask, "enabled", self.enabled.as_ref(), &mut target.enabled);
        assign(mask, "resources", self.resources.as_ref(), &mut target.resources);
    }
}
