use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mask::{FieldMask, FieldSpec, Patch, assign};
use crate::models::State;
use crate::names::ResourceName;

/// A project groups databases, members and issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub title: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub allow_modify_statement: bool,
    #[serde(default)]
    pub auto_resolve_issue: bool,
    #[serde(default)]
    pub enforce_issue_title: bool,
    #[serde(default)]
    pub data_classification_config_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
}

impl Project {
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.name == ResourceName::default_project()
    }
}

/// Data for creating a new project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewProject {
    pub title: String,
    pub key: String,
    pub allow_modify_statement: bool,
    pub auto_resolve_issue: bool,
    pub enforce_issue_title: bool,
    pub data_classification_config_id: String,
}

impl NewProject {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update data for a project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_modify_statement: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_resolve_issue: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforce_issue_title: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_classification_config_id: Option<String>,
}

impl Patch for ProjectPatch {
    type Target = Project;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("title"),
        FieldSpec::required("key"),
        FieldSpec::clearable("allow_modify_statement"),
        FieldSpec::clearable("auto_resolve_issue"),
        FieldSpec::clearable("enforce_issue_title"),
        FieldSpec::clearable("data_classification_config_id"),
    ];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "title" => self.title.is_some(),
            "key" => self.key.is_some(),
            "allow_modify_statement" => self.allow_modify_statement.is_some(),
            "auto_resolve_issue" => self.auto_resolve_issue.is_some(),
            "enforce_issue_title" => self.enforce_issue_title.is_some(),
            "data_classification_config_id" => self.data_classification_config_id.is_some(),
            _ => false,
        }
    }

    fn apply(&self, mask: &FieldMask, target: &mut Project) {
        assign(mask, "title", self.title.as_ref(), &mut target.title);
        assign(mask, "key", self.key.as_ref(), &mut target.key);
        assign(
            mask,
            "allow_modify_statement",
            self.allow_modify_statement.as_ref(),
            &mut target.allow_modify_statement,
        );
        assign(
            mask,
            "auto_resolve_issue",
            self.auto_resolve_issue.as_ref(),
            &mut target.auto_resolve_issue,
        );
        assign(
            mask,
            "enforce_issue_title",
            self.enforce_issue_title.as_ref(),
            &mut target.enforce_issue_title,
        );
        assign(
            mask,
            "data_classification_config_id",
            self.data_classification_config_id.as_ref(),
            &mut target.data_classification_config_id,
        );
    }
}
