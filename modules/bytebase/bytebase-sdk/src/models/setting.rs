//! Workspace settings, keyed by a closed set of well-known names.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BytebaseError;
use crate::mask::{FieldMask, FieldSpec, Patch, Upsert};
use crate::models::{Condition, State};
use crate::names::{Collection, ResourceName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingName {
    WorkspaceApproval,
    WorkspaceProfile,
    ExternalApproval,
    DataClassification,
}

impl SettingName {
    pub const ALL: [SettingName; 4] = [
        Self::WorkspaceApproval,
        Self::WorkspaceProfile,
        Self::ExternalApproval,
        Self::DataClassification,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkspaceApproval => "bb.workspace.approval",
            Self::WorkspaceProfile => "bb.workspace.profile",
            Self::ExternalApproval => "bb.workspace.approval.external",
            Self::DataClassification => "bb.workspace.data-classification",
        }
    }
}

impl fmt::Display for SettingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingName {
    type Err = BytebaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| BytebaseError::invalid_argument(format!("unknown setting '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStepType {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalStep {
    #[serde(rename = "type")]
    pub kind: ApprovalStepType,
    /// Roles whose holders may approve this step, `roles/{id}`.
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalRule {
    pub title: String,
    pub description: String,
    pub condition: Condition,
    pub steps: Vec<ApprovalStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceApprovalSetting {
    pub rules: Vec<ApprovalRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceProfileSetting {
    pub external_url: String,
    pub disallow_signup: bool,
    pub require_2fa: bool,
    pub outbound_ip_list: Vec<String>,
    #[serde(
        with = "bb_utils::humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub token_duration: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalApprovalNode {
    pub id: String,
    pub title: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalApprovalSetting {
    pub nodes: Vec<ExternalApprovalNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassificationLevel {
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataClassification {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataClassificationConfig {
    pub id: String,
    pub title: String,
    pub levels: Vec<ClassificationLevel>,
    /// Keyed by classification id, e.g. `"1-2"`.
    pub classification: BTreeMap<String, DataClassification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataClassificationSetting {
    pub configs: Vec<DataClassificationConfig>,
}

/// The value of a setting; the variant is selected by the setting name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingValue {
    #[serde(rename = "workspaceApprovalSettingValue")]
    WorkspaceApproval(WorkspaceApprovalSetting),
    #[serde(rename = "workspaceProfileSettingValue")]
    WorkspaceProfile(WorkspaceProfileSetting),
    #[serde(rename = "externalApprovalSettingValue")]
    ExternalApproval(ExternalApprovalSetting),
    #[serde(rename = "dataClassificationSettingValue")]
    DataClassification(DataClassificationSetting),
}

impl SettingValue {
    /// The setting this value belongs to.
    #[must_use]
    pub fn setting_name(&self) -> SettingName {
        match self {
            Self::WorkspaceApproval(_) => SettingName::WorkspaceApproval,
            Self::WorkspaceProfile(_) => SettingName::WorkspaceProfile,
            Self::ExternalApproval(_) => SettingName::ExternalApproval,
            Self::DataClassification(_) => SettingName::DataClassification,
        }
    }

    /// # Errors
    /// Returns `InvalidExpression` for an approval rule whose condition does
    /// not parse.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        match self {
            Self::WorkspaceApproval(approval) => approval
                .rules
                .iter()
                .try_for_each(|rule| rule.condition.check()),
            _ => Ok(()),
        }
    }
}

/// A workspace setting, `settings/{well-known-name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SettingWire", into = "SettingWire")]
pub struct Setting {
    pub name: ResourceName,
    pub state: State,
    pub value: SettingValue,
}

impl Setting {
    #[must_use]
    pub fn new(value: SettingValue) -> Self {
        Self {
            name: ResourceName::setting(value.setting_name()),
            state: State::Active,
            value,
        }
    }

    /// # Errors
    /// Returns `InvalidArgument` if `name` is not a setting name.
    pub fn setting_name(&self) -> Result<SettingName, BytebaseError> {
        self.name.expect(Collection::Settings)?.id().parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingWire {
    name: ResourceName,
    #[serde(default)]
    state: State,
    value: SettingValue,
}

impl From<Setting> for SettingWire {
    fn from(s: Setting) -> Self {
        Self {
            name: s.name,
            state: s.state,
            value: s.value,
        }
    }
}

impl TryFrom<SettingWire> for Setting {
    type Error = BytebaseError;

    fn try_from(w: SettingWire) -> Result<Self, Self::Error> {
        let setting = Self {
            name: w.name,
            state: w.state,
            value: w.value,
        };
        let expected = setting.setting_name()?;
        if setting.value.setting_name() != expected {
            return Err(BytebaseError::invalid_argument(format!(
                "setting '{expected}' cannot hold a {} value",
                setting.value.setting_name()
            )));
        }
        Ok(setting)
    }
}

/// Create-or-replace input for a setting. The only mutable path is `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingUpsert {
    pub value: SettingValue,
}

impl Upsert for SettingUpsert {
    const PAYLOAD: &'static str = "value";
}

impl Patch for SettingUpsert {
    type Target = Setting;

    const FIELDS: &'static [FieldSpec] = &[FieldSpec::required("value")];

    fn is_set(&self, path: &str) -> bool {
        path == "value"
    }

    fn check_values(&self, _mask: &FieldMask) -> Result<(), BytebaseError> {
        self.value.validate()
    }

    fn apply(&self, _mask: &FieldMask, target: &mut Setting) {
        target.value = self.value.clone();
    }
}
