//! Typed policies attached to the workspace, an environment, an instance, a
//! database or a project.
//!
//! On the wire a policy carries a `type` and four nullable payload slots.
//! In Rust the payload is a [`PolicyPayload`] enum, so a mismatched
//! `(type, payload)` pair cannot be built; decoding such a pair from JSON
//! fails with `InvalidArgument`.

use serde::{Deserialize, Serialize};

use crate::error::BytebaseError;
use crate::mask::{FieldMask, FieldSpec, Patch, Upsert, assign};
use crate::models::State;
use crate::names::{Collection, ResourceName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    DeploymentApproval,
    BackupPlan,
    SensitiveData,
    AccessControl,
}

impl PolicyType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeploymentApproval => "DEPLOYMENT_APPROVAL",
            Self::BackupPlan => "BACKUP_PLAN",
            Self::SensitiveData => "SENSITIVE_DATA",
            Self::AccessControl => "ACCESS_CONTROL",
        }
    }

    /// Whether a policy of this type may be attached under `parent`
    /// (`None` is the workspace).
    #[must_use]
    pub fn allowed_on(self, parent: Option<Collection>) -> bool {
        match self {
            Self::SensitiveData => parent == Some(Collection::Databases),
            Self::BackupPlan | Self::DeploymentApproval => {
                matches!(parent, Some(Collection::Environments | Collection::Projects))
            }
            Self::AccessControl => Collection::Policies.accepts_parent(parent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStrategy {
    #[default]
    Automatic,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentApprovalStrategy {
    pub deployment_type: String,
    pub approval_group: String,
    pub approval_strategy: ApprovalStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentApprovalPolicy {
    pub default_strategy: ApprovalStrategy,
    pub deployment_approval_strategies: Vec<DeploymentApprovalStrategy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupPlanSchedule {
    #[default]
    Unset,
    Never,
    Daily,
    Weekly,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupPlanPolicy {
    pub schedule: BackupPlanSchedule,
    /// Kept verbatim (e.g. `"168h"`); must parse as a duration.
    pub retention_duration: String,
}

impl BackupPlanPolicy {
    fn validate(&self) -> Result<(), BytebaseError> {
        if self.retention_duration.is_empty() {
            return Ok(());
        }
        bb_utils::humantime_serde::parse(&self.retention_duration)
            .map(|_| ())
            .map_err(|e| {
                BytebaseError::invalid_argument(format!(
                    "invalid retention duration '{}': {e}",
                    self.retention_duration
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaskType {
    #[default]
    Default,
    None,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensitiveData {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub mask_type: MaskType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensitiveDataPolicy {
    pub sensitive_data: Vec<SensitiveData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessControlRule {
    pub full_database: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessControlPolicy {
    pub disallow_rules: Vec<AccessControlRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyPayload {
    DeploymentApproval(DeploymentApprovalPolicy),
    BackupPlan(BackupPlanPolicy),
    SensitiveData(SensitiveDataPolicy),
    AccessControl(AccessControlPolicy),
}

impl PolicyPayload {
    #[must_use]
    pub fn policy_type(&self) -> PolicyType {
        match self {
            Self::DeploymentApproval(_) => PolicyType::DeploymentApproval,
            Self::BackupPlan(_) => PolicyType::BackupPlan,
            Self::SensitiveData(_) => PolicyType::SensitiveData,
            Self::AccessControl(_) => PolicyType::AccessControl,
        }
    }

    /// # Errors
    /// Returns `InvalidArgument` for an unparsable backup retention.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        match self {
            Self::BackupPlan(plan) => plan.validate(),
            _ => Ok(()),
        }
    }
}

/// A policy record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyWire", into = "PolicyWire")]
pub struct Policy {
    pub name: ResourceName,
    pub state: State,
    pub inherit_from_parent: bool,
    pub enforce: bool,
    pub payload: PolicyPayload,
}

impl Policy {
    #[must_use]
    pub fn policy_type(&self) -> PolicyType {
        self.payload.policy_type()
    }
}

/// Wire shape shared by [`Policy`] and [`PolicyUpsert`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayloadSlots {
    #[serde(rename = "type")]
    kind: Option<PolicyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deployment_approval_policy: Option<DeploymentApprovalPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup_plan_policy: Option<BackupPlanPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sensitive_data_policy: Option<SensitiveDataPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_control_policy: Option<AccessControlPolicy>,
}

impl From<PolicyPayload> for PayloadSlots {
    fn from(payload: PolicyPayload) -> Self {
        let mut slots = Self {
            kind: Some(payload.policy_type()),
            ..Self::default()
        };
        match payload {
            PolicyPayload::DeploymentApproval(p) => slots.deployment_approval_policy = Some(p),
            PolicyPayload::BackupPlan(p) => slots.backup_plan_policy = Some(p),
            PolicyPayload::SensitiveData(p) => slots.sensitive_data_policy = Some(p),
            PolicyPayload::AccessControl(p) => slots.access_control_policy = Some(p),
        }
        slots
    }
}

impl TryFrom<PayloadSlots> for PolicyPayload {
    type Error = BytebaseError;

    fn try_from(slots: PayloadSlots) -> Result<Self, Self::Error> {
        let kind = slots
            .kind
            .ok_or_else(|| BytebaseError::invalid_argument("policy type is required"))?;
        let populated = usize::from(slots.deployment_approval_policy.is_some())
            + usize::from(slots.backup_plan_policy.is_some())
            + usize::from(slots.sensitive_data_policy.is_some())
            + usize::from(slots.access_control_policy.is_some());
        if populated != 1 {
            return Err(BytebaseError::invalid_argument(format!(
                "policy of type {} must carry exactly one payload, found {populated}",
                kind.as_str()
            )));
        }
        let payload = match (kind, slots) {
            (
                PolicyType::DeploymentApproval,
                PayloadSlots {
                    deployment_approval_policy: Some(p),
                    ..
                },
            ) => Self::DeploymentApproval(p),
            (
                PolicyType::BackupPlan,
                PayloadSlots {
                    backup_plan_policy: Some(p),
                    ..
                },
            ) => Self::BackupPlan(p),
            (
                PolicyType::SensitiveData,
                PayloadSlots {
                    sensitive_data_policy: Some(p),
                    ..
                },
            ) => Self::SensitiveData(p),
            (
                PolicyType::AccessControl,
                PayloadSlots {
                    access_control_policy: Some(p),
                    ..
                },
            ) => Self::AccessControl(p),
            (kind, _) => {
                return Err(BytebaseError::invalid_argument(format!(
                    "policy type {} does not match its payload",
                    kind.as_str()
                )));
            }
        };
        payload.validate()?;
        Ok(payload)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyWire {
    name: ResourceName,
    #[serde(default)]
    state: State,
    #[serde(default)]
    inherit_from_parent: bool,
    #[serde(default)]
    enforce: bool,
    #[serde(flatten)]
    slots: PayloadSlots,
}

impl From<Policy> for PolicyWire {
    fn from(p: Policy) -> Self {
        Self {
            name: p.name,
            state: p.state,
            inherit_from_parent: p.inherit_from_parent,
            enforce: p.enforce,
            slots: p.payload.into(),
        }
    }
}

impl TryFrom<PolicyWire> for Policy {
    type Error = BytebaseError;

    fn try_from(w: PolicyWire) -> Result<Self, Self::Error> {
        Ok(Self {
            name: w.name,
            state: w.state,
            inherit_from_parent: w.inherit_from_parent,
            enforce: w.enforce,
            payload: w.slots.try_into()?,
        })
    }
}

/// Create-or-replace input for a policy. The payload always replaces the
/// stored one; the metadata flags follow the update mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyUpsertWire", into = "PolicyUpsertWire")]
pub struct PolicyUpsert {
    pub payload: PolicyPayload,
    pub inherit_from_parent: Option<bool>,
    pub enforce: Option<bool>,
}

impl PolicyUpsert {
    #[must_use]
    pub fn new(payload: PolicyPayload) -> Self {
        Self {
            payload,
            inherit_from_parent: None,
            enforce: None,
        }
    }

    /// The record created when no policy exists yet at `name`.
    #[must_use]
    pub fn into_policy(self, name: ResourceName) -> Policy {
        Policy {
            name,
            state: State::Active,
            inherit_from_parent: self.inherit_from_parent.unwrap_or(false),
            enforce: self.enforce.unwrap_or(false),
            payload: self.payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyUpsertWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inherit_from_parent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enforce: Option<bool>,
    #[serde(flatten)]
    slots: PayloadSlots,
}

impl From<PolicyUpsert> for PolicyUpsertWire {
    fn from(u: PolicyUpsert) -> Self {
        Self {
            inherit_from_parent: u.inherit_from_parent,
            enforce: u.enforce,
            slots: u.payload.into(),
        }
    }
}

impl TryFrom<PolicyUpsertWire> for PolicyUpsert {
    type Error = BytebaseError;

    fn try_from(w: PolicyUpsertWire) -> Result<Self, Self::Error> {
        Ok(Self {
            payload: w.slots.try_into()?,
            inherit_from_parent: w.inherit_from_parent,
            enforce: w.enforce,
        })
    }
}

impl Upsert for PolicyUpsert {
    const PAYLOAD: &'static str = "payload";
}

impl Patch for PolicyUpsert {
    type Target = Policy;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("payload"),
        FieldSpec::clearable("inherit_from_parent"),
        FieldSpec::clearable("enforce"),
    ];

    const IMMUTABLE: &'static [&'static str] = &["type"];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "payload" => true,
            "inherit_from_parent" => self.inherit_from_parent.is_some(),
            "enforce" => self.enforce.is_some(),
            _ => false,
        }
    }

    fn check_values(&self, _mask: &FieldMask) -> Result<(), BytebaseError> {
        self.payload.validate()
    }

    fn apply(&self, mask: &FieldMask, target: &mut Policy) {
        target.payload = self.payload.clone();
        assign(
            mask,
            "inherit_from_parent",
            self.inherit_from_parent.as_ref(),
            &mut target.inherit_from_parent,
        );
        assign(mask, "enforce", self.enforce.as_ref(), &mut target.enforce);
    }
}
