use serde::{Deserialize, Serialize};

use crate::mask::{FieldMask, FieldSpec, Patch, assign};
use crate::models::State;
use crate::names::ResourceName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvironmentTier {
    #[default]
    Unprotected,
    Protected,
}

/// A deployment environment. Lists are ordered by `(order, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub title: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub tier: EnvironmentTier,
}

impl Environment {
    /// Sort key giving a total order that survives patches to other fields.
    #[must_use]
    pub fn sort_key(&self) -> (i32, &ResourceName) {
        (self.order, &self.name)
    }
}

/// Data for creating a new environment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEnvironment {
    pub title: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub tier: EnvironmentTier,
}

/// Partial update data for an environment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<EnvironmentTier>,
}

impl Patch for EnvironmentPatch {
    type Target = Environment;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("title"),
        FieldSpec::clearable("order"),
        FieldSpec::clearable("tier"),
    ];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "title" => self.title.is_some(),
            "order" => self.order.is_some(),
            "tier" => self.tier.is_some(),
            _ => false,
        }
    }

    fn apply(&self, mask: &FieldMask, target: &mut Environment) {
        assign(mask, "title", self.title.as_ref(), &mut target.title);
        assign(mask, "order", self.order.as_ref(), &mut target.order);
        assign(mask, "tier", self.tier.as_ref(), &mut target.tier);
    }
}
