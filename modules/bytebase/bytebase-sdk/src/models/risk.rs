use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BytebaseError;
use crate::mask::{FieldMask, FieldSpec, Patch, assign};
use crate::models::{Condition, State};
use crate::names::ResourceName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskSource {
    #[default]
    Ddl,
    Dml,
    CreateDatabase,
    RequestQuery,
    RequestExport,
    DataExport,
}

/// Risk level. Ordered by its numeric value, which is also its wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum RiskLevel {
    #[default]
    Default = 0,
    Low = 100,
    Moderate = 200,
    High = 300,
}

impl RiskLevel {
    #[must_use]
    pub fn int(self) -> i32 {
        self as i32
    }
}

impl From<RiskLevel> for i32 {
    fn from(level: RiskLevel) -> Self {
        level.int()
    }
}

impl TryFrom<i32> for RiskLevel {
    type Error = BytebaseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Default),
            100 => Ok(Self::Low),
            200 => Ok(Self::Moderate),
            300 => Ok(Self::High),
            other => Err(BytebaseError::invalid_argument(format!(
                "unknown risk level {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub source: RiskSource,
    pub title: String,
    #[serde(default)]
    pub level: RiskLevel,
    #[serde(default)]
    pub active: bool,
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewRisk {
    pub source: RiskSource,
    pub title: String,
    pub level: RiskLevel,
    pub active: bool,
    pub condition: Condition,
}

impl NewRisk {
    /// # Errors
    /// Returns `InvalidExpression` if the condition does not parse.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        self.condition.check()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<RiskSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Patch for RiskPatch {
    type Target = Risk;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("source"),
        FieldSpec::required("title"),
        FieldSpec::clearable("level"),
        FieldSpec::clearable("active"),
        FieldSpec::required("condition"),
    ];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "source" => self.source.is_some(),
            "title" => self.title.is_some(),
            "level" => self.level.is_some(),
            "active" => self.active.is_some(),
            "condition" => self.condition.is_some(),
            _ => false,
        }
    }

    fn check_values(&self, mask: &FieldMask) -> Result<(), BytebaseError> {
        match &self.condition {
            Some(condition) if mask.contains("condition") => condition.check(),
            _ => Ok(()),
        }
    }

    fn apply(&self, mask: &FieldMask, target: &mut Risk) {
        assign(mask, "source", self.source.as_ref(), &mut target.source);
        assign(mask, "title", self.title.as_ref(), &mut target.title);
        assign(mask, "level", self.level.as_ref(), &mut target.level);
        assign(mask, "active", self.active.as_ref(), &mut target.active);
        assign(mask, "condition", self.condition.as_ref(), &mut target.condition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_value() {
        let levels = [RiskLevel::Default, RiskLevel::Low, RiskLevel::Moderate, RiskLevel::High];
        assert_eq!(levels.map(RiskLevel::int), [0, 100, 200, 300]);
        assert!(levels.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn level_is_an_integer_on_the_wire() {
        assert_eq!(serde_json::to_string(&RiskLevel::Moderate).unwrap(), "200");
        assert_eq!(serde_json::from_str::<RiskLevel>("300").unwrap(), RiskLevel::High);
        assert!(serde_json::from_str::<RiskLevel>("150").is_err());
        assert!(serde_json::from_str::<RiskLevel>("\"HIGH\"").is_err());
    }
}
