use serde::{Deserialize, Serialize};

use crate::error::BytebaseError;
use crate::mask::{FieldMask, FieldSpec, Patch, assign};
use crate::models::{Condition, State};
use crate::names::ResourceName;

/// How much of a database group to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatabaseGroupView {
    /// Metadata only; matched lists stay empty.
    #[default]
    Basic,
    /// Also evaluate the expression against the project's databases.
    Full,
}

impl DatabaseGroupView {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "BASIC",
            Self::Full => "FULL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseReference {
    pub name: ResourceName,
}

/// A named selection of a project's databases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseGroup {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub title: String,
    pub database_expr: Condition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_databases: Vec<DatabaseReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmatched_databases: Vec<DatabaseReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDatabaseGroup {
    pub title: String,
    pub database_expr: Condition,
}

impl NewDatabaseGroup {
    /// # Errors
    /// Returns `InvalidExpression` if `database_expr` does not parse.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        self.database_expr.check()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseGroupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_expr: Option<Condition>,
}

impl Patch for DatabaseGroupPatch {
    type Target = DatabaseGroup;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("title"),
        FieldSpec::required("database_expr"),
    ];

    const IMMUTABLE: &'static [&'static str] = &["matched_databases", "unmatched_databases"];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "title" => self.title.is_some(),
            "database_expr" => self.database_expr.is_some(),
            _ => false,
        }
    }

    fn check_values(&self, mask: &FieldMask) -> Result<(), BytebaseError> {
        match &self.database_expr {
            Some(expr) if mask.contains("database_expr") => expr.check(),
            _ => Ok(()),
        }
    }

    fn apply(&self, mask: &FieldMask, target: &mut DatabaseGroup) {
        assign(mask, "title", self.title.as_ref(), &mut target.title);
        assign(mask, "database_expr", self.database_expr.as_ref(), &mut target.database_expr);
    }
}
