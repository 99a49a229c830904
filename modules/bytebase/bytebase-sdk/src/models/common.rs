use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BytebaseError;

/// Lifecycle state carried by every resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    #[default]
    Active,
    Deleted,
}

impl State {
    #[must_use]
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

/// Supported database engines. Unknown values are rejected on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Engine {
    Mysql,
    Postgres,
    Tidb,
    Snowflake,
    Clickhouse,
    Mongodb,
    Sqlite,
    Redis,
    Oracle,
    Spanner,
    Mssql,
    Redshift,
    Mariadb,
    Oceanbase,
}

impl Engine {
    pub const ALL: [Engine; 14] = [
        Self::Mysql,
        Self::Postgres,
        Self::Tidb,
        Self::Snowflake,
        Self::Clickhouse,
        Self::Mongodb,
        Self::Sqlite,
        Self::Redis,
        Self::Oracle,
        Self::Spanner,
        Self::Mssql,
        Self::Redshift,
        Self::Mariadb,
        Self::Oceanbase,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "MYSQL",
            Self::Postgres => "POSTGRES",
            Self::Tidb => "TIDB",
            Self::Snowflake => "SNOWFLAKE",
            Self::Clickhouse => "CLICKHOUSE",
            Self::Mongodb => "MONGODB",
            Self::Sqlite => "SQLITE",
            Self::Redis => "REDIS",
            Self::Oracle => "ORACLE",
            Self::Spanner => "SPANNER",
            Self::Mssql => "MSSQL",
            Self::Redshift => "REDSHIFT",
            Self::Mariadb => "MARIADB",
            Self::Oceanbase => "OCEANBASE",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = BytebaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| BytebaseError::invalid_argument(format!("unknown engine '{s}'")))
    }
}

/// A textual expression with optional metadata, as attached to IAM
/// bindings, risks, approval rules and database groups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub expression: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Condition {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Self::default()
        }
    }

    /// Parse the expression, failing with `InvalidExpression`.
    ///
    /// # Errors
    /// Returns the parser diagnostic for a syntactically invalid expression.
    pub fn check(&self) -> Result<(), BytebaseError> {
        crate::cel::parse(&self.expression).map(|_| ())
    }
}
