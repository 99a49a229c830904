//! Users, groups, workspace roles and IAM policies.

use bb_utils::SecretString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BytebaseError;
use crate::mask::{FieldMask, FieldSpec, Patch, assign};
use crate::models::{Condition, State};
use crate::names::{Collection, ResourceName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    #[default]
    User,
    SystemBot,
    ServiceAccount,
}

/// A workspace principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub email: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub mfa_enabled: bool,
    /// Only returned once, when a service account is created.
    #[serde(default, skip_serializing_if = "SecretString::is_empty")]
    pub service_key: SecretString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
}

impl User {
    /// The member string used in IAM bindings, `user:{email}`.
    #[must_use]
    pub fn member(&self) -> String {
        format!("{USER_MEMBER_PREFIX}{}", self.email)
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewUser {
    pub email: String,
    pub title: String,
    pub user_type: UserType,
    pub phone: String,
    #[serde(skip_serializing_if = "SecretString::is_empty")]
    pub password: SecretString,
}

impl NewUser {
    /// # Errors
    /// Returns `InvalidArgument` for a missing or malformed email.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        if !looks_like_email(&self.email) {
            return Err(BytebaseError::invalid_argument(format!(
                "invalid email '{}'",
                self.email
            )));
        }
        Ok(())
    }
}

/// Partial update data for a user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<SecretString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_enabled: Option<bool>,
}

impl Patch for UserPatch {
    type Target = User;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("email"),
        FieldSpec::clearable("title"),
        FieldSpec::clearable("phone"),
        FieldSpec::required("password"),
        FieldSpec::clearable("mfa_enabled"),
    ];

    const IMMUTABLE: &'static [&'static str] = &["user_type", "service_key"];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "email" => self.email.is_some(),
            "title" => self.title.is_some(),
            "phone" => self.phone.is_some(),
            "password" => self.password.is_some(),
            "mfa_enabled" => self.mfa_enabled.is_some(),
            _ => false,
        }
    }

    fn check_values(&self, mask: &FieldMask) -> Result<(), BytebaseError> {
        match &self.email {
            Some(email) if mask.contains("email") && !looks_like_email(email) => Err(
                BytebaseError::invalid_argument(format!("invalid email '{email}'")),
            ),
            _ => Ok(()),
        }
    }

    /// The password is write-only and never lands on the entity.
    fn apply(&self, mask: &FieldMask, target: &mut User) {
        assign(mask, "email", self.email.as_ref(), &mut target.email);
        assign(mask, "title", self.title.as_ref(), &mut target.title);
        assign(mask, "phone", self.phone.as_ref(), &mut target.phone);
        assign(mask, "mfa_enabled", self.mfa_enabled.as_ref(), &mut target.mfa_enabled);
    }
}

fn looks_like_email(s: &str) -> bool {
    ResourceName::group(s).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupMemberRole {
    Owner,
    #[default]
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    /// `users/{id}`.
    pub member: ResourceName,
    #[serde(default)]
    pub role: GroupMemberRole,
}

/// A user group, addressed by its email, `groups/{email}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewGroup {
    pub title: String,
    pub description: String,
    pub members: Vec<GroupMember>,
}

impl NewGroup {
    /// # Errors
    /// Returns `InvalidArgument` if a member is not a user name.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        validate_members(&self.members)
    }
}

fn validate_members(members: &[GroupMember]) -> Result<(), BytebaseError> {
    members
        .iter()
        .try_for_each(|m| m.member.expect(Collection::Users).map(|_| ()))
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<GroupMember>>,
}

impl Patch for GroupPatch {
    type Target = Group;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("title"),
        FieldSpec::clearable("description"),
        FieldSpec::clearable("members"),
    ];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "title" => self.title.is_some(),
            "description" => self.description.is_some(),
            "members" => self.members.is_some(),
            _ => false,
        }
    }

    fn check_values(&self, mask: &FieldMask) -> Result<(), BytebaseError> {
        match &self.members {
            Some(members) if mask.contains("members") => validate_members(members),
            _ => Ok(()),
        }
    }

    fn apply(&self, mask: &FieldMask, target: &mut Group) {
        assign(mask, "title", self.title.as_ref(), &mut target.title);
        assign(mask, "description", self.description.as_ref(), &mut target.description);
        assign(mask, "members", self.members.as_ref(), &mut target.members);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleType {
    BuiltIn,
    #[default]
    Custom,
}

/// A workspace IAM role, `roles/{id}`.
///
/// Database-engine roles (PostgreSQL `CREATE ROLE`) are a different thing
/// and would live under `instances/{id}/roles`; this SDK does not model them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: ResourceName,
    #[serde(default)]
    pub state: State,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: RoleType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewRole {
    pub title: String,
    pub description: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl Patch for RolePatch {
    type Target = Role;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("title"),
        FieldSpec::clearable("description"),
        FieldSpec::clearable("permissions"),
    ];

    const IMMUTABLE: &'static [&'static str] = &["type"];

    fn is_set(&self, path: &str) -> bool {
        match path {
            "title" => self.title.is_some(),
            "description" => self.description.is_some(),
            "permissions" => self.permissions.is_some(),
            _ => false,
        }
    }

    fn apply(&self, mask: &FieldMask, target: &mut Role) {
        assign(mask, "title", self.title.as_ref(), &mut target.title);
        assign(mask, "description", self.description.as_ref(), &mut target.description);
        assign(mask, "permissions", self.permissions.as_ref(), &mut target.permissions);
    }
}

pub const USER_MEMBER_PREFIX: &str = "user:";
pub const GROUP_MEMBER_PREFIX: &str = "group:";
pub const ALL_USERS_MEMBER: &str = "allUsers";

/// Grants `role` to `members`, optionally under a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// `roles/{id}`.
    pub role: ResourceName,
    /// `user:{email}`, `group:{email}` or `allUsers`.
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// The full binding list of a project or the workspace. Setting it replaces
/// every binding; there is no delta form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IamPolicy {
    pub bindings: Vec<Binding>,
}

impl IamPolicy {
    /// # Errors
    /// Returns `InvalidArgument` for a role outside `roles/` or a malformed
    /// member, and `InvalidExpression` for an unparsable condition.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        for binding in &self.bindings {
            binding.role.expect(Collection::Roles)?;
            for member in &binding.members {
                let valid = member == ALL_USERS_MEMBER
                    || member
                        .strip_prefix(USER_MEMBER_PREFIX)
                        .or_else(|| member.strip_prefix(GROUP_MEMBER_PREFIX))
                        .is_some_and(looks_like_email);
                if !valid {
                    return Err(BytebaseError::invalid_argument(format!(
                        "invalid IAM member '{member}'"
                    )));
                }
            }
            if let Some(condition) = &binding.condition {
                condition.check()?;
            }
        }
        Ok(())
    }

    /// Whether `user` appears in any binding, directly or via `allUsers`.
    #[must_use]
    pub fn has_user(&self, user: &User) -> bool {
        let member = user.member();
        self.bindings
            .iter()
            .flat_map(|b| &b.members)
            .any(|m| *m == member || m == ALL_USERS_MEMBER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(role: &str, members: &[&str]) -> Binding {
        Binding {
            role: ResourceName::role(role).unwrap(),
            members: members.iter().map(|m| (*m).to_owned()).collect(),
            condition: None,
        }
    }

    #[test]
    fn iam_members_are_checked() {
        let ok = IamPolicy {
            bindings: vec![binding(
                "project-owner",
                &["user:alice@example.com", "group:dba@example.com", "allUsers"],
            )],
        };
        assert!(ok.validate().is_ok());
        let bad = IamPolicy {
            bindings: vec![binding("project-owner", &["alice@example.com"])],
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn iam_condition_must_parse() {
        let mut b = binding("sql-editor", &["user:bob@example.com"]);
        b.condition = Some(Condition::new("request.time <"));
        let policy = IamPolicy { bindings: vec![b] };
        assert!(matches!(
            policy.validate(),
            Err(BytebaseError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn password_is_write_only() {
        let mut user = User {
            name: ResourceName::user("bob").unwrap(),
            state: State::Active,
            email: "bob@example.com".into(),
            title: "Bob".into(),
            user_type: UserType::User,
            phone: String::new(),
            mfa_enabled: false,
            service_key: SecretString::default(),
            create_time: None,
        };
        let patch = UserPatch {
            password: Some("hunter2".into()),
            ..UserPatch::default()
        };
        let mask = FieldMask::from_paths(["password"]).unwrap();
        mask.validate(&patch).unwrap();
        let before = user.clone();
        patch.apply(&mask, &mut user);
        assert_eq!(user, before);
        assert!(!format!("{patch:?}").contains("hunter2"));
    }

    #[test]
    fn role_type_is_immutable() {
        let mask = FieldMask::from_paths(["type"]).unwrap();
        assert!(mask.validate(&RolePatch::default()).is_err());
    }
}
