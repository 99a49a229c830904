//! Public models for the Bytebase management API.
//!
//! Transport-agnostic records that define the contract between the SDK and
//! its consumers. Each collection has an entity, a `New*` create shape and a
//! `*Patch` (or `*Upsert`) update shape whose fields are all optional.

mod auth;
mod common;
mod database;
mod database_group;
mod environment;
mod iam;
mod instance;
mod policy;
mod project;
mod review_config;
mod risk;
mod setting;

pub use auth::{LoginRequest, LoginResponse};
pub use common::{Condition, Engine, State};
pub use database::{
    BatchUpdateDatabasesRequest, BatchUpdateDatabasesResponse, BatchUpdateEntryResult,
    ColumnCatalog, Database, DatabaseCatalog, DatabasePatch, DatabaseUpdateOutcome, SchemaCatalog,
    SyncState, TableCatalog, UpdateDatabaseRequest,
};
pub use database_group::{
    DatabaseGroup, DatabaseGroupPatch, DatabaseGroupView, DatabaseReference, NewDatabaseGroup,
};
pub use environment::{Environment, EnvironmentPatch, EnvironmentTier, NewEnvironment};
pub use iam::{
    ALL_USERS_MEMBER, Binding, GROUP_MEMBER_PREFIX, Group, GroupMember, GroupMemberRole,
    GroupPatch, IamPolicy, NewGroup, NewRole, NewUser, Role, RolePatch, RoleType,
    USER_MEMBER_PREFIX, User, UserPatch, UserType,
};
pub use instance::{
    DataSource, DataSourceType, Instance, InstanceOptions, InstanceOptionsPatch, InstancePatch,
    NewInstance, validate_data_sources,
};
pub use policy::{
    AccessControlPolicy, AccessControlRule, ApprovalStrategy, BackupPlanPolicy,
    BackupPlanSchedule, DeploymentApprovalPolicy, DeploymentApprovalStrategy, MaskType, Policy,
    PolicyPayload, PolicyType, PolicyUpsert, SensitiveData, SensitiveDataPolicy,
};
pub use project::{NewProject, Project, ProjectPatch};
pub use review_config::{ReviewConfig, ReviewConfigUpsert, RuleLevel, SqlReviewRule};
pub use risk::{NewRisk, Risk, RiskLevel, RiskPatch, RiskSource};
pub use setting::{
    ApprovalRule, ApprovalStep, ApprovalStepType, ClassificationLevel, DataClassification,
    DataClassificationConfig, DataClassificationSetting, ExternalApprovalNode,
    ExternalApprovalSetting, Setting, SettingName, SettingUpsert, SettingValue,
    WorkspaceApprovalSetting, WorkspaceProfileSetting,
};
