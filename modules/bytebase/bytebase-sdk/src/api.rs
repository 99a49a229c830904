//! `BytebaseApi` trait definition.
//!
//! Every operation takes a [`CallContext`] first and fails with a
//! [`BytebaseError`]. Common error kinds:
//!
//! * `InvalidArgument`: malformed name, bad update mask, invalid payload or
//!   expression. Detected locally whenever possible, without a round-trip.
//! * `NotFound`: no resource under that name.
//! * `AlreadyExists`: create with an id that is taken.
//! * `FailedPrecondition`: delete of a deleted resource, undelete of an
//!   active one, a policy type the parent does not accept.
//! * `Cancelled` / `DeadlineExceeded`: the context fired.
//! * `Unavailable`: the transport could not reach the server.
//! * `Internal`: the server answered with something undecodable.
//!
//! Get, list, delete and undelete are idempotent. Create is not. Update is
//! idempotent for the same patch and mask.

use async_trait::async_trait;

use crate::cel::Expr;
use crate::context::CallContext;
use crate::error::BytebaseError;
use crate::filter::{DatabaseFilter, InstanceFilter, Page, PageRequest, ProjectFilter, UserFilter};
use crate::mask::FieldMask;
use crate::models::{
    Database, DatabaseCatalog, DatabaseGroup, DatabaseGroupPatch, DatabaseGroupView,
    DatabasePatch, DatabaseUpdateOutcome, Environment, EnvironmentPatch, Group, GroupPatch,
    IamPolicy, Instance, InstancePatch, NewDatabaseGroup, NewEnvironment, NewGroup, NewInstance,
    NewProject, NewRisk, NewRole, NewUser, Policy, PolicyUpsert, Project, ProjectPatch,
    ReviewConfig, ReviewConfigUpsert, Risk, RiskPatch, Role, RolePatch, Setting, SettingName,
    SettingUpsert, UpdateDatabaseRequest, User, UserPatch,
};
use crate::names::ResourceName;

/// Public API of the Bytebase management surface.
///
/// ```ignore
/// let client: Arc<dyn BytebaseApi> = Arc::new(Client::connect(transport, &identity).await?);
/// let ctx = CallContext::background().with_timeout(Duration::from_secs(10));
/// let project = client.create_project(&ctx, "proj-a", NewProject::new("Alpha")).await?;
/// ```
#[async_trait]
#[allow(clippy::missing_errors_doc)] // error kinds are listed in the module docs
pub trait BytebaseApi: Send + Sync {
    /// The principal captured when the client was built. No round-trip.
    fn caller(&self) -> &User;

    // -- environments -----------------------------------------------------

    async fn get_environment(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Environment, BytebaseError>;

    /// Ordered by `(order, name)`.
    async fn list_environments(
        &self,
        ctx: &CallContext,
        show_deleted: bool,
    ) -> Result<Vec<Environment>, BytebaseError>;

    async fn create_environment(
        &self,
        ctx: &CallContext,
        id: &str,
        environment: NewEnvironment,
    ) -> Result<Environment, BytebaseError>;

    async fn update_environment(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: EnvironmentPatch,
        mask: FieldMask,
    ) -> Result<Environment, BytebaseError>;

    async fn delete_environment(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError>;

    async fn undelete_environment(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Environment, BytebaseError>;

    // -- instances --------------------------------------------------------

    async fn list_instances(
        &self,
        ctx: &CallContext,
        filter: InstanceFilter,
        page: PageRequest,
    ) -> Result<Page<Instance>, BytebaseError>;

    async fn get_instance(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Instance, BytebaseError>;

    async fn create_instance(
        &self,
        ctx: &CallContext,
        id: &str,
        instance: NewInstance,
    ) -> Result<Instance, BytebaseError>;

    async fn update_instance(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: InstancePatch,
        mask: FieldMask,
    ) -> Result<Instance, BytebaseError>;

    async fn delete_instance(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError>;

    async fn undelete_instance(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Instance, BytebaseError>;

    /// Returns once the server accepted the request. Completion shows up
    /// later in the databases' sync state.
    async fn sync_instance_schema(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError>;

    // -- databases --------------------------------------------------------

    async fn get_database(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Database, BytebaseError>;

    /// `parent` is an instance, or `instances/-` for every instance.
    async fn list_databases(
        &self,
        ctx: &CallContext,
        parent: &ResourceName,
        filter: DatabaseFilter,
        page: PageRequest,
    ) -> Result<Page<Database>, BytebaseError>;

    async fn update_database(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: DatabasePatch,
        mask: FieldMask,
    ) -> Result<Database, BytebaseError>;

    /// Not transactional. One outcome per entry, in request order; entries
    /// that fail local validation are reported without being sent.
    async fn batch_update_databases(
        &self,
        ctx: &CallContext,
        parent: &ResourceName,
        requests: Vec<UpdateDatabaseRequest>,
    ) -> Result<Vec<DatabaseUpdateOutcome>, BytebaseError>;

    async fn get_database_catalog(
        &self,
        ctx: &CallContext,
        database: &ResourceName,
    ) -> Result<DatabaseCatalog, BytebaseError>;

    async fn update_database_catalog(
        &self,
        ctx: &CallContext,
        catalog: DatabaseCatalog,
    ) -> Result<DatabaseCatalog, BytebaseError>;

    // -- projects ---------------------------------------------------------

    async fn get_project(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Project, BytebaseError>;

    async fn list_projects(
        &self,
        ctx: &CallContext,
        filter: ProjectFilter,
        page: PageRequest,
    ) -> Result<Page<Project>, BytebaseError>;

    async fn create_project(
        &self,
        ctx: &CallContext,
        id: &str,
        project: NewProject,
    ) -> Result<Project, BytebaseError>;

    async fn update_project(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: ProjectPatch,
        mask: FieldMask,
    ) -> Result<Project, BytebaseError>;

    async fn delete_project(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError>;

    async fn undelete_project(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Project, BytebaseError>;

    async fn get_project_iam_policy(
        &self,
        ctx: &CallContext,
        project: &ResourceName,
    ) -> Result<IamPolicy, BytebaseError>;

    /// Replaces every binding.
    async fn set_project_iam_policy(
        &self,
        ctx: &CallContext,
        project: &ResourceName,
        policy: IamPolicy,
    ) -> Result<IamPolicy, BytebaseError>;

    // -- policies ---------------------------------------------------------

    /// `parent` of `None` lists workspace-level policies.
    async fn list_policies(
        &self,
        ctx: &CallContext,
        parent: Option<&ResourceName>,
    ) -> Result<Vec<Policy>, BytebaseError>;

    async fn get_policy(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Policy, BytebaseError>;

    /// Creates the policy if absent; otherwise replaces the payload and
    /// applies `mask` to the metadata flags.
    async fn upsert_policy(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        upsert: PolicyUpsert,
        mask: FieldMask,
    ) -> Result<Policy, BytebaseError>;

    async fn delete_policy(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError>;

    // -- settings ---------------------------------------------------------

    async fn list_settings(&self, ctx: &CallContext) -> Result<Vec<Setting>, BytebaseError>;

    async fn get_setting(
        &self,
        ctx: &CallContext,
        name: SettingName,
    ) -> Result<Setting, BytebaseError>;

    /// The setting is selected by the variant of `upsert.value`.
    async fn upsert_setting(
        &self,
        ctx: &CallContext,
        upsert: SettingUpsert,
        mask: FieldMask,
    ) -> Result<Setting, BytebaseError>;

    // -- expressions ------------------------------------------------------

    /// A syntax error fails with `InvalidExpression` and the parser
    /// diagnostic.
    async fn parse_expression(
        &self,
        ctx: &CallContext,
        expression: &str,
    ) -> Result<Expr, BytebaseError>;

    // -- users ------------------------------------------------------------

    async fn list_users(
        &self,
        ctx: &CallContext,
        filter: UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, BytebaseError>;

    async fn create_user(
        &self,
        ctx: &CallContext,
        id: &str,
        user: NewUser,
    ) -> Result<User, BytebaseError>;

    async fn get_user(&self, ctx: &CallContext, name: &ResourceName)
    -> Result<User, BytebaseError>;

    async fn update_user(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: UserPatch,
        mask: FieldMask,
    ) -> Result<User, BytebaseError>;

    async fn delete_user(&self, ctx: &CallContext, name: &ResourceName)
    -> Result<(), BytebaseError>;

    async fn undelete_user(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<User, BytebaseError>;

    // -- groups -----------------------------------------------------------

    async fn list_groups(&self, ctx: &CallContext) -> Result<Vec<Group>, BytebaseError>;

    async fn create_group(
        &self,
        ctx: &CallContext,
        email: &str,
        group: NewGroup,
    ) -> Result<Group, BytebaseError>;

    async fn get_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Group, BytebaseError>;

    async fn update_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: GroupPatch,
        mask: FieldMask,
    ) -> Result<Group, BytebaseError>;

    async fn delete_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError>;

    // -- workspace IAM ----------------------------------------------------

    async fn get_workspace_iam_policy(
        &self,
        ctx: &CallContext,
    ) -> Result<IamPolicy, BytebaseError>;

    /// Replaces every binding.
    async fn set_workspace_iam_policy(
        &self,
        ctx: &CallContext,
        policy: IamPolicy,
    ) -> Result<IamPolicy, BytebaseError>;

    // -- roles ------------------------------------------------------------

    async fn list_roles(&self, ctx: &CallContext) -> Result<Vec<Role>, BytebaseError>;

    async fn create_role(
        &self,
        ctx: &CallContext,
        id: &str,
        role: NewRole,
    ) -> Result<Role, BytebaseError>;

    async fn get_role(&self, ctx: &CallContext, name: &ResourceName)
    -> Result<Role, BytebaseError>;

    async fn update_role(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: RolePatch,
        mask: FieldMask,
    ) -> Result<Role, BytebaseError>;

    async fn delete_role(&self, ctx: &CallContext, name: &ResourceName)
    -> Result<(), BytebaseError>;

    // -- review configs ---------------------------------------------------

    async fn list_review_configs(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<ReviewConfig>, BytebaseError>;

    async fn get_review_config(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<ReviewConfig, BytebaseError>;

    async fn upsert_review_config(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        upsert: ReviewConfigUpsert,
        mask: FieldMask,
    ) -> Result<ReviewConfig, BytebaseError>;

    async fn delete_review_config(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError>;

    // -- risks ------------------------------------------------------------

    async fn list_risks(&self, ctx: &CallContext) -> Result<Vec<Risk>, BytebaseError>;

    async fn get_risk(&self, ctx: &CallContext, name: &ResourceName)
    -> Result<Risk, BytebaseError>;

    async fn create_risk(
        &self,
        ctx: &CallContext,
        id: &str,
        risk: NewRisk,
    ) -> Result<Risk, BytebaseError>;

    async fn update_risk(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: RiskPatch,
        mask: FieldMask,
    ) -> Result<Risk, BytebaseError>;

    async fn delete_risk(&self, ctx: &CallContext, name: &ResourceName)
    -> Result<(), BytebaseError>;

    // -- database groups --------------------------------------------------

    async fn list_database_groups(
        &self,
        ctx: &CallContext,
        project: &ResourceName,
    ) -> Result<Vec<DatabaseGroup>, BytebaseError>;

    async fn create_database_group(
        &self,
        ctx: &CallContext,
        project: &ResourceName,
        id: &str,
        group: NewDatabaseGroup,
    ) -> Result<DatabaseGroup, BytebaseError>;

    /// `Full` also returns the matched and unmatched databases.
    async fn get_database_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        view: DatabaseGroupView,
    ) -> Result<DatabaseGroup, BytebaseError>;

    async fn update_database_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: DatabaseGroupPatch,
        mask: FieldMask,
    ) -> Result<DatabaseGroup, BytebaseError>;

    async fn delete_database_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError>;
}
