//! Domain service for the static Bytebase plugin.
//!
//! Holds one workspace in memory. Every operation takes the store lock for
//! its whole duration and never across an await, so each call is atomic.

use std::collections::BTreeMap;

use bb_utils::SecretString;
use bytebase_sdk::cel;
use bytebase_sdk::models::{
    BatchUpdateDatabasesResponse, BatchUpdateEntryResult, Binding, Database, DatabaseCatalog,
    DatabaseGroup, DatabaseGroupPatch, DatabaseGroupView, DatabasePatch, DatabaseReference,
    Environment, Group, GroupPatch, IamPolicy, Instance, InstanceOptions, InstancePatch,
    NewDatabaseGroup, NewEnvironment, NewGroup, NewInstance, NewProject, NewRisk, NewRole,
    NewUser, Policy, PolicyUpsert, Project, ReviewConfig, ReviewConfigUpsert, Risk, Role,
    RolePatch, RoleType, Setting, SettingName, SettingUpsert, State, SyncState,
    UpdateDatabaseRequest, User, UserPatch,
};
use bytebase_sdk::names::WILDCARD_ID;
use bytebase_sdk::{
    BytebaseError, Collection, DatabaseFilter, ErrorKind, FieldMask, InstanceFilter, Page,
    PageRequest, Patch, ProjectFilter, ResourceName, UserFilter,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::page_token::paginate;
use super::store::{Record, Store};
use crate::config::{DatabaseConfig, StaticPluginConfig};

/// Roles present in every workspace; they cannot be changed or removed.
const BUILT_IN_ROLES: [(&str, &str); 5] = [
    ("workspace-admin", "Workspace admin"),
    ("workspace-dba", "Workspace DBA"),
    ("workspace-member", "Workspace member"),
    ("project-owner", "Project owner"),
    ("project-developer", "Project developer"),
];

const WORKSPACE_ADMIN_ROLE: &str = "workspace-admin";
const PROJECT_OWNER_ROLE: &str = "project-owner";

/// In-memory Bytebase workspace.
pub struct Service {
    /// The principal every request is served as.
    pub(super) caller: ResourceName,
    page_size_limit: u32,
    /// Databases a schema sync discovers, per seeded instance.
    discovered: BTreeMap<ResourceName, Vec<DatabaseConfig>>,
    store: RwLock<Store>,
}

impl Service {
    /// Build the workspace described by `config`.
    ///
    /// # Errors
    /// `InvalidArgument` for a malformed seed id or email, `NotFound` for an
    /// instance seeded into an unknown environment, `AlreadyExists` for
    /// duplicate seeds.
    pub fn from_config(config: &StaticPluginConfig) -> Result<Self, BytebaseError> {
        let mut store = Store::default();

        let caller = NewUser {
            email: config.caller.email.clone(),
            title: config.caller.title.clone(),
            ..NewUser::default()
        };
        caller.validate()?;
        let caller = store.insert(new_user(ResourceName::user(&config.caller.id)?, caller))?;

        for (id, title) in BUILT_IN_ROLES {
            store.insert(Role {
                name: ResourceName::role(id)?,
                state: State::Active,
                title: title.to_owned(),
                description: String::new(),
                permissions: Vec::new(),
                kind: RoleType::BuiltIn,
            })?;
        }
        store.workspace_iam = IamPolicy {
            bindings: vec![Binding {
                role: ResourceName::role(WORKSPACE_ADMIN_ROLE)?,
                members: vec![caller.member()],
                condition: None,
            }],
        };

        store.insert(Project {
            name: ResourceName::default_project(),
            state: State::Active,
            title: config.default_project_title.clone(),
            key: "DEFAULT".to_owned(),
            allow_modify_statement: false,
            auto_resolve_issue: false,
            enforce_issue_title: false,
            data_classification_config_id: String::new(),
            create_time: Some(Utc::now()),
        })?;
        store
            .project_iam
            .insert(ResourceName::default_project(), IamPolicy::default());

        for seed in &config.environments {
            store.insert(Environment {
                name: ResourceName::environment(&seed.id)?,
                state: State::Active,
                title: seed.title.clone(),
                order: seed.order,
                tier: seed.tier,
            })?;
        }

        let mut discovered = BTreeMap::new();
        for seed in &config.instances {
            let environment = seed
                .environment
                .as_deref()
                .map(ResourceName::environment)
                .transpose()?;
            if let Some(environment) = &environment {
                store.get_active::<Environment>(environment)?;
            }
            let instance = store.insert(Instance {
                name: ResourceName::instance(&seed.id)?,
                state: State::Active,
                title: seed.title.clone(),
                engine: seed.engine,
                engine_version: String::new(),
                external_link: String::new(),
                environment,
                activation: false,
                data_sources: Vec::new(),
                options: InstanceOptions::default(),
                create_time: Some(Utc::now()),
            })?;
            sync_databases(&mut store, &instance, &seed.databases)?;
            discovered.insert(instance.name, seed.databases.clone());
        }

        info!(
            caller = %caller.name,
            environments = store.environments.len(),
            instances = store.instances.len(),
            databases = store.databases.len(),
            "static bytebase workspace seeded"
        );

        Ok(Self {
            caller: caller.name,
            page_size_limit: config.page_size_limit,
            discovered,
            store: RwLock::new(store),
        })
    }

    /// The user requests are served as.
    ///
    /// # Errors
    /// `NotFound` if the seeded caller is gone, which cannot happen since
    /// users are only soft-deleted.
    pub fn caller_user(&self) -> Result<User, BytebaseError> {
        self.get::<User>(&self.caller)
    }

    // -- generic lifecycle ------------------------------------------------

    /// # Errors
    /// `InvalidArgument` when `name` is not in `T`'s collection, or
    /// `NotFound`.
    pub fn get<T: Record>(&self, name: &ResourceName) -> Result<T, BytebaseError> {
        name.expect(T::COLLECTION)?;
        self.store.read().get::<T>(name).cloned()
    }

    /// Every record of `T` passing `keep`, in name order.
    #[must_use]
    pub fn list<T: Record>(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.store
            .read()
            .scan::<T>()
            .filter(|record| keep(record))
            .cloned()
            .collect()
    }

    /// # Errors
    /// See [`Store::patch`].
    pub fn update<P>(
        &self,
        name: &ResourceName,
        patch: &P,
        mask: &FieldMask,
    ) -> Result<P::Target, BytebaseError>
    where
        P: Patch,
        P::Target: Record,
    {
        name.expect(P::Target::COLLECTION)?;
        let updated = self.store.write().patch(name, patch, mask)?;
        debug!(%name, %mask, "resource updated");
        Ok(updated)
    }

    /// # Errors
    /// See [`Store::delete`].
    pub fn delete<T: Record>(&self, name: &ResourceName) -> Result<(), BytebaseError> {
        name.expect(T::COLLECTION)?;
        self.store.write().delete::<T>(name)?;
        debug!(%name, "resource deleted");
        Ok(())
    }

    /// # Errors
    /// See [`Store::undelete`].
    pub fn undelete<T: Record>(&self, name: &ResourceName) -> Result<T, BytebaseError> {
        name.expect(T::COLLECTION)?;
        let restored = self.store.write().undelete::<T>(name)?;
        debug!(%name, "resource undeleted");
        Ok(restored)
    }

    fn create<T: Record>(&self, record: T) -> Result<T, BytebaseError> {
        let created = self.store.write().insert(record)?;
        debug!(name = %created.name(), "resource created");
        Ok(created)
    }

    // -- environments -----------------------------------------------------

    /// Ordered by `(order, name)`.
    #[must_use]
    pub fn list_environments(&self, show_deleted: bool) -> Vec<Environment> {
        let mut environments =
            self.list::<Environment>(|env| show_deleted || env.state.is_active());
        environments.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        environments
    }

    /// # Errors
    /// `InvalidArgument` or `AlreadyExists`.
    pub fn create_environment(
        &self,
        id: &str,
        new: NewEnvironment,
    ) -> Result<Environment, BytebaseError> {
        require_title(&new.title, "environment")?;
        self.create(Environment {
            name: ResourceName::environment(id)?,
            state: State::Active,
            title: new.title,
            order: new.order,
            tier: new.tier,
        })
    }

    // -- instances --------------------------------------------------------

    /// # Errors
    /// `InvalidArgument` for a bad page token.
    pub fn list_instances(
        &self,
        filter: &InstanceFilter,
        filter_key: &str,
        page: &PageRequest,
    ) -> Result<Page<Instance>, BytebaseError> {
        let store = self.store.read();
        let databases: Vec<Database> = if filter.project.is_some() {
            store.scan::<Database>().cloned().collect()
        } else {
            Vec::new()
        };
        let items = store
            .scan::<Instance>()
            .filter(|instance| filter.matches(instance, &databases))
            .cloned()
            .collect();
        paginate(items, filter_key, page, self.page_size_limit)
    }

    /// # Errors
    /// `InvalidArgument`, `NotFound` for an unknown environment, or
    /// `AlreadyExists`.
    pub fn create_instance(&self, id: &str, new: NewInstance) -> Result<Instance, BytebaseError> {
        new.validate()?;
        let name = ResourceName::instance(id)?;
        let mut store = self.store.write();
        if let Some(environment) = &new.environment {
            store.get_active::<Environment>(environment)?;
        }
        let created = store.insert(Instance {
            name,
            state: State::Active,
            title: new.title,
            engine: new.engine,
            engine_version: String::new(),
            external_link: new.external_link,
            environment: new.environment,
            activation: new.activation,
            data_sources: new.data_sources,
            options: new.options,
            create_time: Some(Utc::now()),
        })?;
        debug!(instance = %created.name, engine = %created.engine, "instance created");
        Ok(created)
    }

    /// Moving an instance to another environment also moves the effective
    /// environment of its databases.
    ///
    /// # Errors
    /// `InvalidArgument`, `NotFound` or `FailedPrecondition`.
    pub fn update_instance(
        &self,
        name: &ResourceName,
        patch: &InstancePatch,
        mask: &FieldMask,
    ) -> Result<Instance, BytebaseError> {
        name.expect(Collection::Instances)?;
        mask.validate(patch)?;
        let mut store = self.store.write();
        if mask.contains("environment")
            && let Some(environment) = &patch.environment
        {
            store.get_active::<Environment>(environment)?;
        }
        let updated = store.patch(name, patch, mask)?;
        refresh_effective_environment(&mut store, name);
        debug!(instance = %name, %mask, "instance updated");
        Ok(updated)
    }

    /// Discover the configured databases of the instance and mark every
    /// active database on it as freshly synced.
    ///
    /// # Errors
    /// `NotFound`, or `FailedPrecondition` for a deleted instance.
    pub fn sync_instance(&self, name: &ResourceName) -> Result<(), BytebaseError> {
        name.expect(Collection::Instances)?;
        let mut store = self.store.write();
        let instance = store.get_active::<Instance>(name)?.clone();
        let seeds = self.discovered.get(name).map_or(&[][..], Vec::as_slice);
        let synced = sync_databases(&mut store, &instance, seeds)?;
        debug!(instance = %name, databases = synced, "instance schema synced");
        Ok(())
    }

    // -- databases --------------------------------------------------------

    /// `parent` is an instance or `instances/-`.
    ///
    /// # Errors
    /// `InvalidArgument`, or `NotFound` for an unknown instance.
    pub fn list_databases(
        &self,
        parent: &ResourceName,
        filter: &DatabaseFilter,
        filter_key: &str,
        page: &PageRequest,
    ) -> Result<Page<Database>, BytebaseError> {
        parent.expect(Collection::Instances)?;
        let store = self.store.read();
        let every_instance = parent.id() == WILDCARD_ID;
        if !every_instance {
            store.get::<Instance>(parent)?;
        }
        let items = store
            .scan::<Database>()
            .filter(|db| every_instance || db.instance() == Some(parent))
            .filter(|db| filter.matches(db))
            .cloned()
            .collect();
        paginate(items, filter_key, page, self.page_size_limit)
    }

    /// # Errors
    /// `InvalidArgument`, `NotFound` for the database or a referenced
    /// project or environment, `FailedPrecondition` for deleted ones.
    pub fn update_database(
        &self,
        name: &ResourceName,
        patch: &DatabasePatch,
        mask: &FieldMask,
    ) -> Result<Database, BytebaseError> {
        let updated = update_database_in(&mut self.store.write(), name, patch, mask)?;
        debug!(database = %name, %mask, "database updated");
        Ok(updated)
    }

    /// Apply each entry on its own; one failing entry does not stop the
    /// others.
    ///
    /// # Errors
    /// `InvalidArgument` when `parent` is not an instance name. Per-entry
    /// failures are reported in the response.
    pub fn batch_update_databases(
        &self,
        parent: &ResourceName,
        requests: Vec<UpdateDatabaseRequest>,
    ) -> Result<BatchUpdateDatabasesResponse, BytebaseError> {
        parent.expect(Collection::Instances)?;
        let mut store = self.store.write();
        let results = requests
            .into_iter()
            .map(|entry| {
                let outcome = check_batch_parent(parent, &entry.name).and_then(|()| {
                    update_database_in(&mut store, &entry.name, &entry.patch, &entry.update_mask)
                });
                match outcome {
                    Ok(database) => BatchUpdateEntryResult::ok(database),
                    Err(e) => {
                        debug!(database = %entry.name, error = %e, "batch entry failed");
                        BatchUpdateEntryResult::failed(entry.name, e.to_status())
                    }
                }
            })
            .collect();
        Ok(BatchUpdateDatabasesResponse { results })
    }

    /// An empty catalog until one is written.
    ///
    /// # Errors
    /// `InvalidArgument` or `NotFound`.
    pub fn get_database_catalog(
        &self,
        database: &ResourceName,
    ) -> Result<DatabaseCatalog, BytebaseError> {
        database.expect(Collection::Databases)?;
        let store = self.store.read();
        store.get::<Database>(database)?;
        Ok(store
            .catalogs
            .get(database)
            .cloned()
            .unwrap_or_else(|| DatabaseCatalog {
                name: database.catalog_path(),
                schemas: Vec::new(),
            }))
    }

    /// # Errors
    /// `InvalidArgument` when the catalog names another database,
    /// `NotFound`, or `FailedPrecondition` for a deleted database.
    pub fn update_database_catalog(
        &self,
        database: &ResourceName,
        catalog: DatabaseCatalog,
    ) -> Result<DatabaseCatalog, BytebaseError> {
        if catalog.database()? != *database {
            return Err(BytebaseError::invalid_argument(format!(
                "catalog '{}' does not belong to '{database}'",
                catalog.name
            )));
        }
        let mut store = self.store.write();
        store.get_active::<Database>(database)?;
        store.catalogs.insert(database.clone(), catalog.clone());
        debug!(%database, schemas = catalog.schemas.len(), "database catalog updated");
        Ok(catalog)
    }

    // -- projects ---------------------------------------------------------

    /// # Errors
    /// `InvalidArgument` for a bad page token.
    pub fn list_projects(
        &self,
        filter: &ProjectFilter,
        filter_key: &str,
        page: &PageRequest,
    ) -> Result<Page<Project>, BytebaseError> {
        let items = self.list::<Project>(|project| filter.matches(project));
        paginate(items, filter_key, page, self.page_size_limit)
    }

    /// The caller becomes the project owner.
    ///
    /// # Errors
    /// `InvalidArgument` or `AlreadyExists`.
    pub fn create_project(&self, id: &str, new: NewProject) -> Result<Project, BytebaseError> {
        require_title(&new.title, "project")?;
        let name = ResourceName::project(id)?;
        let mut store = self.store.write();
        let owner = store.get::<User>(&self.caller)?.member();
        let created = store.insert(Project {
            name,
            state: State::Active,
            title: new.title,
            key: new.key,
            allow_modify_statement: new.allow_modify_statement,
            auto_resolve_issue: new.auto_resolve_issue,
            enforce_issue_title: new.enforce_issue_title,
            data_classification_config_id: new.data_classification_config_id,
            create_time: Some(Utc::now()),
        })?;
        store.project_iam.insert(
            created.name.clone(),
            IamPolicy {
                bindings: vec![Binding {
                    role: ResourceName::role(PROJECT_OWNER_ROLE)?,
                    members: vec![owner],
                    condition: None,
                }],
            },
        );
        debug!(project = %created.name, "project created");
        Ok(created)
    }

    /// # Errors
    /// `FailedPrecondition` for the default project, a project that still
    /// owns active databases, or one already deleted; `NotFound`.
    pub fn delete_project(&self, name: &ResourceName) -> Result<(), BytebaseError> {
        name.expect(Collection::Projects)?;
        if *name == ResourceName::default_project() {
            return Err(BytebaseError::failed_precondition(
                "the default project cannot be deleted",
            ));
        }
        let mut store = self.store.write();
        let owned = store
            .scan::<Database>()
            .filter(|db| db.state.is_active() && db.project == *name)
            .count();
        if owned > 0 {
            return Err(BytebaseError::failed_precondition(format!(
                "'{name}' still owns {owned} database(s)"
            )));
        }
        store.delete::<Project>(name)?;
        debug!(project = %name, "project deleted");
        Ok(())
    }

    /// `resource` is a project or `workspaces/-`.
    ///
    /// # Errors
    /// `InvalidArgument` for any other resource, or `NotFound`.
    pub fn get_iam_policy(&self, resource: &ResourceName) -> Result<IamPolicy, BytebaseError> {
        let store = self.store.read();
        match resource.collection() {
            Collection::Workspaces => {
                check_workspace(resource)?;
                Ok(store.workspace_iam.clone())
            }
            Collection::Projects => {
                store.get::<Project>(resource)?;
                Ok(store
                    .project_iam
                    .get(resource)
                    .cloned()
                    .unwrap_or_default())
            }
            _ => Err(no_iam_policy(resource)),
        }
    }

    /// Replace every binding. Referenced roles must exist.
    ///
    /// # Errors
    /// `InvalidArgument`, `NotFound` for an unknown role or project, or
    /// `FailedPrecondition` for a deleted project.
    pub fn set_iam_policy(
        &self,
        resource: &ResourceName,
        policy: IamPolicy,
    ) -> Result<IamPolicy, BytebaseError> {
        policy.validate()?;
        let mut store = self.store.write();
        for binding in &policy.bindings {
            store.get::<Role>(&binding.role)?;
        }
        match resource.collection() {
            Collection::Workspaces => {
                check_workspace(resource)?;
                store.workspace_iam = policy.clone();
            }
            Collection::Projects => {
                store.get_active::<Project>(resource)?;
                store.project_iam.insert(resource.clone(), policy.clone());
            }
            _ => return Err(no_iam_policy(resource)),
        }
        debug!(%resource, bindings = policy.bindings.len(), "iam policy replaced");
        Ok(policy)
    }

    // -- policies ---------------------------------------------------------

    /// Policies attached directly to `parent`, or to the workspace.
    ///
    /// # Errors
    /// `NotFound` for an unknown parent.
    pub fn list_policies(
        &self,
        parent: Option<&ResourceName>,
    ) -> Result<Vec<Policy>, BytebaseError> {
        let store = self.store.read();
        if let Some(parent) = parent {
            ensure_exists(&store, parent)?;
        }
        Ok(store
            .scan::<Policy>()
            .filter(|policy| policy.name.parent() == parent)
            .cloned()
            .collect())
    }

    /// # Errors
    /// `FailedPrecondition` when the parent does not accept the policy type
    /// or the stored policy has another type, `NotFound` for a missing
    /// policy without `allow_missing` or an unknown parent,
    /// `InvalidArgument` for a bad mask or payload.
    pub fn upsert_policy(
        &self,
        name: &ResourceName,
        upsert: PolicyUpsert,
        mask: &FieldMask,
        allow_missing: bool,
    ) -> Result<Policy, BytebaseError> {
        name.expect(Collection::Policies)?;
        let kind = upsert.payload.policy_type();
        let parent = name.parent();
        if !kind.allowed_on(parent.map(ResourceName::collection)) {
            return Err(BytebaseError::failed_precondition(format!(
                "{} policies cannot be attached to {}",
                kind.as_str(),
                parent.map_or_else(|| "the workspace".to_owned(), |p| format!("'{p}'"))
            )));
        }
        mask.validate(&upsert)?;

        let mut store = self.store.write();
        if let Some(parent) = parent {
            ensure_exists(&store, parent)?;
        }
        let policy = match store.get::<Policy>(name).map(Policy::policy_type) {
            Ok(stored) if stored != kind => {
                return Err(BytebaseError::failed_precondition(format!(
                    "'{name}' is a {} policy and cannot become {}",
                    stored.as_str(),
                    kind.as_str()
                )));
            }
            Ok(_) => store.patch(name, &upsert, mask)?,
            Err(e) if e.kind() == ErrorKind::NotFound && allow_missing => {
                store.insert(upsert.into_policy(name.clone()))?
            }
            Err(e) => return Err(e),
        };
        debug!(policy = %name, kind = kind.as_str(), "policy upserted");
        Ok(policy)
    }

    // -- settings ---------------------------------------------------------

    /// # Errors
    /// `InvalidArgument` for an unknown setting, `NotFound` when it was
    /// never written.
    pub fn get_setting(&self, name: &ResourceName) -> Result<Setting, BytebaseError> {
        name.expect(Collection::Settings)?.id().parse::<SettingName>()?;
        self.get::<Setting>(name)
    }

    /// # Errors
    /// `InvalidArgument` when the value does not fit the setting or the mask
    /// is bad, `NotFound` for a missing setting without `allow_missing`.
    pub fn upsert_setting(
        &self,
        name: &ResourceName,
        upsert: SettingUpsert,
        mask: &FieldMask,
        allow_missing: bool,
    ) -> Result<Setting, BytebaseError> {
        let setting: SettingName = name.expect(Collection::Settings)?.id().parse()?;
        if upsert.value.setting_name() != setting {
            return Err(BytebaseError::invalid_argument(format!(
                "setting '{setting}' cannot hold a {} value",
                upsert.value.setting_name()
            )));
        }
        mask.validate(&upsert)?;
        let mut store = self.store.write();
        let stored = if store.contains::<Setting>(name) {
            store.patch(name, &upsert, mask)?
        } else if allow_missing {
            store.insert(Setting::new(upsert.value))?
        } else {
            return Err(BytebaseError::not_found(format!("'{name}' not found")));
        };
        debug!(%setting, "setting upserted");
        Ok(stored)
    }

    // -- users ------------------------------------------------------------

    /// # Errors
    /// `InvalidArgument` for a bad page token.
    pub fn list_users(
        &self,
        filter: &UserFilter,
        filter_key: &str,
        page: &PageRequest,
    ) -> Result<Page<User>, BytebaseError> {
        let store = self.store.read();
        let members = filter
            .project
            .as_ref()
            .and_then(|project| store.project_iam.get(project));
        let items = store
            .scan::<User>()
            .filter(|user| filter.matches(user, members))
            .cloned()
            .collect();
        paginate(items, filter_key, page, self.page_size_limit)
    }

    /// # Errors
    /// `InvalidArgument`, or `AlreadyExists` for a taken id or email.
    pub fn create_user(&self, id: &str, new: NewUser) -> Result<User, BytebaseError> {
        new.validate()?;
        let name = ResourceName::user(id)?;
        let mut store = self.store.write();
        ensure_email_free(&store, &new.email, None)?;
        let created = store.insert(new_user(name, new))?;
        debug!(user = %created.name, "user created");
        Ok(created)
    }

    /// # Errors
    /// `AlreadyExists` when the new email is taken, otherwise as
    /// [`Store::patch`].
    pub fn update_user(
        &self,
        name: &ResourceName,
        patch: &UserPatch,
        mask: &FieldMask,
    ) -> Result<User, BytebaseError> {
        name.expect(Collection::Users)?;
        mask.validate(patch)?;
        let mut store = self.store.write();
        if mask.contains("email")
            && let Some(email) = &patch.email
        {
            ensure_email_free(&store, email, Some(name))?;
        }
        let updated = store.patch(name, patch, mask)?;
        debug!(user = %name, %mask, "user updated");
        Ok(updated)
    }

    /// # Errors
    /// `FailedPrecondition` when deleting the caller, otherwise as
    /// [`Store::delete`].
    pub fn delete_user(&self, name: &ResourceName) -> Result<(), BytebaseError> {
        if *name == self.caller {
            return Err(BytebaseError::failed_precondition(
                "the calling user cannot delete itself",
            ));
        }
        self.delete::<User>(name)
    }

    // -- groups -----------------------------------------------------------

    /// # Errors
    /// `InvalidArgument`, `NotFound` for an unknown member, or
    /// `AlreadyExists`.
    pub fn create_group(&self, email: &str, new: NewGroup) -> Result<Group, BytebaseError> {
        new.validate()?;
        let name = ResourceName::group(email)?;
        let mut store = self.store.write();
        for member in &new.members {
            store.get_active::<User>(&member.member)?;
        }
        let created = store.insert(Group {
            name,
            state: State::Active,
            title: new.title,
            description: new.description,
            members: new.members,
        })?;
        debug!(group = %created.name, members = created.members.len(), "group created");
        Ok(created)
    }

    /// # Errors
    /// `NotFound` for an unknown member, otherwise as [`Store::patch`].
    pub fn update_group(
        &self,
        name: &ResourceName,
        patch: &GroupPatch,
        mask: &FieldMask,
    ) -> Result<Group, BytebaseError> {
        name.expect(Collection::Groups)?;
        mask.validate(patch)?;
        let mut store = self.store.write();
        if mask.contains("members") {
            for member in patch.members.iter().flatten() {
                store.get_active::<User>(&member.member)?;
            }
        }
        let updated = store.patch(name, patch, mask)?;
        debug!(group = %name, %mask, "group updated");
        Ok(updated)
    }

    // -- roles ------------------------------------------------------------

    /// # Errors
    /// `InvalidArgument` or `AlreadyExists`.
    pub fn create_role(&self, id: &str, new: NewRole) -> Result<Role, BytebaseError> {
        require_title(&new.title, "role")?;
        self.create(Role {
            name: ResourceName::role(id)?,
            state: State::Active,
            title: new.title,
            description: new.description,
            permissions: new.permissions,
            kind: RoleType::Custom,
        })
    }

    /// # Errors
    /// `FailedPrecondition` for a built-in role, otherwise as
    /// [`Store::patch`].
    pub fn update_role(
        &self,
        name: &ResourceName,
        patch: &RolePatch,
        mask: &FieldMask,
    ) -> Result<Role, BytebaseError> {
        name.expect(Collection::Roles)?;
        let mut store = self.store.write();
        ensure_custom(store.get::<Role>(name)?)?;
        let updated = store.patch(name, patch, mask)?;
        debug!(role = %name, %mask, "role updated");
        Ok(updated)
    }

    /// # Errors
    /// `FailedPrecondition` for a built-in role or one still bound in an
    /// IAM policy, `NotFound`.
    pub fn delete_role(&self, name: &ResourceName) -> Result<(), BytebaseError> {
        name.expect(Collection::Roles)?;
        let mut store = self.store.write();
        ensure_custom(store.get::<Role>(name)?)?;
        let bound = std::iter::once(&store.workspace_iam)
            .chain(store.project_iam.values())
            .flat_map(|policy| &policy.bindings)
            .any(|binding| binding.role == *name);
        if bound {
            return Err(BytebaseError::failed_precondition(format!(
                "'{name}' is still bound in an IAM policy"
            )));
        }
        store.delete::<Role>(name)?;
        debug!(role = %name, "role deleted");
        Ok(())
    }

    // -- review configs ---------------------------------------------------

    /// # Errors
    /// `NotFound` for a missing config without `allow_missing` or an
    /// unknown attached resource, `InvalidArgument` for a bad mask.
    pub fn upsert_review_config(
        &self,
        name: &ResourceName,
        upsert: ReviewConfigUpsert,
        mask: &FieldMask,
        allow_missing: bool,
    ) -> Result<ReviewConfig, BytebaseError> {
        name.expect(Collection::ReviewConfigs)?;
        mask.validate(&upsert)?;
        let mut store = self.store.write();
        for resource in upsert.resources.iter().flatten() {
            ensure_exists(&store, resource)?;
        }
        let stored = if store.contains::<ReviewConfig>(name) {
            store.patch(name, &upsert, mask)?
        } else if allow_missing {
            store.insert(upsert.into_review_config(name.clone()))?
        } else {
            return Err(BytebaseError::not_found(format!("'{name}' not found")));
        };
        debug!(review_config = %name, rules = stored.rules.len(), "review config upserted");
        Ok(stored)
    }

    // -- risks ------------------------------------------------------------

    /// # Errors
    /// `InvalidArgument` or `AlreadyExists`.
    pub fn create_risk(&self, id: &str, new: NewRisk) -> Result<Risk, BytebaseError> {
        new.validate()?;
        require_title(&new.title, "risk")?;
        self.create(Risk {
            name: ResourceName::risk(id)?,
            state: State::Active,
            source: new.source,
            title: new.title,
            level: new.level,
            active: new.active,
            condition: new.condition,
            create_time: Some(Utc::now()),
        })
    }

    // -- database groups --------------------------------------------------

    /// # Errors
    /// `InvalidArgument` or `NotFound` for the project.
    pub fn list_database_groups(
        &self,
        project: &ResourceName,
    ) -> Result<Vec<DatabaseGroup>, BytebaseError> {
        project.expect(Collection::Projects)?;
        let store = self.store.read();
        store.get::<Project>(project)?;
        Ok(store
            .scan::<DatabaseGroup>()
            .filter(|group| group.name.parent() == Some(project))
            .cloned()
            .collect())
    }

    /// # Errors
    /// `InvalidArgument`, `NotFound` or `FailedPrecondition` for the
    /// project, `AlreadyExists`.
    pub fn create_database_group(
        &self,
        project: &ResourceName,
        id: &str,
        new: NewDatabaseGroup,
    ) -> Result<DatabaseGroup, BytebaseError> {
        new.validate()?;
        require_title(&new.title, "database group")?;
        let name = ResourceName::child(project, Collection::DatabaseGroups, id)?;
        let mut store = self.store.write();
        store.get_active::<Project>(project)?;
        let created = store.insert(DatabaseGroup {
            name,
            state: State::Active,
            title: new.title,
            database_expr: new.database_expr,
            matched_databases: Vec::new(),
            unmatched_databases: Vec::new(),
        })?;
        debug!(database_group = %created.name, "database group created");
        Ok(created)
    }

    /// With [`DatabaseGroupView::Full`] the expression is evaluated against
    /// every active database of the project. A database the expression
    /// cannot be evaluated on counts as unmatched.
    ///
    /// # Errors
    /// `InvalidArgument` or `NotFound`.
    pub fn get_database_group(
        &self,
        name: &ResourceName,
        view: DatabaseGroupView,
    ) -> Result<DatabaseGroup, BytebaseError> {
        name.expect(Collection::DatabaseGroups)?;
        let store = self.store.read();
        let mut group = store.get::<DatabaseGroup>(name)?.clone();
        if view == DatabaseGroupView::Full {
            let expr = cel::parse(&group.database_expr.expression)?;
            for db in store
                .scan::<Database>()
                .filter(|db| db.state.is_active() && Some(&db.project) == name.parent())
            {
                let reference = DatabaseReference {
                    name: db.name.clone(),
                };
                match cel::evaluate_bool(&expr, &database_activation(&store, db)) {
                    Ok(true) => group.matched_databases.push(reference),
                    Ok(false) => group.unmatched_databases.push(reference),
                    Err(e) => {
                        debug!(database = %db.name, error = %e, "database expression not evaluable");
                        group.unmatched_databases.push(reference);
                    }
                }
            }
        }
        Ok(group)
    }

    /// # Errors
    /// As [`Store::patch`].
    pub fn update_database_group(
        &self,
        name: &ResourceName,
        patch: &DatabaseGroupPatch,
        mask: &FieldMask,
    ) -> Result<DatabaseGroup, BytebaseError> {
        self.update(name, patch, mask)
    }
}

fn require_title(title: &str, what: &str) -> Result<(), BytebaseError> {
    if title.trim().is_empty() {
        return Err(BytebaseError::invalid_argument(format!("{what} title is required")));
    }
    Ok(())
}

fn new_user(name: ResourceName, new: NewUser) -> User {
    User {
        name,
        state: State::Active,
        email: new.email,
        title: new.title,
        user_type: new.user_type,
        phone: new.phone,
        mfa_enabled: false,
        service_key: SecretString::default(),
        create_time: Some(Utc::now()),
    }
}

fn ensure_email_free(
    store: &Store,
    email: &str,
    except: Option<&ResourceName>,
) -> Result<(), BytebaseError> {
    match store
        .scan::<User>()
        .find(|user| user.email == email && Some(&user.name) != except)
    {
        Some(owner) => Err(BytebaseError::already_exists(format!(
            "email '{email}' is already used by '{}'",
            owner.name
        ))),
        None => Ok(()),
    }
}

fn ensure_custom(role: &Role) -> Result<(), BytebaseError> {
    if role.kind == RoleType::BuiltIn {
        return Err(BytebaseError::failed_precondition(format!(
            "'{}' is a built-in role",
            role.name
        )));
    }
    Ok(())
}

/// Parents of policies and review config attachments must exist.
fn ensure_exists(store: &Store, name: &ResourceName) -> Result<(), BytebaseError> {
    match name.collection() {
        Collection::Environments => store.get::<Environment>(name).map(|_| ()),
        Collection::Instances => store.get::<Instance>(name).map(|_| ()),
        Collection::Databases => store.get::<Database>(name).map(|_| ()),
        Collection::Projects => store.get::<Project>(name).map(|_| ()),
        other => Err(BytebaseError::invalid_argument(format!(
            "'{name}' cannot be referenced here ({other})"
        ))),
    }
}

fn check_workspace(resource: &ResourceName) -> Result<(), BytebaseError> {
    if resource.id() == WILDCARD_ID {
        Ok(())
    } else {
        Err(BytebaseError::not_found(format!("'{resource}' not found")))
    }
}

fn no_iam_policy(resource: &ResourceName) -> BytebaseError {
    BytebaseError::invalid_argument(format!("'{resource}' has no IAM policy"))
}

fn check_batch_parent(parent: &ResourceName, name: &ResourceName) -> Result<(), BytebaseError> {
    name.expect(Collection::Databases)?;
    if parent.id() != WILDCARD_ID && name.parent() != Some(parent) {
        return Err(BytebaseError::invalid_argument(format!(
            "'{name}' is not under '{parent}'"
        )));
    }
    Ok(())
}

fn update_database_in(
    store: &mut Store,
    name: &ResourceName,
    patch: &DatabasePatch,
    mask: &FieldMask,
) -> Result<Database, BytebaseError> {
    name.expect(Collection::Databases)?;
    mask.validate(patch)?;
    if mask.contains("project")
        && let Some(project) = &patch.project
    {
        store.get_active::<Project>(project)?;
    }
    if mask.contains("environment")
        && let Some(environment) = &patch.environment
    {
        store.get_active::<Environment>(environment)?;
    }
    let mut database = store.patch(name, patch, mask)?;
    let inherited = database
        .instance()
        .and_then(|instance| store.instances.get(instance))
        .and_then(|instance| instance.environment.clone());
    database.effective_environment = database.environment.clone().or(inherited);
    store.put(database.clone());
    Ok(database)
}

fn refresh_effective_environment(store: &mut Store, instance: &ResourceName) {
    let inherited = store
        .instances
        .get(instance)
        .and_then(|i| i.environment.clone());
    for db in store
        .databases
        .values_mut()
        .filter(|db| db.instance() == Some(instance))
    {
        db.effective_environment = db.environment.clone().or_else(|| inherited.clone());
    }
}

/// Materialize missing databases from `seeds` and stamp every active
/// database of the instance as synced. Returns how many were stamped.
fn sync_databases(
    store: &mut Store,
    instance: &Instance,
    seeds: &[DatabaseConfig],
) -> Result<usize, BytebaseError> {
    for seed in seeds {
        let name = ResourceName::child(&instance.name, Collection::Databases, &seed.name)?;
        if store.contains::<Database>(&name) {
            continue;
        }
        store.insert(Database {
            name,
            state: State::Active,
            project: ResourceName::default_project(),
            environment: None,
            effective_environment: None,
            engine: instance.engine,
            schema_version: String::new(),
            sync_state: SyncState::Ok,
            successful_sync_time: None,
            labels: seed.labels.clone(),
        })?;
    }

    let now = Utc::now();
    let mut synced = 0;
    for db in store
        .databases
        .values_mut()
        .filter(|db| db.state.is_active() && db.instance() == Some(&instance.name))
    {
        db.sync_state = SyncState::Ok;
        db.successful_sync_time = Some(now);
        db.effective_environment = db
            .environment
            .clone()
            .or_else(|| instance.environment.clone());
        synced += 1;
    }
    Ok(synced)
}

/// The `resource` variable database group expressions see.
fn database_activation(store: &Store, db: &Database) -> Map<String, Value> {
    let environment = db.effective_environment.as_ref();
    let environment_name = environment
        .and_then(|env| store.environments.get(env))
        .map(|env| env.title.clone())
        .unwrap_or_default();
    let resource = json!({
        "database_name": db.database_name(),
        "instance_id": db.instance().map(ResourceName::id).unwrap_or_default(),
        "environment_id": environment.map(ResourceName::id).unwrap_or_default(),
        "environment_name": environment_name,
        "project_id": db.project.id(),
        "engine": db.engine.as_str(),
        "labels": db.labels,
    });
    let mut activation = Map::new();
    activation.insert("resource".to_owned(), resource);
    activation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvironmentConfig, InstanceConfig};
    use bytebase_sdk::models::{Condition, Engine, EnvironmentTier};

    fn seeded() -> Service {
        let config = StaticPluginConfig {
            instances: vec![InstanceConfig {
                id: "pg-1".to_owned(),
                title: "Postgres 1".to_owned(),
                engine: Engine::Postgres,
                environment: Some("prod".to_owned()),
                databases: vec![
                    DatabaseConfig {
                        name: "orders".to_owned(),
                        labels: BTreeMap::from([("tier".to_owned(), "gold".to_owned())]),
                    },
                    DatabaseConfig {
                        name: "billing".to_owned(),
                        labels: BTreeMap::new(),
                    },
                ],
            }],
            ..StaticPluginConfig::default()
        };
        Service::from_config(&config).unwrap()
    }

    #[test]
    fn seeding_syncs_configured_databases() {
        let service = seeded();
        let db = service
            .get::<Database>(&ResourceName::database("pg-1", "orders").unwrap())
            .unwrap();
        assert_eq!(db.project, ResourceName::default_project());
        assert_eq!(db.engine, Engine::Postgres);
        assert_eq!(
            db.effective_environment,
            Some(ResourceName::environment("prod").unwrap())
        );
        assert!(db.successful_sync_time.is_some());
    }

    #[test]
    fn unknown_seed_environment_is_rejected() {
        let config = StaticPluginConfig {
            environments: vec![],
            instances: vec![InstanceConfig {
                id: "pg-1".to_owned(),
                title: "Postgres 1".to_owned(),
                engine: Engine::Postgres,
                environment: Some("staging".to_owned()),
                databases: vec![],
            }],
            ..StaticPluginConfig::default()
        };
        let err = Service::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn duplicate_seed_environments_are_rejected() {
        let mut config = StaticPluginConfig::default();
        config.environments.push(config.environments[0].clone());
        let err = Service::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn instance_environment_flows_into_databases() {
        let service = seeded();
        let instance = ResourceName::instance("pg-1").unwrap();
        let patch = InstancePatch {
            environment: Some(ResourceName::environment("test").unwrap()),
            ..InstancePatch::default()
        };
        service
            .update_instance(&instance, &patch, &FieldMask::from_paths(["environment"]).unwrap())
            .unwrap();
        let db = service
            .get::<Database>(&ResourceName::database("pg-1", "billing").unwrap())
            .unwrap();
        assert_eq!(
            db.effective_environment,
            Some(ResourceName::environment("test").unwrap())
        );
    }

    #[test]
    fn database_environment_overrides_instance() {
        let service = seeded();
        let name = ResourceName::database("pg-1", "orders").unwrap();
        let patch = DatabasePatch {
            environment: Some(ResourceName::environment("test").unwrap()),
            ..DatabasePatch::default()
        };
        let db = service
            .update_database(&name, &patch, &FieldMask::from_paths(["environment"]).unwrap())
            .unwrap();
        assert_eq!(db.environment, db.effective_environment);

        let patch = DatabasePatch {
            project: Some(ResourceName::project("ghost").unwrap()),
            ..DatabasePatch::default()
        };
        let err = service
            .update_database(&name, &patch, &FieldMask::from_paths(["project"]).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn full_view_partitions_project_databases() {
        let service = seeded();
        let project = service
            .create_project("shop", NewProject::new("Shop"))
            .unwrap()
            .name;
        for db in ["orders", "billing"] {
            service
                .update_database(
                    &ResourceName::database("pg-1", db).unwrap(),
                    &DatabasePatch {
                        project: Some(project.clone()),
                        ..DatabasePatch::default()
                    },
                    &FieldMask::from_paths(["project"]).unwrap(),
                )
                .unwrap();
        }
        let group = service
            .create_database_group(
                &project,
                "gold",
                NewDatabaseGroup {
                    title: "Gold".to_owned(),
                    database_expr: Condition::new(r#"resource.labels.tier == "gold""#),
                },
            )
            .unwrap();

        let basic = service
            .get_database_group(&group.name, DatabaseGroupView::Basic)
            .unwrap();
        assert!(basic.matched_databases.is_empty());

        let full = service
            .get_database_group(&group.name, DatabaseGroupView::Full)
            .unwrap();
        let matched: Vec<&str> = full.matched_databases.iter().map(|r| r.name.id()).collect();
        assert_eq!(matched, vec!["orders"]);
        // billing has no tier label, so the lookup fails and it is unmatched
        let unmatched: Vec<&str> = full
            .unmatched_databases
            .iter()
            .map(|r| r.name.id())
            .collect();
        assert_eq!(unmatched, vec!["billing"]);
    }

    #[test]
    fn project_with_databases_cannot_be_deleted() {
        let service = seeded();
        let project = service
            .create_project("shop", NewProject::new("Shop"))
            .unwrap()
            .name;
        service
            .update_database(
                &ResourceName::database("pg-1", "orders").unwrap(),
                &DatabasePatch {
                    project: Some(project.clone()),
                    ..DatabasePatch::default()
                },
                &FieldMask::from_paths(["project"]).unwrap(),
            )
            .unwrap();
        let err = service.delete_project(&project).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

        let err = service
            .delete_project(&ResourceName::default_project())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }

    #[test]
    fn built_in_roles_are_fixed() {
        let service = seeded();
        let admin = ResourceName::role(WORKSPACE_ADMIN_ROLE).unwrap();
        let err = service.delete_role(&admin).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

        let patch = RolePatch {
            title: Some("Boss".to_owned()),
            ..RolePatch::default()
        };
        let err = service
            .update_role(&admin, &patch, &FieldMask::from_paths(["title"]).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }

    #[test]
    fn caller_cannot_be_deleted() {
        let service = seeded();
        let err = service.delete_user(&service.caller.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }

    #[test]
    fn emails_are_unique() {
        let service = seeded();
        let new = NewUser {
            email: "admin@example.com".to_owned(),
            ..NewUser::default()
        };
        let err = service.create_user("other", new).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn environments_sort_by_order_then_name() {
        let mut config = StaticPluginConfig::default();
        config.environments = vec![
            EnvironmentConfig {
                id: "b".to_owned(),
                title: "B".to_owned(),
                order: 1,
                tier: EnvironmentTier::Unprotected,
            },
            EnvironmentConfig {
                id: "c".to_owned(),
                title: "C".to_owned(),
                order: 0,
                tier: EnvironmentTier::Protected,
            },
            EnvironmentConfig {
                id: "a".to_owned(),
                title: "A".to_owned(),
                order: 1,
                tier: EnvironmentTier::Unprotected,
            },
        ];
        let service = Service::from_config(&config).unwrap();
        let ids: Vec<String> = service
            .list_environments(false)
            .into_iter()
            .map(|env| env.name.id().to_owned())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
