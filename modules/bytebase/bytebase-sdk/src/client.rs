//! `Client<T>`: the [`BytebaseApi`] implementation over a [`Transport`].
//!
//! Requests are validated locally first (names, masks, payloads,
//! expressions), so malformed input never reaches the transport. Each call
//! then races the transport against the context's cancellation token and
//! deadline.

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::api::BytebaseApi;
use crate::caller::IdentityProvider;
use crate::cel::{self, Expr};
use crate::config::ClientConfig;
use crate::context::CallContext;
use crate::error::BytebaseError;
use crate::filter::{DatabaseFilter, InstanceFilter, Page, PageRequest, ProjectFilter, UserFilter};
use crate::mask::{FieldMask, Patch, Upsert};
use crate::models::{
    BatchUpdateDatabasesRequest, BatchUpdateDatabasesResponse, Database, DatabaseCatalog,
    DatabaseGroup, DatabaseGroupPatch, DatabaseGroupView, DatabasePatch, DatabaseUpdateOutcome,
    Environment, EnvironmentPatch, Group, GroupPatch, IamPolicy, Instance, InstancePatch,
    NewDatabaseGroup, NewEnvironment, NewGroup, NewInstance, NewProject, NewRisk, NewRole,
    NewUser, Policy, PolicyUpsert, Project, ProjectPatch, ReviewConfig, ReviewConfigUpsert, Risk,
    RiskPatch, Role, RolePatch, Setting, SettingName, SettingUpsert, UpdateDatabaseRequest, User,
    UserPatch,
};
use crate::names::{Collection, ResourceName, WILDCARD_ID};
use crate::pager::ItemPager;
use crate::transport::{CustomVerb, Request, Transport, Verb};

/// Response key carrying the continuation token of a listing.
pub const NEXT_PAGE_TOKEN: &str = "nextPageToken";

/// Name used for requests that address no resource, like expression parsing.
pub const CEL_PATH: &str = "cel";

/// Client for the management API, generic over the wire.
///
/// Holds no mutable state; share it behind an `Arc` across tasks.
pub struct Client<T> {
    transport: T,
    caller: User,
    config: ClientConfig,
}

impl<T: Transport> Client<T> {
    /// A client acting as `caller`, with default configuration.
    pub fn new(transport: T, caller: User) -> Self {
        Self {
            transport,
            caller,
            config: ClientConfig::default(),
        }
    }

    /// Resolve the caller once through `identity` and build the client.
    ///
    /// # Errors
    /// Propagates the identity provider's failure.
    pub async fn connect<I>(transport: T, identity: &I) -> Result<Self, BytebaseError>
    where
        I: IdentityProvider + ?Sized,
    {
        let caller = identity.current_user().await?;
        debug!(caller = %caller.name, "bytebase client connected");
        Ok(Self::new(transport, caller))
    }

    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Every project matching `filter`, fetched page by page.
    pub fn project_stream<'a>(
        &'a self,
        ctx: &CallContext,
        filter: ProjectFilter,
    ) -> impl Stream<Item = Result<Project, BytebaseError>> + 'a {
        let ctx = ctx.clone();
        ItemPager::new(PageRequest::default(), move |page| {
            let ctx = ctx.clone();
            let filter = filter.clone();
            async move { self.list_projects(&ctx, filter, page).await }
        })
    }

    /// Every instance matching `filter`, fetched page by page.
    pub fn instance_stream<'a>(
        &'a self,
        ctx: &CallContext,
        filter: InstanceFilter,
    ) -> impl Stream<Item = Result<Instance, BytebaseError>> + 'a {
        let ctx = ctx.clone();
        ItemPager::new(PageRequest::default(), move |page| {
            let ctx = ctx.clone();
            let filter = filter.clone();
            async move { self.list_instances(&ctx, filter, page).await }
        })
    }

    /// Every database under `parent` matching `filter`, fetched page by page.
    pub fn database_stream<'a>(
        &'a self,
        ctx: &CallContext,
        parent: ResourceName,
        filter: DatabaseFilter,
    ) -> impl Stream<Item = Result<Database, BytebaseError>> + 'a {
        let ctx = ctx.clone();
        ItemPager::new(PageRequest::default(), move |page| {
            let ctx = ctx.clone();
            let parent = parent.clone();
            let filter = filter.clone();
            async move { self.list_databases(&ctx, &parent, filter, page).await }
        })
    }

    /// Every user matching `filter`, fetched page by page.
    pub fn user_stream<'a>(
        &'a self,
        ctx: &CallContext,
        filter: UserFilter,
    ) -> impl Stream<Item = Result<User, BytebaseError>> + 'a {
        let ctx = ctx.clone();
        ItemPager::new(PageRequest::default(), move |page| {
            let ctx = ctx.clone();
            let filter = filter.clone();
            async move { self.list_users(&ctx, filter, page).await }
        })
    }

    /// Send one request, honoring cancellation and the deadline.
    #[instrument(skip_all, fields(verb = %request.verb, path = %request.path))]
    async fn call(&self, ctx: &CallContext, request: Request) -> Result<Value, BytebaseError> {
        if ctx.is_cancelled() {
            debug!("context cancelled before send");
            return Err(BytebaseError::Cancelled);
        }
        let deadline = ctx
            .deadline()
            .or_else(|| self.config.request_timeout.map(|t| Instant::now() + t));
        if deadline.is_some_and(|d| d <= Instant::now()) {
            debug!("deadline passed before send");
            return Err(BytebaseError::DeadlineExceeded);
        }

        let send = self.transport.send(request);
        let bounded = async move {
            match deadline {
                Some(at) => tokio::time::timeout_at(at, send)
                    .await
                    .map_err(|_| BytebaseError::DeadlineExceeded),
                None => Ok(send.await),
            }
        };
        let sent = tokio::select! {
            biased;
            () = ctx.token().cancelled() => Err(BytebaseError::Cancelled),
            sent = bounded => sent,
        };

        match sent {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(status)) => {
                debug!(code = ?status.code, message = %status.message, "transport returned an error status");
                Err(status.into())
            }
            Err(e) => {
                debug!(error = %e, "call aborted");
                Err(e)
            }
        }
    }

    async fn fetch<R: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<R, BytebaseError> {
        decode(self.call(ctx, request).await?)
    }

    async fn get_named<R: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        collection: Collection,
    ) -> Result<R, BytebaseError> {
        checked(name.expect(collection))?;
        self.fetch(ctx, Request::new(Verb::Get, name.to_string())).await
    }

    async fn list_all<R: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        parent: Option<&ResourceName>,
        collection: Collection,
        query: &[(&str, String)],
    ) -> Result<Vec<R>, BytebaseError> {
        let mut request = Request::new(
            Verb::List,
            ResourceName::collection_path(parent, collection),
        );
        for (key, value) in query {
            request = request.with_query(key, value.clone());
        }
        let body = self.call(ctx, request).await?;
        decode_items(body, collection.as_str())
    }

    async fn list_page<R, F>(
        &self,
        ctx: &CallContext,
        parent: Option<&ResourceName>,
        collection: Collection,
        filter: &F,
        page: PageRequest,
    ) -> Result<Page<R>, BytebaseError>
    where
        R: DeserializeOwned,
        F: Serialize + Default + PartialEq,
    {
        let page_size = self.config.effective_page_size(page.page_size);
        let mut request = Request::new(
            Verb::List,
            ResourceName::collection_path(parent, collection),
        )
        .with_query("pageSize", page_size.to_string());
        if !page.page_token.is_empty() {
            request = request.with_query("pageToken", page.page_token);
        }
        if *filter != F::default() {
            request = request.with_query("filter", encode_filter(filter)?);
        }
        let mut body = self.call(ctx, request).await?;
        let next_page_token = match body.get_mut(NEXT_PAGE_TOKEN).map(Value::take) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(token)) => token,
            Some(other) => {
                return Err(BytebaseError::internal(format!(
                    "page token must be a string, got {other}"
                )));
            }
        };
        Ok(Page::new(
            decode_items(body, collection.as_str())?,
            next_page_token,
        ))
    }

    async fn create_in<B: Serialize, R: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        parent: Option<&ResourceName>,
        collection: Collection,
        id: &str,
        body: &B,
    ) -> Result<R, BytebaseError> {
        checked(match parent {
            Some(p) => ResourceName::child(p, collection, id),
            None => ResourceName::new(collection, id),
        })?;
        let request = Request::new(
            Verb::Create,
            ResourceName::collection_path(parent, collection),
        )
        .with_query(collection.id_param(), id)
        .with_body(encode(body)?);
        self.fetch(ctx, request).await
    }

    async fn update_named<P: Patch + Serialize>(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        collection: Collection,
        patch: &P,
        mask: FieldMask,
    ) -> Result<P::Target, BytebaseError>
    where
        P::Target: DeserializeOwned,
    {
        checked(name.expect(collection))?;
        checked(mask.validate(patch))?;
        let request = Request::new(Verb::Update, name.to_string())
            .with_body(encode(patch)?)
            .with_mask(mask);
        self.fetch(ctx, request).await
    }

    async fn upsert_named<U: Upsert + Serialize>(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        collection: Collection,
        upsert: &U,
        mask: &FieldMask,
    ) -> Result<U::Target, BytebaseError>
    where
        U::Target: DeserializeOwned,
    {
        checked(name.expect(collection))?;
        let mask = checked(U::effective_mask(mask))?;
        checked(mask.validate(upsert))?;
        let request = Request::new(Verb::Update, name.to_string())
            .with_body(encode(upsert)?)
            .with_mask(mask)
            .allow_missing(true);
        self.fetch(ctx, request).await
    }

    async fn delete_named(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        collection: Collection,
    ) -> Result<(), BytebaseError> {
        checked(name.expect(collection))?;
        self.call(ctx, Request::new(Verb::Delete, name.to_string()))
            .await
            .map(|_| ())
    }

    async fn undelete_named<R: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        collection: Collection,
    ) -> Result<R, BytebaseError> {
        checked(name.expect(collection))?;
        let request = Request::new(Verb::Custom(CustomVerb::Undelete), name.to_string());
        self.fetch(ctx, request).await
    }

    async fn get_iam(&self, ctx: &CallContext, resource: &str) -> Result<IamPolicy, BytebaseError> {
        self.fetch(ctx, Request::new(Verb::Custom(CustomVerb::GetIamPolicy), resource))
            .await
    }

    async fn set_iam(
        &self,
        ctx: &CallContext,
        resource: &str,
        policy: &IamPolicy,
    ) -> Result<IamPolicy, BytebaseError> {
        checked(policy.validate())?;
        let request = Request::new(Verb::Custom(CustomVerb::SetIamPolicy), resource)
            .with_body(encode(policy)?);
        self.fetch(ctx, request).await
    }
}

/// Log local validation failures; they never reach the transport.
fn checked<T>(result: Result<T, BytebaseError>) -> Result<T, BytebaseError> {
    if let Err(e) = &result {
        debug!(error = %e, "request rejected locally");
    }
    result
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, BytebaseError> {
    serde_json::to_value(body)
        .map_err(|e| BytebaseError::internal(format!("cannot encode request body: {e}")))
}

fn encode_filter<F: Serialize>(filter: &F) -> Result<String, BytebaseError> {
    serde_json::to_string(filter)
        .map_err(|e| BytebaseError::internal(format!("cannot encode filter: {e}")))
}

fn decode<R: DeserializeOwned>(body: Value) -> Result<R, BytebaseError> {
    serde_json::from_value(body)
        .map_err(|e| BytebaseError::internal(format!("undecodable response: {e}")))
}

/// A missing list key means an empty list.
fn decode_items<R: DeserializeOwned>(mut body: Value, key: &str) -> Result<Vec<R>, BytebaseError> {
    match body.get_mut(key).map(Value::take) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => decode(items),
    }
}

#[async_trait]
impl<T: Transport> BytebaseApi for Client<T> {
    fn caller(&self) -> &User {
        &self.caller
    }

    async fn get_environment(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Environment, BytebaseError> {
        self.get_named(ctx, name, Collection::Environments).await
    }

    async fn list_environments(
        &self,
        ctx: &CallContext,
        show_deleted: bool,
    ) -> Result<Vec<Environment>, BytebaseError> {
        let query = [("showDeleted", show_deleted.to_string())];
        let mut environments: Vec<Environment> = self
            .list_all(ctx, None, Collection::Environments, &query)
            .await?;
        environments.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(environments)
    }

    async fn create_environment(
        &self,
        ctx: &CallContext,
        id: &str,
        environment: NewEnvironment,
    ) -> Result<Environment, BytebaseError> {
        self.create_in(ctx, None, Collection::Environments, id, &environment)
            .await
    }

    async fn update_environment(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: EnvironmentPatch,
        mask: FieldMask,
    ) -> Result<Environment, BytebaseError> {
        self.update_named(ctx, name, Collection::Environments, &patch, mask)
            .await
    }

    async fn delete_environment(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::Environments).await
    }

    async fn undelete_environment(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Environment, BytebaseError> {
        self.undelete_named(ctx, name, Collection::Environments)
            .await
    }

    async fn list_instances(
        &self,
        ctx: &CallContext,
        filter: InstanceFilter,
        page: PageRequest,
    ) -> Result<Page<Instance>, BytebaseError> {
        self.list_page(ctx, None, Collection::Instances, &filter, page)
            .await
    }

    async fn get_instance(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Instance, BytebaseError> {
        self.get_named(ctx, name, Collection::Instances).await
    }

    async fn create_instance(
        &self,
        ctx: &CallContext,
        id: &str,
        instance: NewInstance,
    ) -> Result<Instance, BytebaseError> {
        checked(instance.validate())?;
        self.create_in(ctx, None, Collection::Instances, id, &instance)
            .await
    }

    async fn update_instance(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: InstancePatch,
        mask: FieldMask,
    ) -> Result<Instance, BytebaseError> {
        self.update_named(ctx, name, Collection::Instances, &patch, mask)
            .await
    }

    async fn delete_instance(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::Instances).await
    }

    async fn undelete_instance(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Instance, BytebaseError> {
        self.undelete_named(ctx, name, Collection::Instances).await
    }

    async fn sync_instance_schema(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        checked(name.expect(Collection::Instances))?;
        let request = Request::new(Verb::Custom(CustomVerb::Sync), name.to_string());
        self.call(ctx, request).await.map(|_| ())
    }

    async fn get_database(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Database, BytebaseError> {
        self.get_named(ctx, name, Collection::Databases).await
    }

    async fn list_databases(
        &self,
        ctx: &CallContext,
        parent: &ResourceName,
        filter: DatabaseFilter,
        page: PageRequest,
    ) -> Result<Page<Database>, BytebaseError> {
        checked(parent.expect(Collection::Instances))?;
        self.list_page(ctx, Some(parent), Collection::Databases, &filter, page)
            .await
    }

    async fn update_database(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: DatabasePatch,
        mask: FieldMask,
    ) -> Result<Database, BytebaseError> {
        self.update_named(ctx, name, Collection::Databases, &patch, mask)
            .await
    }

    async fn batch_update_databases(
        &self,
        ctx: &CallContext,
        parent: &ResourceName,
        requests: Vec<UpdateDatabaseRequest>,
    ) -> Result<Vec<DatabaseUpdateOutcome>, BytebaseError> {
        checked(parent.expect(Collection::Instances))?;

        // Entries rejected locally keep their slot; the rest are sent.
        let mut slots: Vec<Option<DatabaseUpdateOutcome>> = Vec::with_capacity(requests.len());
        let mut sent = Vec::new();
        for entry in requests {
            match check_batch_entry(parent, &entry) {
                Ok(()) => {
                    slots.push(None);
                    sent.push(entry);
                }
                Err(e) => {
                    debug!(database = %entry.name, error = %e, "batch entry rejected locally");
                    slots.push(Some(DatabaseUpdateOutcome {
                        name: entry.name,
                        result: Err(e),
                    }));
                }
            }
        }

        let mut results = Vec::new().into_iter();
        if !sent.is_empty() {
            let expected = sent.len();
            let request = Request::new(
                Verb::Custom(CustomVerb::BatchUpdate),
                ResourceName::collection_path(Some(parent), Collection::Databases),
            )
            .with_body(encode(&BatchUpdateDatabasesRequest { requests: sent })?);
            let response: BatchUpdateDatabasesResponse = self.fetch(ctx, request).await?;
            if response.results.len() != expected {
                return Err(BytebaseError::internal(format!(
                    "batch update sent {expected} entries but got {} results",
                    response.results.len()
                )));
            }
            results = response.results.into_iter();
        }

        slots
            .into_iter()
            .map(|slot| match slot {
                Some(outcome) => Ok(outcome),
                None => results
                    .next()
                    .ok_or_else(|| BytebaseError::internal("batch results exhausted"))
                    .and_then(DatabaseUpdateOutcome::try_from),
            })
            .collect()
    }

    async fn get_database_catalog(
        &self,
        ctx: &CallContext,
        database: &ResourceName,
    ) -> Result<DatabaseCatalog, BytebaseError> {
        checked(database.expect(Collection::Databases))?;
        self.fetch(ctx, Request::new(Verb::Get, database.catalog_path()))
            .await
    }

    async fn update_database_catalog(
        &self,
        ctx: &CallContext,
        catalog: DatabaseCatalog,
    ) -> Result<DatabaseCatalog, BytebaseError> {
        let database = checked(catalog.database())?;
        let request = Request::new(Verb::Update, database.catalog_path()).with_body(encode(&catalog)?);
        self.fetch(ctx, request).await
    }

    async fn get_project(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Project, BytebaseError> {
        self.get_named(ctx, name, Collection::Projects).await
    }

    async fn list_projects(
        &self,
        ctx: &CallContext,
        filter: ProjectFilter,
        page: PageRequest,
    ) -> Result<Page<Project>, BytebaseError> {
        self.list_page(ctx, None, Collection::Projects, &filter, page)
            .await
    }

    async fn create_project(
        &self,
        ctx: &CallContext,
        id: &str,
        project: NewProject,
    ) -> Result<Project, BytebaseError> {
        self.create_in(ctx, None, Collection::Projects, id, &project)
            .await
    }

    async fn update_project(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: ProjectPatch,
        mask: FieldMask,
    ) -> Result<Project, BytebaseError> {
        self.update_named(ctx, name, Collection::Projects, &patch, mask)
            .await
    }

    async fn delete_project(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::Projects).await
    }

    async fn undelete_project(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Project, BytebaseError> {
        self.undelete_named(ctx, name, Collection::Projects).await
    }

    async fn get_project_iam_policy(
        &self,
        ctx: &CallContext,
        project: &ResourceName,
    ) -> Result<IamPolicy, BytebaseError> {
        checked(project.expect(Collection::Projects))?;
        self.get_iam(ctx, &project.to_string()).await
    }

    async fn set_project_iam_policy(
        &self,
        ctx: &CallContext,
        project: &ResourceName,
        policy: IamPolicy,
    ) -> Result<IamPolicy, BytebaseError> {
        checked(project.expect(Collection::Projects))?;
        self.set_iam(ctx, &project.to_string(), &policy).await
    }

    async fn list_policies(
        &self,
        ctx: &CallContext,
        parent: Option<&ResourceName>,
    ) -> Result<Vec<Policy>, BytebaseError> {
        if let Some(parent) = parent
            && !Collection::Policies.accepts_parent(Some(parent.collection()))
        {
            return checked(Err(BytebaseError::invalid_argument(format!(
                "policies cannot live under '{parent}'"
            ))));
        }
        self.list_all(ctx, parent, Collection::Policies, &[]).await
    }

    async fn get_policy(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Policy, BytebaseError> {
        self.get_named(ctx, name, Collection::Policies).await
    }

    async fn upsert_policy(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        upsert: PolicyUpsert,
        mask: FieldMask,
    ) -> Result<Policy, BytebaseError> {
        self.upsert_named(ctx, name, Collection::Policies, &upsert, &mask)
            .await
    }

    async fn delete_policy(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::Policies).await
    }

    async fn list_settings(&self, ctx: &CallContext) -> Result<Vec<Setting>, BytebaseError> {
        self.list_all(ctx, None, Collection::Settings, &[]).await
    }

    async fn get_setting(
        &self,
        ctx: &CallContext,
        name: SettingName,
    ) -> Result<Setting, BytebaseError> {
        self.get_named(ctx, &ResourceName::setting(name), Collection::Settings)
            .await
    }

    async fn upsert_setting(
        &self,
        ctx: &CallContext,
        upsert: SettingUpsert,
        mask: FieldMask,
    ) -> Result<Setting, BytebaseError> {
        let name = ResourceName::setting(upsert.value.setting_name());
        self.upsert_named(ctx, &name, Collection::Settings, &upsert, &mask)
            .await
    }

    async fn parse_expression(
        &self,
        ctx: &CallContext,
        expression: &str,
    ) -> Result<Expr, BytebaseError> {
        checked(cel::parse(expression))?;
        let request = Request::new(Verb::Custom(CustomVerb::ParseExpression), CEL_PATH)
            .with_body(serde_json::json!({ "expression": expression }));
        self.fetch(ctx, request).await
    }

    async fn list_users(
        &self,
        ctx: &CallContext,
        filter: UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, BytebaseError> {
        if let Some(project) = &filter.project {
            checked(project.expect(Collection::Projects))?;
        }
        self.list_page(ctx, None, Collection::Users, &filter, page)
            .await
    }

    async fn create_user(
        &self,
        ctx: &CallContext,
        id: &str,
        user: NewUser,
    ) -> Result<User, BytebaseError> {
        checked(user.validate())?;
        self.create_in(ctx, None, Collection::Users, id, &user).await
    }

    async fn get_user(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<User, BytebaseError> {
        self.get_named(ctx, name, Collection::Users).await
    }

    async fn update_user(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: UserPatch,
        mask: FieldMask,
    ) -> Result<User, BytebaseError> {
        self.update_named(ctx, name, Collection::Users, &patch, mask)
            .await
    }

    async fn delete_user(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::Users).await
    }

    async fn undelete_user(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<User, BytebaseError> {
        self.undelete_named(ctx, name, Collection::Users).await
    }

    async fn list_groups(&self, ctx: &CallContext) -> Result<Vec<Group>, BytebaseError> {
        self.list_all(ctx, None, Collection::Groups, &[]).await
    }

    async fn create_group(
        &self,
        ctx: &CallContext,
        email: &str,
        group: NewGroup,
    ) -> Result<Group, BytebaseError> {
        checked(group.validate())?;
        self.create_in(ctx, None, Collection::Groups, email, &group)
            .await
    }

    async fn get_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Group, BytebaseError> {
        self.get_named(ctx, name, Collection::Groups).await
    }

    async fn update_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: GroupPatch,
        mask: FieldMask,
    ) -> Result<Group, BytebaseError> {
        self.update_named(ctx, name, Collection::Groups, &patch, mask)
            .await
    }

    async fn delete_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::Groups).await
    }

    async fn get_workspace_iam_policy(
        &self,
        ctx: &CallContext,
    ) -> Result<IamPolicy, BytebaseError> {
        self.get_iam(ctx, &ResourceName::workspace().to_string())
            .await
    }

    async fn set_workspace_iam_policy(
        &self,
        ctx: &CallContext,
        policy: IamPolicy,
    ) -> Result<IamPolicy, BytebaseError> {
        self.set_iam(ctx, &ResourceName::workspace().to_string(), &policy)
            .await
    }

    async fn list_roles(&self, ctx: &CallContext) -> Result<Vec<Role>, BytebaseError> {
        self.list_all(ctx, None, Collection::Roles, &[]).await
    }

    async fn create_role(
        &self,
        ctx: &CallContext,
        id: &str,
        role: NewRole,
    ) -> Result<Role, BytebaseError> {
        self.create_in(ctx, None, Collection::Roles, id, &role).await
    }

    async fn get_role(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Role, BytebaseError> {
        self.get_named(ctx, name, Collection::Roles).await
    }

    async fn update_role(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: RolePatch,
        mask: FieldMask,
    ) -> Result<Role, BytebaseError> {
        self.update_named(ctx, name, Collection::Roles, &patch, mask)
            .await
    }

    async fn delete_role(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::Roles).await
    }

    async fn list_review_configs(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<ReviewConfig>, BytebaseError> {
        self.list_all(ctx, None, Collection::ReviewConfigs, &[]).await
    }

    async fn get_review_config(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<ReviewConfig, BytebaseError> {
        self.get_named(ctx, name, Collection::ReviewConfigs).await
    }

    async fn upsert_review_config(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        upsert: ReviewConfigUpsert,
        mask: FieldMask,
    ) -> Result<ReviewConfig, BytebaseError> {
        self.upsert_named(ctx, name, Collection::ReviewConfigs, &upsert, &mask)
            .await
    }

    async fn delete_review_config(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::ReviewConfigs).await
    }

    async fn list_risks(&self, ctx: &CallContext) -> Result<Vec<Risk>, BytebaseError> {
        self.list_all(ctx, None, Collection::Risks, &[]).await
    }

    async fn get_risk(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<Risk, BytebaseError> {
        self.get_named(ctx, name, Collection::Risks).await
    }

    async fn create_risk(
        &self,
        ctx: &CallContext,
        id: &str,
        risk: NewRisk,
    ) -> Result<Risk, BytebaseError> {
        checked(risk.validate())?;
        self.create_in(ctx, None, Collection::Risks, id, &risk).await
    }

    async fn update_risk(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: RiskPatch,
        mask: FieldMask,
    ) -> Result<Risk, BytebaseError> {
        self.update_named(ctx, name, Collection::Risks, &patch, mask)
            .await
    }

    async fn delete_risk(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::Risks).await
    }

    async fn list_database_groups(
        &self,
        ctx: &CallContext,
        project: &ResourceName,
    ) -> Result<Vec<DatabaseGroup>, BytebaseError> {
        checked(project.expect(Collection::Projects))?;
        self.list_all(ctx, Some(project), Collection::DatabaseGroups, &[])
            .await
    }

    async fn create_database_group(
        &self,
        ctx: &CallContext,
        project: &ResourceName,
        id: &str,
        group: NewDatabaseGroup,
    ) -> Result<DatabaseGroup, BytebaseError> {
        checked(group.validate())?;
        self.create_in(ctx, Some(project), Collection::DatabaseGroups, id, &group)
            .await
    }

    async fn get_database_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        view: DatabaseGroupView,
    ) -> Result<DatabaseGroup, BytebaseError> {
        checked(name.expect(Collection::DatabaseGroups))?;
        let request = Request::new(Verb::Get, name.to_string()).with_query("view", view.as_str());
        self.fetch(ctx, request).await
    }

    async fn update_database_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
        patch: DatabaseGroupPatch,
        mask: FieldMask,
    ) -> Result<DatabaseGroup, BytebaseError> {
        self.update_named(ctx, name, Collection::DatabaseGroups, &patch, mask)
            .await
    }

    async fn delete_database_group(
        &self,
        ctx: &CallContext,
        name: &ResourceName,
    ) -> Result<(), BytebaseError> {
        self.delete_named(ctx, name, Collection::DatabaseGroups).await
    }
}

/// The entry must name a database of `parent` (any instance for `instances/-`)
/// and carry a valid mask.
fn check_batch_entry(
    parent: &ResourceName,
    entry: &UpdateDatabaseRequest,
) -> Result<(), BytebaseError> {
    entry.name.expect(Collection::Databases)?;
    if parent.id() != WILDCARD_ID && entry.name.parent() != Some(parent) {
        return Err(BytebaseError::invalid_argument(format!(
            "'{}' is not a database of '{parent}'",
            entry.name
        )));
    }
    entry.update_mask.validate(&entry.patch)
}
