//! Client implementation for the static Bytebase plugin.
//!
//! Implements the SDK's `Transport` and `IdentityProvider` on top of the
//! domain service, so a regular `Client` can talk to the in-memory
//! workspace exactly as it would to a server.

use std::sync::Arc;

use async_trait::async_trait;
use bytebase_sdk::cel;
use bytebase_sdk::client::{CEL_PATH, NEXT_PAGE_TOKEN};
use bytebase_sdk::models::{
    BatchUpdateDatabasesRequest, Database, DatabaseGroup, DatabaseGroupView, Environment,
    EnvironmentPatch, Group, Instance, Policy, Project, ProjectPatch, ReviewConfig, Risk,
    RiskPatch, Role, Setting, User,
};
use bytebase_sdk::names::CATALOG_SUFFIX;
use bytebase_sdk::{
    BytebaseError, Client, Collection, CustomVerb, IdentityProvider, PageRequest, Request,
    ResourceName, Status, Transport, Verb,
};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::service::Service;

#[async_trait]
impl Transport for Service {
    async fn send(&self, request: Request) -> Result<Value, Status> {
        self.dispatch(&request).map_err(|e| {
            debug!(verb = %request.verb, path = %request.path, error = %e, "request failed");
            e.to_status()
        })
    }
}

#[async_trait]
impl IdentityProvider for Service {
    async fn current_user(&self) -> Result<User, BytebaseError> {
        self.caller_user()
    }
}

#[derive(Deserialize)]
struct ParseExpressionRequest {
    expression: String,
}

impl Service {
    /// A client acting as the seeded caller.
    ///
    /// # Errors
    /// `NotFound` if the caller record is missing.
    pub fn client(self: &Arc<Self>) -> Result<Client<Arc<Self>>, BytebaseError> {
        Ok(Client::new(Arc::clone(self), self.caller_user()?))
    }

    fn dispatch(&self, request: &Request) -> Result<Value, BytebaseError> {
        let path = request.resource_path();
        match request.verb {
            Verb::Get => self.route_get(request, path),
            Verb::List => {
                let (parent, collection) = split_collection(path)?;
                self.route_list(request, parent.as_ref(), collection)
            }
            Verb::Create => {
                let (parent, collection) = split_collection(path)?;
                self.route_create(request, parent.as_ref(), collection)
            }
            Verb::Update => self.route_update(request, path),
            Verb::Delete => self.route_delete(request, &ResourceName::parse(path)?),
            Verb::Custom(custom) => self.route_custom(request, custom, path),
        }
    }

    fn route_get(&self, request: &Request, path: &str) -> Result<Value, BytebaseError> {
        if let Some(database) = catalog_database(path)? {
            return reply(&self.get_database_catalog(&database)?);
        }
        let name = ResourceName::parse(path)?;
        match name.collection() {
            Collection::Environments => reply(&self.get::<Environment>(&name)?),
            Collection::Instances => reply(&self.get::<Instance>(&name)?.redacted()),
            Collection::Databases => reply(&self.get::<Database>(&name)?),
            Collection::Projects => reply(&self.get::<Project>(&name)?),
            Collection::Users => reply(&self.get::<User>(&name)?),
            Collection::Groups => reply(&self.get::<Group>(&name)?),
            Collection::Roles => reply(&self.get::<Role>(&name)?),
            Collection::Policies => reply(&self.get::<Policy>(&name)?),
            Collection::Settings => reply(&self.get_setting(&name)?),
            Collection::ReviewConfigs => reply(&self.get::<ReviewConfig>(&name)?),
            Collection::Risks => reply(&self.get::<Risk>(&name)?),
            Collection::DatabaseGroups => {
                let view = match request.query_param("view") {
                    None | Some("BASIC") => DatabaseGroupView::Basic,
                    Some("FULL") => DatabaseGroupView::Full,
                    Some(other) => {
                        return Err(BytebaseError::invalid_argument(format!(
                            "unknown database group view '{other}'"
                        )));
                    }
                };
                reply(&self.get_database_group(&name, view)?)
            }
            Collection::Workspaces => Err(unsupported(request)),
        }
    }

    fn route_list(
        &self,
        request: &Request,
        parent: Option<&ResourceName>,
        collection: Collection,
    ) -> Result<Value, BytebaseError> {
        match (collection, parent) {
            (Collection::Environments, None) => {
                let show_deleted = request.query_param("showDeleted") == Some("true");
                items_reply(collection, &self.list_environments(show_deleted), "")
            }
            (Collection::Instances, None) => {
                let (filter, key) = filter_param(request)?;
                let page = self.list_instances(&filter, key, &page_param(request)?)?;
                let items: Vec<Instance> = page.items.into_iter().map(Instance::redacted).collect();
                items_reply(collection, &items, &page.next_page_token)
            }
            (Collection::Databases, Some(instance)) => {
                let (filter, key) = filter_param(request)?;
                let page = self.list_databases(instance, &filter, key, &page_param(request)?)?;
                items_reply(collection, &page.items, &page.next_page_token)
            }
            (Collection::Projects, None) => {
                let (filter, key) = filter_param(request)?;
                let page = self.list_projects(&filter, key, &page_param(request)?)?;
                items_reply(collection, &page.items, &page.next_page_token)
            }
            (Collection::Users, None) => {
                let (filter, key) = filter_param(request)?;
                let page = self.list_users(&filter, key, &page_param(request)?)?;
                items_reply(collection, &page.items, &page.next_page_token)
            }
            (Collection::Policies, parent) => {
                items_reply(collection, &self.list_policies(parent)?, "")
            }
            (Collection::Settings, None) => {
                items_reply(collection, &self.list::<Setting>(|_| true), "")
            }
            (Collection::Groups, None) => items_reply(collection, &self.list::<Group>(|_| true), ""),
            (Collection::Roles, None) => items_reply(collection, &self.list::<Role>(|_| true), ""),
            (Collection::ReviewConfigs, None) => {
                items_reply(collection, &self.list::<ReviewConfig>(|_| true), "")
            }
            (Collection::Risks, None) => items_reply(collection, &self.list::<Risk>(|_| true), ""),
            (Collection::DatabaseGroups, Some(project)) => {
                items_reply(collection, &self.list_database_groups(project)?, "")
            }
            _ => Err(unsupported(request)),
        }
    }

    fn route_create(
        &self,
        request: &Request,
        parent: Option<&ResourceName>,
        collection: Collection,
    ) -> Result<Value, BytebaseError> {
        let id = request.query_param(collection.id_param()).ok_or_else(|| {
            BytebaseError::invalid_argument(format!("missing '{}'", collection.id_param()))
        })?;
        match (collection, parent) {
            (Collection::Environments, None) => reply(&self.create_environment(id, body(request)?)?),
            (Collection::Instances, None) => {
                reply(&self.create_instance(id, body(request)?)?.redacted())
            }
            (Collection::Projects, None) => reply(&self.create_project(id, body(request)?)?),
            (Collection::Users, None) => reply(&self.create_user(id, body(request)?)?),
            (Collection::Groups, None) => reply(&self.create_group(id, body(request)?)?),
            (Collection::Roles, None) => reply(&self.create_role(id, body(request)?)?),
            (Collection::Risks, None) => reply(&self.create_risk(id, body(request)?)?),
            (Collection::DatabaseGroups, Some(project)) => {
                reply(&self.create_database_group(project, id, body(request)?)?)
            }
            _ => Err(unsupported(request)),
        }
    }

    fn route_update(&self, request: &Request, path: &str) -> Result<Value, BytebaseError> {
        if let Some(database) = catalog_database(path)? {
            return reply(&self.update_database_catalog(&database, body(request)?)?);
        }
        let name = ResourceName::parse(path)?;
        let mask = request
            .update_mask
            .as_ref()
            .ok_or_else(|| BytebaseError::invalid_argument("update mask is required"))?;
        let upsert = request.allow_missing;
        match name.collection() {
            Collection::Environments => {
                reply(&self.update(&name, &body::<EnvironmentPatch>(request)?, mask)?)
            }
            Collection::Instances => {
                reply(&self.update_instance(&name, &body(request)?, mask)?.redacted())
            }
            Collection::Databases => reply(&self.update_database(&name, &body(request)?, mask)?),
            Collection::Projects => {
                reply(&self.update(&name, &body::<ProjectPatch>(request)?, mask)?)
            }
            Collection::Users => reply(&self.update_user(&name, &body(request)?, mask)?),
            Collection::Groups => reply(&self.update_group(&name, &body(request)?, mask)?),
            Collection::Roles => reply(&self.update_role(&name, &body(request)?, mask)?),
            Collection::Risks => reply(&self.update(&name, &body::<RiskPatch>(request)?, mask)?),
            Collection::DatabaseGroups => {
                reply(&self.update_database_group(&name, &body(request)?, mask)?)
            }
            Collection::Policies => {
                reply(&self.upsert_policy(&name, body(request)?, mask, upsert)?)
            }
            Collection::Settings => {
                reply(&self.upsert_setting(&name, body(request)?, mask, upsert)?)
            }
            Collection::ReviewConfigs => {
                reply(&self.upsert_review_config(&name, body(request)?, mask, upsert)?)
            }
            Collection::Workspaces => Err(unsupported(request)),
        }
    }

    fn route_delete(&self, request: &Request, name: &ResourceName) -> Result<Value, BytebaseError> {
        match name.collection() {
            Collection::Environments => self.delete::<Environment>(name)?,
            Collection::Instances => self.delete::<Instance>(name)?,
            Collection::Projects => self.delete_project(name)?,
            Collection::Users => self.delete_user(name)?,
            Collection::Groups => self.delete::<Group>(name)?,
            Collection::Roles => self.delete_role(name)?,
            Collection::Policies => self.delete::<Policy>(name)?,
            Collection::ReviewConfigs => self.delete::<ReviewConfig>(name)?,
            Collection::Risks => self.delete::<Risk>(name)?,
            Collection::DatabaseGroups => self.delete::<DatabaseGroup>(name)?,
            Collection::Databases | Collection::Settings | Collection::Workspaces => {
                return Err(unsupported(request));
            }
        }
        Ok(empty())
    }

    fn route_custom(
        &self,
        request: &Request,
        custom: CustomVerb,
        path: &str,
    ) -> Result<Value, BytebaseError> {
        match custom {
            CustomVerb::Undelete => {
                let name = ResourceName::parse(path)?;
                match name.collection() {
                    Collection::Environments => reply(&self.undelete::<Environment>(&name)?),
                    Collection::Instances => reply(&self.undelete::<Instance>(&name)?.redacted()),
                    Collection::Projects => reply(&self.undelete::<Project>(&name)?),
                    Collection::Users => reply(&self.undelete::<User>(&name)?),
                    _ => Err(unsupported(request)),
                }
            }
            CustomVerb::Sync => {
                self.sync_instance(&ResourceName::parse(path)?)?;
                Ok(empty())
            }
            CustomVerb::GetIamPolicy => reply(&self.get_iam_policy(&ResourceName::parse(path)?)?),
            CustomVerb::SetIamPolicy => {
                reply(&self.set_iam_policy(&ResourceName::parse(path)?, body(request)?)?)
            }
            CustomVerb::ParseExpression if path == CEL_PATH => {
                let ParseExpressionRequest { expression } = body(request)?;
                reply(&cel::parse(&expression)?)
            }
            CustomVerb::BatchUpdate => match split_collection(path)? {
                (Some(instance), Collection::Databases) => {
                    let batch: BatchUpdateDatabasesRequest = body(request)?;
                    reply(&self.batch_update_databases(&instance, batch.requests)?)
                }
                _ => Err(unsupported(request)),
            },
            CustomVerb::ParseExpression => Err(unsupported(request)),
        }
    }
}

fn unsupported(request: &Request) -> BytebaseError {
    BytebaseError::invalid_argument(format!(
        "unsupported request: {} {}",
        request.verb, request.path
    ))
}

fn empty() -> Value {
    Value::Object(Map::new())
}

fn reply<T: Serialize + ?Sized>(value: &T) -> Result<Value, BytebaseError> {
    serde_json::to_value(value)
        .map_err(|e| BytebaseError::internal(format!("cannot encode response: {e}")))
}

/// `{"<collection>": [..], "nextPageToken": ".."}`; the token is omitted
/// on the last page.
fn items_reply<T: Serialize>(
    collection: Collection,
    items: &[T],
    next_page_token: &str,
) -> Result<Value, BytebaseError> {
    let mut body = Map::new();
    body.insert(collection.as_str().to_owned(), reply(items)?);
    if !next_page_token.is_empty() {
        body.insert(
            NEXT_PAGE_TOKEN.to_owned(),
            Value::String(next_page_token.to_owned()),
        );
    }
    Ok(Value::Object(body))
}

fn body<T: DeserializeOwned>(request: &Request) -> Result<T, BytebaseError> {
    let body = request
        .body
        .clone()
        .ok_or_else(|| BytebaseError::invalid_argument("request body is required"))?;
    serde_json::from_value(body)
        .map_err(|e| BytebaseError::invalid_argument(format!("invalid request body: {e}")))
}

/// The decoded filter and its raw form, which page tokens are bound to.
fn filter_param<F: DeserializeOwned + Default>(
    request: &Request,
) -> Result<(F, &str), BytebaseError> {
    match request.query_param("filter") {
        None => Ok((F::default(), "")),
        Some(raw) => serde_json::from_str(raw)
            .map(|filter| (filter, raw))
            .map_err(|e| BytebaseError::invalid_argument(format!("invalid filter: {e}"))),
    }
}

fn page_param(request: &Request) -> Result<PageRequest, BytebaseError> {
    let page_size = match request.query_param("pageSize") {
        None => 0,
        Some(raw) => raw.parse().map_err(|_| {
            BytebaseError::invalid_argument(format!("invalid page size '{raw}'"))
        })?,
    };
    Ok(PageRequest {
        page_size,
        page_token: request
            .query_param("pageToken")
            .unwrap_or_default()
            .to_owned(),
    })
}

/// `parent/collection` or a top-level `collection`.
fn split_collection(path: &str) -> Result<(Option<ResourceName>, Collection), BytebaseError> {
    let (parent, segment) = match path.rsplit_once('/') {
        Some((parent, segment)) => (Some(ResourceName::parse(parent)?), segment),
        None => (None, path),
    };
    let collection = Collection::from_segment(segment).ok_or_else(|| {
        BytebaseError::invalid_argument(format!("unknown collection '{segment}'"))
    })?;
    Ok((parent, collection))
}

/// `<database>/catalog`. A database literally named `catalog` has an even
/// number of segments and is left alone.
fn catalog_database(path: &str) -> Result<Option<ResourceName>, BytebaseError> {
    match path.rsplit_once('/') {
        Some((database, CATALOG_SUFFIX)) if path.split('/').count() % 2 == 1 => {
            ResourceName::parse(database).map(Some)
        }
        _ => Ok(None),
    }
}
