//! End-to-end tests: the SDK client talking to the static plugin.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytebase_sdk::models::{
    ApprovalRule, BackupPlanPolicy, BackupPlanSchedule, Binding, ColumnCatalog, Condition,
    DataSource, DatabaseCatalog, DatabaseGroupView, DatabasePatch, Engine, GroupMember,
    GroupMemberRole, GroupPatch, IamPolicy, Instance, InstancePatch, NewDatabaseGroup,
    NewEnvironment, NewGroup, NewInstance, NewProject, NewRisk, NewRole, NewUser, PolicyPayload,
    PolicyType, PolicyUpsert, ReviewConfigUpsert, RiskLevel, RiskPatch, RiskSource, RolePatch,
    RoleType, RuleLevel, SchemaCatalog, SettingName, SettingUpsert, SettingValue, SqlReviewRule,
    State, TableCatalog, UpdateDatabaseRequest, WorkspaceApprovalSetting,
    WorkspaceProfileSetting,
};
use bytebase_sdk::{
    BytebaseApi, BytebaseError, CallContext, Client, Code, DatabaseFilter, ErrorKind, FieldMask,
    InstanceFilter, LabelSelector, PageRequest, ProjectFilter, Request, ResourceName,
    StateFilter, Transport, UserFilter, Verb,
};
use serde_json::json;
use figment::Figment;
use figment::providers::{Format, Yaml};
use futures_util::TryStreamExt;
use static_bytebase_plugin::{Service, StaticPluginConfig};

const SEED: &str = r#"
page_size_limit: 2
instances:
  - id: mysql-1
    title: MySQL 1
    engine: MYSQL
    environment: prod
    databases:
      - name: orders
        labels:
          team: billing
      - name: accounts
        labels:
          team: identity
  - id: pg-1
    title: Postgres 1
    engine: POSTGRES
    environment: test
    databases:
      - name: orders
        labels:
          team: billing
"#;

fn service() -> Arc<Service> {
    let config: StaticPluginConfig = Figment::from(Yaml::string(SEED)).extract().unwrap();
    Arc::new(Service::from_config(&config).unwrap())
}

fn client() -> Client<Arc<Service>> {
    service().client().unwrap()
}

fn ctx() -> CallContext {
    CallContext::background()
}

fn mask(paths: &[&str]) -> FieldMask {
    FieldMask::from_paths(paths.iter().copied()).unwrap()
}

#[tokio::test]
async fn duplicate_project_id_is_rejected() {
    let client = client();
    let created = client
        .create_project(&ctx(), "proj-a", NewProject::new("Alpha"))
        .await
        .unwrap();
    assert_eq!(created.name, ResourceName::project("proj-a").unwrap());
    assert_eq!(created.state, State::Active);

    let err = client
        .create_project(&ctx(), "proj-a", NewProject::new("Alpha again"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn instance_title_update_leaves_other_fields() {
    let client = client();
    let name = ResourceName::instance("mysql-1").unwrap();
    let patch = InstancePatch {
        title: Some("MySQL primary".to_owned()),
        external_link: Some("https://ignored.example.com".to_owned()),
        ..InstancePatch::default()
    };
    let updated = client
        .update_instance(&ctx(), &name, patch, mask(&["title"]))
        .await
        .unwrap();
    assert_eq!(updated.title, "MySQL primary");
    assert!(updated.external_link.is_empty());
    assert_eq!(updated.engine, Engine::Mysql);

    let fetched = client.get_instance(&ctx(), &name).await.unwrap();
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn backup_policy_upsert_on_project() {
    let client = client();
    client
        .create_project(&ctx(), "proj-a", NewProject::new("Alpha"))
        .await
        .unwrap();
    let name = ResourceName::policy(Some(&ResourceName::project("proj-a").unwrap()), "backup")
        .unwrap();
    let upsert = PolicyUpsert::new(PolicyPayload::BackupPlan(BackupPlanPolicy {
        schedule: BackupPlanSchedule::Weekly,
        retention_duration: "168h".to_owned(),
    }));

    let created = client
        .upsert_policy(&ctx(), &name, upsert, FieldMask::new())
        .await
        .unwrap();
    assert_eq!(created.policy_type(), PolicyType::BackupPlan);

    let fetched = client.get_policy(&ctx(), &name).await.unwrap();
    let PolicyPayload::BackupPlan(plan) = fetched.payload else {
        panic!("expected a backup plan payload");
    };
    assert_eq!(plan.schedule, BackupPlanSchedule::Weekly);
    assert_eq!(plan.retention_duration, "168h");
}

#[tokio::test]
async fn database_filter_combines_labels_and_engine() {
    let client = client();
    let filter = DatabaseFilter {
        labels: vec![LabelSelector::new("team", "billing")],
        engines: [Engine::Mysql].into_iter().collect(),
        ..DatabaseFilter::default()
    };
    let page = client
        .list_databases(
            &ctx(),
            &ResourceName::all_instances(),
            filter,
            PageRequest::first(10),
        )
        .await
        .unwrap();
    let names: Vec<String> = page.items.iter().map(|db| db.name.to_string()).collect();
    assert_eq!(names, vec!["instances/mysql-1/databases/orders"]);
}

#[tokio::test]
async fn deleted_project_can_be_restored_once() {
    let client = client();
    let name = client
        .create_project(&ctx(), "proj-a", NewProject::new("Alpha"))
        .await
        .unwrap()
        .name;
    client.delete_project(&ctx(), &name).await.unwrap();

    let active = client
        .list_projects(&ctx(), ProjectFilter::default(), PageRequest::first(10))
        .await
        .unwrap();
    assert!(active.items.iter().all(|p| p.name != name));

    let deleted = client
        .list_projects(
            &ctx(),
            ProjectFilter {
                state: StateFilter::Deleted,
                ..ProjectFilter::default()
            },
            PageRequest::first(10),
        )
        .await
        .unwrap();
    assert_eq!(deleted.items.len(), 1);
    assert_eq!(deleted.items[0].state, State::Deleted);

    let restored = client.undelete_project(&ctx(), &name).await.unwrap();
    assert_eq!(restored.state, State::Active);
    let err = client.undelete_project(&ctx(), &name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

#[tokio::test]
async fn expressions_are_parsed_or_rejected() {
    let client = client();
    client
        .parse_expression(&ctx(), r#"resource.environment_id == "prod""#)
        .await
        .unwrap();

    let err = client
        .parse_expression(&ctx(), "resource.")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn streams_visit_every_project_once() {
    let client = client();
    for id in ["p-1", "p-2", "p-3", "p-4"] {
        client
            .create_project(&ctx(), id, NewProject::new(id))
            .await
            .unwrap();
    }

    let first = client
        .list_projects(&ctx(), ProjectFilter::default(), PageRequest::first(0))
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);
    assert!(!first.is_last());

    let ids: Vec<String> = client
        .project_stream(&ctx(), ProjectFilter::default())
        .map_ok(|p| p.name.id().to_owned())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(ids, vec!["default", "p-1", "p-2", "p-3", "p-4"]);
}

#[tokio::test]
async fn page_token_is_bound_to_its_filter() {
    let client = client();
    for id in ["p-1", "p-2", "p-3"] {
        client
            .create_project(&ctx(), id, NewProject::new(id))
            .await
            .unwrap();
    }
    let filter = ProjectFilter {
        query: "p-".to_owned(),
        ..ProjectFilter::default()
    };
    let first = client
        .list_projects(&ctx(), filter, PageRequest::first(1))
        .await
        .unwrap();
    let err = client
        .list_projects(
            &ctx(),
            ProjectFilter::default(),
            PageRequest::first(1).next(first.next_page_token),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn instance_filters_are_conjunctive() {
    let client = client();
    let filter = InstanceFilter {
        environment: Some(ResourceName::environment("prod").unwrap()),
        engines: [Engine::Postgres].into_iter().collect(),
        ..InstanceFilter::default()
    };
    let page = client
        .list_instances(&ctx(), filter, PageRequest::first(10))
        .await
        .unwrap();
    assert!(page.items.is_empty());

    let filter = InstanceFilter {
        query: "mysql".to_owned(),
        ..InstanceFilter::default()
    };
    let page = client
        .list_instances(&ctx(), filter, PageRequest::first(10))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name.id(), "mysql-1");
}

#[tokio::test]
async fn batch_update_reports_each_entry() {
    let client = client();
    client
        .create_project(&ctx(), "proj-a", NewProject::new("Alpha"))
        .await
        .unwrap();
    let patch = DatabasePatch {
        project: Some(ResourceName::project("proj-a").unwrap()),
        ..DatabasePatch::default()
    };
    let requests = vec![
        UpdateDatabaseRequest {
            name: ResourceName::database("mysql-1", "orders").unwrap(),
            patch: patch.clone(),
            update_mask: mask(&["project"]),
        },
        UpdateDatabaseRequest {
            name: ResourceName::database("mysql-1", "missing").unwrap(),
            patch,
            update_mask: mask(&["project"]),
        },
    ];

    let outcomes = client
        .batch_update_databases(&ctx(), &ResourceName::instance("mysql-1").unwrap(), requests)
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    let moved = outcomes[0].result.as_ref().unwrap();
    assert_eq!(moved.project, ResourceName::project("proj-a").unwrap());
    let err = outcomes[1].result.as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn project_with_databases_cannot_be_deleted() {
    let client = client();
    let project = client
        .create_project(&ctx(), "proj-a", NewProject::new("Alpha"))
        .await
        .unwrap()
        .name;
    let patch = DatabasePatch {
        project: Some(project.clone()),
        ..DatabasePatch::default()
    };
    client
        .update_database(
            &ctx(),
            &ResourceName::database("pg-1", "orders").unwrap(),
            patch,
            mask(&["project"]),
        )
        .await
        .unwrap();

    let err = client.delete_project(&ctx(), &project).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

#[tokio::test]
async fn database_group_full_view_partitions_project_databases() {
    let client = client();
    let project = client
        .create_project(&ctx(), "proj-a", NewProject::new("Alpha"))
        .await
        .unwrap()
        .name;
    let requests = ["mysql-1", "pg-1"]
        .into_iter()
        .map(|instance| UpdateDatabaseRequest {
            name: ResourceName::database(instance, "orders").unwrap(),
            patch: DatabasePatch {
                project: Some(project.clone()),
                ..DatabasePatch::default()
            },
            update_mask: mask(&["project"]),
        })
        .collect();
    let outcomes = client
        .batch_update_databases(&ctx(), &ResourceName::all_instances(), requests)
        .await
        .unwrap();
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let group = client
        .create_database_group(
            &ctx(),
            &project,
            "prod-orders",
            NewDatabaseGroup {
                title: "Prod orders".to_owned(),
                database_expr: Condition::new(r#"resource.environment_id == "prod""#),
            },
        )
        .await
        .unwrap();

    let basic = client
        .get_database_group(&ctx(), &group.name, DatabaseGroupView::Basic)
        .await
        .unwrap();
    assert!(basic.matched_databases.is_empty());

    let full = client
        .get_database_group(&ctx(), &group.name, DatabaseGroupView::Full)
        .await
        .unwrap();
    let matched: Vec<String> = full
        .matched_databases
        .iter()
        .map(|db| db.name.to_string())
        .collect();
    let unmatched: Vec<String> = full
        .unmatched_databases
        .iter()
        .map(|db| db.name.to_string())
        .collect();
    assert_eq!(matched, vec!["instances/mysql-1/databases/orders"]);
    assert_eq!(unmatched, vec!["instances/pg-1/databases/orders"]);
}

#[tokio::test]
async fn users_are_filtered_by_email_and_project_membership() {
    let client = client();
    client
        .create_user(
            &ctx(),
            "alice",
            NewUser {
                email: "alice@example.com".to_owned(),
                title: "Alice".to_owned(),
                ..NewUser::default()
            },
        )
        .await
        .unwrap();
    let project = client
        .create_project(&ctx(), "proj-a", NewProject::new("Alpha"))
        .await
        .unwrap()
        .name;

    let by_email = client
        .list_users(
            &ctx(),
            UserFilter {
                email: Some("alice@example.com".to_owned()),
                ..UserFilter::default()
            },
            PageRequest::first(10),
        )
        .await
        .unwrap();
    assert_eq!(by_email.items.len(), 1);
    assert_eq!(by_email.items[0].name.id(), "alice");

    // only the creating caller is bound on a fresh project
    let members = client
        .list_users(
            &ctx(),
            UserFilter {
                project: Some(project),
                ..UserFilter::default()
            },
            PageRequest::first(10),
        )
        .await
        .unwrap();
    let ids: Vec<&str> = members.items.iter().map(|u| u.name.id()).collect();
    assert_eq!(ids, vec!["admin"]);
}

#[tokio::test]
async fn labels_update_replaces_the_map() {
    let client = client();
    let name = ResourceName::database("mysql-1", "accounts").unwrap();
    let patch = DatabasePatch {
        labels: Some(BTreeMap::from([("tier".to_owned(), "gold".to_owned())])),
        ..DatabasePatch::default()
    };
    let updated = client
        .update_database(&ctx(), &name, patch, mask(&["labels"]))
        .await
        .unwrap();
    assert_eq!(updated.labels.len(), 1);
    assert_eq!(updated.labels["tier"], "gold");
    assert_eq!(updated.project, ResourceName::default_project());
}

#[tokio::test]
async fn cancelled_context_never_reaches_the_workspace() {
    let client = client();
    let ctx = ctx();
    ctx.cancel();
    let err = client
        .create_project(&ctx, "proj-a", NewProject::new("Alpha"))
        .await
        .unwrap_err();
    assert!(matches!(err, BytebaseError::Cancelled));

    let err = client
        .get_project(&CallContext::background(), &ResourceName::project("proj-a").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

fn new_user(email: &str, title: &str) -> NewUser {
    NewUser {
        email: email.to_owned(),
        title: title.to_owned(),
        ..NewUser::default()
    }
}

fn role(id: &str) -> ResourceName {
    ResourceName::role(id).unwrap()
}

fn binding(role_id: &str, members: &[&str]) -> Binding {
    Binding {
        role: role(role_id),
        members: members.iter().map(|m| (*m).to_owned()).collect(),
        condition: None,
    }
}

#[tokio::test]
async fn wildcard_instance_id_cannot_be_created() {
    let service = service();
    let client = service.client().unwrap();
    let err = client
        .create_instance(&ctx(), "-", NewInstance::new("All", Engine::Mysql))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let request = Request::new(Verb::Create, "instances")
        .with_query("instanceId", "-")
        .with_body(json!({ "title": "All", "engine": "MYSQL" }));
    let status = service.send(request).await.unwrap_err();
    assert_eq!(status.code, Code::InvalidArgument);

    let page = client
        .list_instances(&ctx(), InstanceFilter::default(), PageRequest::first(10))
        .await
        .unwrap();
    assert!(page.items.iter().all(|i| i.name != ResourceName::all_instances()));
}

#[tokio::test]
async fn data_source_secrets_are_not_returned() {
    let service = service();
    let client = service.client().unwrap();
    let mut new = NewInstance::new("MySQL 2", Engine::Mysql);
    new.data_sources = vec![DataSource {
        id: "admin".to_owned(),
        username: "root".to_owned(),
        password: "s3cret".into(),
        ssl_key: "private-key".into(),
        host: "10.0.0.2".to_owned(),
        port: "3306".to_owned(),
        ..DataSource::default()
    }];
    let created = client.create_instance(&ctx(), "mysql-2", new).await.unwrap();
    assert!(created.data_sources[0].password.is_empty());
    assert!(created.data_sources[0].ssl_key.is_empty());
    assert_eq!(created.data_sources[0].username, "root");

    let fetched = client.get_instance(&ctx(), &created.name).await.unwrap();
    assert!(fetched.data_sources[0].password.is_empty());

    let raw = service
        .send(Request::new(Verb::List, "instances").with_query("pageSize", "10"))
        .await
        .unwrap();
    let listed = raw["instances"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["name"] == "instances/mysql-2")
        .unwrap();
    assert!(listed["dataSources"][0].get("password").is_none());

    // still stored for the workspace's own use
    let stored = service.get::<Instance>(&created.name).unwrap();
    assert_eq!(stored.data_sources[0].password.expose(), "s3cret");
}

#[tokio::test]
async fn setting_upsert_creates_then_replaces() {
    let service = service();
    let client = service.client().unwrap();
    let err = client
        .get_setting(&ctx(), SettingName::WorkspaceProfile)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let profile = |url: &str| SettingUpsert {
        value: SettingValue::WorkspaceProfile(WorkspaceProfileSetting {
            external_url: url.to_owned(),
            ..WorkspaceProfileSetting::default()
        }),
    };
    let created = client
        .upsert_setting(&ctx(), profile("https://bb.example.com"), FieldMask::new())
        .await
        .unwrap();
    assert_eq!(
        created.name,
        ResourceName::setting(SettingName::WorkspaceProfile)
    );
    let replaced = client
        .upsert_setting(&ctx(), profile("https://console.example.com"), FieldMask::new())
        .await
        .unwrap();
    let SettingValue::WorkspaceProfile(value) = replaced.value else {
        panic!("expected a workspace profile value");
    };
    assert_eq!(value.external_url, "https://console.example.com");
    assert_eq!(client.list_settings(&ctx()).await.unwrap().len(), 1);

    let request = Request::new(Verb::Update, "settings/bb.workspace.approval")
        .with_body(json!({ "value": { "workspaceProfileSettingValue": {} } }))
        .with_mask(mask(&["value"]))
        .allow_missing(true);
    let status = service.send(request).await.unwrap_err();
    assert_eq!(status.code, Code::InvalidArgument);

    let broken = SettingUpsert {
        value: SettingValue::WorkspaceApproval(WorkspaceApprovalSetting {
            rules: vec![ApprovalRule {
                condition: Condition::new("source == "),
                ..ApprovalRule::default()
            }],
        }),
    };
    let err = client
        .upsert_setting(&ctx(), broken, FieldMask::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BytebaseError::InvalidExpression { .. }));
}

#[tokio::test]
async fn review_config_upsert_and_delete() {
    let client = client();
    let name = ResourceName::review_config("sql-review").unwrap();
    let rule = SqlReviewRule {
        kind: "column.no-null".to_owned(),
        level: RuleLevel::Error,
        payload: String::new(),
        engine: Engine::Mysql,
        comment: String::new(),
    };
    let created = client
        .upsert_review_config(
            &ctx(),
            &name,
            ReviewConfigUpsert {
                rules: vec![rule],
                title: Some("SQL review".to_owned()),
                enabled: Some(true),
                resources: Some(vec![ResourceName::environment("prod").unwrap()]),
            },
            mask(&["title", "enabled", "resources"]),
        )
        .await
        .unwrap();
    assert_eq!(created.name, name);
    assert!(created.enabled);
    assert_eq!(created.rules.len(), 1);

    let renamed = client
        .upsert_review_config(
            &ctx(),
            &name,
            ReviewConfigUpsert {
                title: Some("Strict review".to_owned()),
                ..ReviewConfigUpsert::default()
            },
            mask(&["title"]),
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "Strict review");
    assert!(renamed.rules.is_empty());
    assert!(renamed.enabled);
    assert_eq!(renamed.resources, created.resources);

    let err = client
        .upsert_review_config(
            &ctx(),
            &name,
            ReviewConfigUpsert {
                resources: Some(vec![ResourceName::environment("staging").unwrap()]),
                ..ReviewConfigUpsert::default()
            },
            mask(&["resources"]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    client.delete_review_config(&ctx(), &name).await.unwrap();
    let err = client.get_review_config(&ctx(), &name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = client.delete_review_config(&ctx(), &name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn risk_create_and_update() {
    let client = client();
    let new = NewRisk {
        source: RiskSource::Ddl,
        title: "Prod DDL".to_owned(),
        level: RiskLevel::High,
        active: true,
        condition: Condition::new(r#"environment_id == "prod""#),
    };
    let created = client.create_risk(&ctx(), "prod-ddl", new.clone()).await.unwrap();
    assert_eq!(created.level, RiskLevel::High);
    assert!(created.create_time.is_some());

    let err = client.create_risk(&ctx(), "prod-ddl", new.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    let untitled = NewRisk {
        title: "  ".to_owned(),
        ..new.clone()
    };
    let err = client.create_risk(&ctx(), "untitled", untitled).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let broken = NewRisk {
        condition: Condition::new("environment_id =="),
        ..new
    };
    let err = client.create_risk(&ctx(), "broken", broken).await.unwrap_err();
    assert!(matches!(err, BytebaseError::InvalidExpression { .. }));

    let patch = RiskPatch {
        level: Some(RiskLevel::Moderate),
        title: Some("ignored".to_owned()),
        ..RiskPatch::default()
    };
    let updated = client
        .update_risk(&ctx(), &created.name, patch, mask(&["level"]))
        .await
        .unwrap();
    assert_eq!(updated.level, RiskLevel::Moderate);
    assert_eq!(updated.title, "Prod DDL");

    let err = client
        .update_risk(
            &ctx(),
            &ResourceName::risk("missing").unwrap(),
            RiskPatch {
                active: Some(false),
                ..RiskPatch::default()
            },
            mask(&["active"]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn group_members_must_be_users() {
    let client = client();
    let alice = client
        .create_user(&ctx(), "alice", new_user("alice@example.com", "Alice"))
        .await
        .unwrap();
    let owner = GroupMember {
        member: ResourceName::user("admin").unwrap(),
        role: GroupMemberRole::Owner,
    };
    let created = client
        .create_group(
            &ctx(),
            "dba@example.com",
            NewGroup {
                title: "DBAs".to_owned(),
                members: vec![owner.clone()],
                ..NewGroup::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created.name, ResourceName::group("dba@example.com").unwrap());
    assert_eq!(created.members, vec![owner.clone()]);

    let ghost = GroupMember {
        member: ResourceName::user("ghost").unwrap(),
        role: GroupMemberRole::Member,
    };
    let err = client
        .create_group(
            &ctx(),
            "ops@example.com",
            NewGroup {
                title: "Ops".to_owned(),
                members: vec![ghost.clone()],
                ..NewGroup::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let joined = GroupMember {
        member: alice.name,
        role: GroupMemberRole::Member,
    };
    let updated = client
        .update_group(
            &ctx(),
            &created.name,
            GroupPatch {
                members: Some(vec![owner.clone(), joined]),
                ..GroupPatch::default()
            },
            mask(&["members"]),
        )
        .await
        .unwrap();
    assert_eq!(updated.members.len(), 2);
    assert_eq!(updated.title, "DBAs");

    let err = client
        .update_group(
            &ctx(),
            &created.name,
            GroupPatch {
                members: Some(vec![owner, ghost]),
                ..GroupPatch::default()
            },
            mask(&["members"]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let fetched = client.get_group(&ctx(), &created.name).await.unwrap();
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn built_in_and_bound_roles_are_protected() {
    let client = client();
    let auditor = client
        .create_role(
            &ctx(),
            "auditor",
            NewRole {
                title: "Auditor".to_owned(),
                permissions: vec!["bb.projects.get".to_owned()],
                ..NewRole::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(auditor.kind, RoleType::Custom);
    let err = client
        .create_role(
            &ctx(),
            "auditor",
            NewRole {
                title: "Auditor".to_owned(),
                ..NewRole::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let rename = RolePatch {
        title: Some("Renamed".to_owned()),
        ..RolePatch::default()
    };
    let err = client
        .update_role(&ctx(), &role("workspace-dba"), rename, mask(&["title"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    let err = client
        .delete_role(&ctx(), &role("project-owner"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let policy = IamPolicy {
        bindings: vec![
            binding("workspace-admin", &["user:admin@example.com"]),
            binding("auditor", &["allUsers"]),
        ],
    };
    client.set_workspace_iam_policy(&ctx(), policy).await.unwrap();
    let err = client.delete_role(&ctx(), &auditor.name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let policy = IamPolicy {
        bindings: vec![binding("workspace-admin", &["user:admin@example.com"])],
    };
    client.set_workspace_iam_policy(&ctx(), policy).await.unwrap();
    client.delete_role(&ctx(), &auditor.name).await.unwrap();
    let err = client.get_role(&ctx(), &auditor.name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn workspace_iam_set_replaces_every_binding() {
    let client = client();
    let seeded = client.get_workspace_iam_policy(&ctx()).await.unwrap();
    assert_eq!(
        seeded.bindings,
        vec![binding("workspace-admin", &["user:admin@example.com"])]
    );

    let first = IamPolicy {
        bindings: vec![
            binding("workspace-admin", &["user:admin@example.com"]),
            binding("workspace-dba", &["user:alice@example.com"]),
        ],
    };
    client.set_workspace_iam_policy(&ctx(), first).await.unwrap();
    let second = IamPolicy {
        bindings: vec![
            binding("workspace-admin", &["user:admin@example.com"]),
            binding("workspace-member", &["allUsers"]),
        ],
    };
    let stored = client
        .set_workspace_iam_policy(&ctx(), second.clone())
        .await
        .unwrap();
    assert_eq!(stored, second);
    assert_eq!(client.get_workspace_iam_policy(&ctx()).await.unwrap(), second);

    let unknown_role = IamPolicy {
        bindings: vec![binding("ghost", &["allUsers"])],
    };
    let err = client
        .set_workspace_iam_policy(&ctx(), unknown_role)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let bad_member = IamPolicy {
        bindings: vec![binding("workspace-member", &["alice"])],
    };
    let err = client
        .set_workspace_iam_policy(&ctx(), bad_member)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(client.get_workspace_iam_policy(&ctx()).await.unwrap(), second);
}

#[tokio::test]
async fn deleted_user_can_be_restored_once() {
    let client = client();
    let alice = client
        .create_user(&ctx(), "alice", new_user("alice@example.com", "Alice"))
        .await
        .unwrap();
    client.delete_user(&ctx(), &alice.name).await.unwrap();
    assert_eq!(
        client.get_user(&ctx(), &alice.name).await.unwrap().state,
        State::Deleted
    );

    let restored = client.undelete_user(&ctx(), &alice.name).await.unwrap();
    assert_eq!(restored.state, State::Active);
    assert_eq!(restored.email, "alice@example.com");
    let err = client.undelete_user(&ctx(), &alice.name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let err = client
        .delete_user(&ctx(), &ResourceName::user("admin").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

#[tokio::test]
async fn database_catalog_starts_empty_and_is_replaced() {
    let client = client();
    let db = ResourceName::database("mysql-1", "orders").unwrap();
    let empty = client.get_database_catalog(&ctx(), &db).await.unwrap();
    assert_eq!(empty.name, db.catalog_path());
    assert!(empty.schemas.is_empty());

    let catalog = DatabaseCatalog {
        name: db.catalog_path(),
        schemas: vec![SchemaCatalog {
            name: String::new(),
            tables: vec![TableCatalog {
                name: "customers".to_owned(),
                columns: vec![ColumnCatalog {
                    name: "email".to_owned(),
                    semantic_type: "bb.email".to_owned(),
                    ..ColumnCatalog::default()
                }],
                classification: "1-1".to_owned(),
            }],
        }],
    };
    let stored = client
        .update_database_catalog(&ctx(), catalog.clone())
        .await
        .unwrap();
    assert_eq!(stored, catalog);
    assert_eq!(client.get_database_catalog(&ctx(), &db).await.unwrap(), catalog);
    let other = ResourceName::database("pg-1", "orders").unwrap();
    assert!(
        client
            .get_database_catalog(&ctx(), &other)
            .await
            .unwrap()
            .schemas
            .is_empty()
    );

    let missing = ResourceName::database("mysql-1", "ghost").unwrap();
    let err = client
        .get_database_catalog(&ctx(), &missing)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let misnamed = DatabaseCatalog {
        name: "instances/mysql-1".to_owned(),
        ..catalog
    };
    let err = client
        .update_database_catalog(&ctx(), misnamed)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn deleted_environment_is_hidden_until_restored() {
    let client = client();
    let staging = client
        .create_environment(
            &ctx(),
            "staging",
            NewEnvironment {
                title: "Staging".to_owned(),
                order: 2,
                ..NewEnvironment::default()
            },
        )
        .await
        .unwrap();
    client.delete_environment(&ctx(), &staging.name).await.unwrap();

    let active = client.list_environments(&ctx(), false).await.unwrap();
    assert!(active.iter().all(|env| env.name != staging.name));
    let all = client.list_environments(&ctx(), true).await.unwrap();
    let deleted = all.iter().find(|env| env.name == staging.name).unwrap();
    assert_eq!(deleted.state, State::Deleted);

    let err = client
        .delete_environment(&ctx(), &staging.name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    let mut new = NewInstance::new("Staging MySQL", Engine::Mysql);
    new.environment = Some(staging.name.clone());
    let err = client
        .create_instance(&ctx(), "mysql-staging", new)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let restored = client
        .undelete_environment(&ctx(), &staging.name)
        .await
        .unwrap();
    assert_eq!(restored.state, State::Active);
    assert_eq!(restored.order, 2);
    let err = client
        .undelete_environment(&ctx(), &staging.name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    let err = client
        .undelete_environment(&ctx(), &ResourceName::environment("qa").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
