#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for `Client` over a recording transport

mod common;

use std::time::Duration;

use bytebase_sdk::cel;
use bytebase_sdk::models::{
    DatabaseGroupView, DatabasePatch, DeploymentApprovalPolicy, Engine, EnvironmentPatch,
    NewInstance, NewProject, PolicyPayload, PolicyUpsert, State, UpdateDatabaseRequest,
};
use bytebase_sdk::{
    BytebaseApi, BytebaseError, CallContext, Client, ClientConfig, Code, CustomVerb, ErrorKind, FieldMask,
    PageRequest, ProjectFilter, ResourceName, StaticIdentity, Status, Verb,
};
use common::{Reply, client, database_json, environment_json, project_json};
use futures_util::StreamExt;
use serde_json::json;
use url::Url;

// =============================================================================
// Request shapes
// =============================================================================

#[tokio::test]
async fn get_sends_resource_path_and_decodes() {
    let (client, transport) = client();
    transport.reply_ok(environment_json("prod", 2));

    let env = client
        .get_environment(&CallContext::background(), &ResourceName::environment("prod").unwrap())
        .await
        .unwrap();

    assert_eq!(env.title, "prod");
    assert_eq!(env.order, 2);
    let req = transport.last();
    assert_eq!(req.verb, Verb::Get);
    assert_eq!(req.path, "/v1/environments/prod");
    assert!(req.body.is_none());
}

#[tokio::test]
async fn environments_are_sorted_by_order_then_name() {
    let (client, transport) = client();
    transport.reply_ok(json!({
        "environments": [
            environment_json("prod", 2),
            environment_json("test", 1),
            environment_json("dev", 1),
        ]
    }));

    let envs = client
        .list_environments(&CallContext::background(), true)
        .await
        .unwrap();

    let ids: Vec<&str> = envs.iter().map(|e| e.name.id()).collect();
    assert_eq!(ids, vec!["dev", "test", "prod"]);
    assert_eq!(transport.last().query_param("showDeleted"), Some("true"));
}

#[tokio::test]
async fn create_sends_id_as_query_parameter() {
    let (client, transport) = client();
    transport.reply_ok(project_json("proj-a"));

    let project = client
        .create_project(&CallContext::background(), "proj-a", NewProject::new("proj-a"))
        .await
        .unwrap();

    assert_eq!(project.name, ResourceName::project("proj-a").unwrap());
    let req = transport.last();
    assert_eq!(req.verb, Verb::Create);
    assert_eq!(req.path, "/v1/projects");
    assert_eq!(req.query_param("projectId"), Some("proj-a"));
    assert_eq!(req.body.unwrap()["title"], "proj-a");
}

#[tokio::test]
async fn update_carries_mask_into_url() {
    let (client, transport) = client();
    transport.reply_ok(environment_json("prod", 5));

    let patch = EnvironmentPatch {
        order: Some(5),
        ..EnvironmentPatch::default()
    };
    client
        .update_environment(
            &CallContext::background(),
            &ResourceName::environment("prod").unwrap(),
            patch,
            FieldMask::from_paths(["order"]).unwrap(),
        )
        .await
        .unwrap();

    let req = transport.last();
    assert_eq!(req.verb, Verb::Update);
    let url = req
        .url(&Url::parse("https://bb.example.com").unwrap())
        .unwrap();
    assert_eq!(
        url.as_str(),
        "https://bb.example.com/v1/environments/prod?updateMask=order"
    );
}

#[tokio::test]
async fn upsert_adds_payload_path_and_allows_missing() {
    let (client, transport) = client();
    let name = ResourceName::policy(Some(&ResourceName::environment("prod").unwrap()), "approval")
        .unwrap();
    transport.reply_ok(json!({
        "name": name.to_string(),
        "type": "DEPLOYMENT_APPROVAL",
        "deploymentApprovalPolicy": {},
    }));

    let upsert = PolicyUpsert {
        enforce: Some(true),
        ..PolicyUpsert::new(PolicyPayload::DeploymentApproval(
            DeploymentApprovalPolicy::default(),
        ))
    };
    client
        .upsert_policy(
            &CallContext::background(),
            &name,
            upsert,
            FieldMask::from_paths(["enforce"]).unwrap(),
        )
        .await
        .unwrap();

    let req = transport.last();
    assert!(req.allow_missing);
    let mask = req.update_mask.unwrap();
    assert!(mask.contains("enforce"));
    assert!(mask.contains("payload"));
}

#[tokio::test]
async fn custom_verbs_address_the_resource() {
    let (client, transport) = client();
    let ctx = CallContext::background();

    transport.reply_ok(project_json("proj-a"));
    client
        .undelete_project(&ctx, &ResourceName::project("proj-a").unwrap())
        .await
        .unwrap();
    assert_eq!(transport.last().path, "/v1/projects/proj-a:undelete");

    client
        .sync_instance_schema(&ctx, &ResourceName::instance("i1").unwrap())
        .await
        .unwrap();
    let req = transport.last();
    assert_eq!(req.verb, Verb::Custom(CustomVerb::Sync));
    assert_eq!(req.path, "/v1/instances/i1:sync");

    transport.reply_ok(json!({ "bindings": [] }));
    client.get_workspace_iam_policy(&ctx).await.unwrap();
    assert_eq!(transport.last().path, "/v1/workspaces/-:getIamPolicy");
}

#[tokio::test]
async fn database_group_view_is_sent_as_query() {
    let (client, transport) = client();
    let name = ResourceName::database_group("proj-a", "all-prod").unwrap();
    transport.reply_ok(json!({
        "name": name.to_string(),
        "title": "All prod",
        "databaseExpr": { "expression": "resource.environment_id == \"prod\"" },
    }));

    client
        .get_database_group(&CallContext::background(), &name, DatabaseGroupView::Full)
        .await
        .unwrap();

    assert_eq!(transport.last().query_param("view"), Some("FULL"));
}

// =============================================================================
// Local validation
// =============================================================================

#[tokio::test]
async fn wrong_collection_is_rejected_without_sending() {
    let (client, transport) = client();
    let err = client
        .get_instance(&CallContext::background(), &ResourceName::project("proj-a").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn invalid_create_id_is_rejected_without_sending() {
    let (client, transport) = client();
    let err = client
        .create_project(&CallContext::background(), "Proj_A", NewProject::new("A"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn invalid_payload_is_rejected_without_sending() {
    let (client, transport) = client();
    let err = client
        .create_instance(&CallContext::background(), "i1", NewInstance::new("", Engine::Postgres))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn empty_and_unknown_masks_are_rejected() {
    let (client, transport) = client();
    let ctx = CallContext::background();
    let name = ResourceName::environment("prod").unwrap();
    let patch = EnvironmentPatch {
        title: Some("Production".to_owned()),
        ..EnvironmentPatch::default()
    };

    let err = client
        .update_environment(&ctx, &name, patch.clone(), FieldMask::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = client
        .update_environment(&ctx, &name, patch, FieldMask::from_paths(["colour"]).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn bad_expression_never_reaches_the_server() {
    let (client, transport) = client();
    let err = client
        .parse_expression(&CallContext::background(), "resource.labels[")
        .await
        .unwrap_err();
    assert!(matches!(err, BytebaseError::InvalidExpression { .. }));
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn good_expression_is_sent_and_decoded() {
    let (client, transport) = client();
    let source = "resource.environment_id == \"prod\"";
    let expected = cel::parse(source).unwrap();
    transport.reply_ok(serde_json::to_value(&expected).unwrap());

    let expr = client
        .parse_expression(&CallContext::background(), source)
        .await
        .unwrap();

    assert_eq!(expr, expected);
    let req = transport.last();
    assert_eq!(req.path, "/v1/cel:parseExpression");
    assert_eq!(req.body.unwrap()["expression"], source);
}

// =============================================================================
// Errors, cancellation and deadlines
// =============================================================================

#[tokio::test]
async fn transport_status_maps_to_error_kind() {
    let (client, transport) = client();
    transport.reply(Reply::Err(Status::new(Code::NotFound, "no such project")));

    let err = client
        .get_project(&CallContext::background(), &ResourceName::project("gone").unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("no such project"));
}

#[tokio::test]
async fn undecodable_response_is_internal() {
    let (client, transport) = client();
    transport.reply_ok(json!({ "name": 7 }));

    let err = client
        .get_project(&CallContext::background(), &ResourceName::project("proj-a").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn cancelled_context_sends_nothing() {
    let (client, transport) = client();
    let ctx = CallContext::background();
    ctx.cancel();

    let err = client.list_settings(&ctx).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn cancellation_aborts_an_inflight_call() {
    let (client, transport) = client();
    transport.reply(Reply::Hang);
    let ctx = CallContext::background();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = client.list_roles(&ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(transport.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn context_deadline_bounds_the_call() {
    let (client, transport) = client();
    transport.reply(Reply::Hang);
    let ctx = CallContext::background().with_timeout(Duration::from_secs(2));

    let err = client.list_risks(&ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_applies_without_context_deadline() {
    let (client, transport) = client();
    let client = client.with_config(ClientConfig {
        request_timeout: Some(Duration::from_secs(1)),
        ..ClientConfig::default()
    });
    transport.reply(Reply::Hang);

    let err = client
        .list_groups(&CallContext::background())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
}

#[tokio::test(start_paused = true)]
async fn expired_deadline_sends_nothing() {
    let (client, transport) = client();
    let ctx = CallContext::background().with_timeout(Duration::from_secs(1));
    tokio::time::advance(Duration::from_secs(2)).await;

    let err = client.list_review_configs(&ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    assert_eq!(transport.count(), 0);
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn default_filter_and_page_size_are_applied() {
    let (client, transport) = client();
    client
        .list_projects(&CallContext::background(), ProjectFilter::default(), PageRequest::default())
        .await
        .unwrap();

    let req = transport.last();
    assert_eq!(req.query_param("pageSize"), Some("50"));
    assert_eq!(req.query_param("filter"), None);
    assert_eq!(req.query_param("pageToken"), None);
}

#[tokio::test]
async fn filter_is_sent_when_set_and_page_size_clamped() {
    let (client, transport) = client();
    let filter = ProjectFilter {
        exclude_default: true,
        ..ProjectFilter::default()
    };
    client
        .list_projects(&CallContext::background(), filter, PageRequest::first(5000))
        .await
        .unwrap();

    let req = transport.last();
    assert_eq!(req.query_param("pageSize"), Some("1000"));
    let filter: serde_json::Value =
        serde_json::from_str(req.query_param("filter").unwrap()).unwrap();
    assert_eq!(filter["excludeDefault"], true);
}

#[tokio::test]
async fn project_stream_follows_tokens_verbatim() {
    let (client, transport) = client();
    let token = "eyJvZmZzZXQiOjJ9";
    transport
        .reply_ok(json!({
            "projects": [project_json("a"), project_json("b")],
            "nextPageToken": token,
        }))
        .reply_ok(json!({ "projects": [project_json("c")] }));

    let projects: Vec<_> = client
        .project_stream(&CallContext::background(), ProjectFilter::default())
        .collect()
        .await;

    let ids: Vec<String> = projects
        .into_iter()
        .map(|p| p.unwrap().name.id().to_owned())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].query_param("pageToken"), Some(token));
}

// =============================================================================
// Batch updates
// =============================================================================

fn move_to(instance: &str, db: &str, project: &str) -> UpdateDatabaseRequest {
    UpdateDatabaseRequest {
        name: ResourceName::database(instance, db).unwrap(),
        patch: DatabasePatch {
            project: Some(ResourceName::project(project).unwrap()),
            ..DatabasePatch::default()
        },
        update_mask: FieldMask::from_paths(["project"]).unwrap(),
    }
}

#[tokio::test]
async fn batch_keeps_request_order_across_local_and_remote_failures() {
    let (client, transport) = client();
    transport.reply_ok(json!({
        "results": [
            { "name": "instances/i1/databases/a", "database": database_json("i1", "a", "proj-b") },
            {
                "name": "instances/i1/databases/c",
                "status": { "code": "NOT_FOUND", "message": "database c not found" },
            },
        ]
    }));

    let mut bad = move_to("i1", "b", "proj-b");
    bad.update_mask = FieldMask::from_paths(["engine"]).unwrap();
    let outcomes = client
        .batch_update_databases(
            &CallContext::background(),
            &ResourceName::instance("i1").unwrap(),
            vec![move_to("i1", "a", "proj-b"), bad, move_to("i1", "c", "proj-b")],
        )
        .await
        .unwrap();

    let names: Vec<&str> = outcomes.iter().map(|o| o.name.id()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(
        outcomes[0].result.as_ref().unwrap().project,
        ResourceName::project("proj-b").unwrap()
    );
    assert_eq!(
        outcomes[1].result.as_ref().unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        outcomes[2].result.as_ref().unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let req = transport.last();
    assert_eq!(req.path, "/v1/instances/i1/databases:batchUpdate");
    assert_eq!(req.body.unwrap()["requests"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn batch_with_only_local_failures_sends_nothing() {
    let (client, transport) = client();
    let outcomes = client
        .batch_update_databases(
            &CallContext::background(),
            &ResourceName::instance("i1").unwrap(),
            vec![move_to("i2", "a", "proj-b")],
        )
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].result.is_err());
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn batch_result_count_mismatch_is_internal() {
    let (client, transport) = client();
    transport.reply_ok(json!({ "results": [] }));
    let err = client
        .batch_update_databases(
            &CallContext::background(),
            &ResourceName::all_instances(),
            vec![move_to("i1", "a", "proj-b")],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

// =============================================================================
// Caller identity
// =============================================================================

#[tokio::test]
async fn connect_captures_the_caller() {
    let (_, transport) = client();
    let client = Client::connect(transport, &StaticIdentity::new(common::admin()))
        .await
        .unwrap();
    assert_eq!(client.caller().email, "admin@example.com");
}

#[tokio::test]
async fn deactivated_principal_cannot_connect() {
    let (_, transport) = client();
    let mut user = common::admin();
    user.state = State::Deleted;
    let err = Client::connect(transport, &StaticIdentity::new(user))
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}
