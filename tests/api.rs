use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use schema_rest::{app, resolve, AppError, AppState, HookContext, Hooks, MemoryStore, Operation, SchemaConfig, Settings};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn registry() -> schema_rest::Registry {
    resolve(
        &SchemaConfig::from_value(json!({
            "group": {
                "name": { "unique": true, "required": true, "text": true },
                "members": { "type": "children", "relation": "user" },
                "owner": { "type": "instance", "relation": "user" }
            },
            "user": {
                "name": { "unique": true, "required": true },
                "age": { "type": "number", "minimum": 0 },
                "group": { "type": "parent", "relation": "group.members" }
            }
        }))
        .unwrap(),
    )
    .unwrap()
}

fn router_with(settings: Settings) -> Router {
    app(AppState::new(registry(), Arc::new(MemoryStore::new()), settings))
}

fn router() -> Router {
    router_with(Settings::default().with_prefix("/api"))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>, headers: &[(&str, &str)]) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, value)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, HeaderMap, Value) {
    send(app, "POST", uri, Some(body), &[]).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = send(app, "GET", uri, None, &[]).await;
    (status, body)
}

#[tokio::test]
async fn create_derives_id_from_unique_field() {
    let app = router();
    let (status, headers, body) = post(&app, "/api/groups", json!({ "name": "Name A" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "id": "name_a", "href": "/api/groups/name_a" }));
    assert_eq!(headers[header::LOCATION], "/api/groups/name_a");

    let (_, _, body) = post(&app, "/api/groups", json!({ "name": "Name/A!" })).await;
    assert_eq!(body, json!({ "id": "50e43d6", "href": "/api/groups/50e43d6" }));

    let (status, _, body) = post(&app, "/api/groups", json!({ "name": "name a" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn list_window_links() {
    let app = router();
    for name in ["a", "b", "c"] {
        post(&app, "/api/groups", json!({ "name": name })).await;
    }
    let (status, body) = get(&app, "/api/groups?limit=1&offset=1&orderBy=name").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["size"], 3);
    assert_eq!(body["prev"], "/api/groups?offset=0&limit=1");
    assert_eq!(body["next"], "/api/groups?offset=2&limit=1");
    assert_eq!(body["first"], "/api/groups?offset=0&limit=1");
    assert_eq!(body["last"], "/api/groups?offset=2&limit=1");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["name"], "b");

    let (_, body) = get(&app, "/api/groups?name=a,c&fields=name").await;
    assert_eq!(body["size"], 2);
    assert_eq!(body["items"][0], json!({ "id": "a", "name": "a" }));

    let (_, body) = get(&app, "/api/users").await;
    assert_eq!(body["size"], 0);
    assert_eq!(body["first"], Value::Null);
}

#[tokio::test]
async fn huge_offsets_and_limits_are_served() {
    let app = router();
    post(&app, "/api/groups", json!({ "name": "a" })).await;

    let (status, body) = get(&app, "/api/groups?offset=18446744073709551615").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offset"], i64::MAX);
    assert_eq!(body["size"], 1);
    assert_eq!(body["next"], Value::Null);
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["last"], "/api/groups?offset=0&limit=25");

    let (status, body) = get(&app, "/api/groups?offset=1&limit=18446744073709551615").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next"], Value::Null);
    assert_eq!(body["prev"], format!("/api/groups?offset=0&limit={}", i64::MAX));
}

#[tokio::test]
async fn relations_render_as_links_or_expand() {
    let app = router();
    post(&app, "/api/users", json!({ "name": "Ann" })).await;
    post(&app, "/api/groups", json!({ "name": "UXD", "owner": "ann" })).await;
    let (status, _, _) = post(&app, "/api/users", json!({ "name": "Bob", "group": "uxd" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, group) = get(&app, "/api/groups/uxd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(group["members"], json!({ "href": "/api/groups/uxd/members" }));
    assert_eq!(group["owner"], json!({ "href": "/api/users/ann", "id": "ann" }));

    let (_, group) = get(&app, "/api/groups/uxd?expands=owner,members").await;
    assert_eq!(group["owner"]["id"], "ann");
    assert_eq!(group["owner"]["name"], "Ann");
    assert_eq!(group["owner"]["group"], json!({ "href": null, "id": null }));
    assert_eq!(group["members"], json!({ "href": "/api/groups/uxd/members" }));

    let (status, members) = get(&app, "/api/groups/uxd/members").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members["size"], 1);
    assert_eq!(members["items"][0]["id"], "bob");
    assert_eq!(members["items"][0]["group"], json!({ "href": "/api/groups/uxd", "id": "uxd" }));
    assert_eq!(members["first"], "/api/groups/uxd/members?offset=0&limit=25");
}

#[tokio::test]
async fn missing_reference_and_missing_instance() {
    let app = router();
    let (status, _, body) = post(&app, "/api/users", json!({ "name": "Bob", "group": "ghost" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "related_entity_missing");
    assert_eq!(body["error"]["details"]["fields"]["group"], "Specified ID (ghost) does not exist in group");

    let (status, body) = get(&app, "/api/users/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = get(&app, "/api/widgets").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_merges_and_guards_unique_fields() {
    let app = router();
    post(&app, "/api/users", json!({ "name": "Ann", "age": 30 })).await;

    let (status, _, body) = send(&app, "PATCH", "/api/users/ann", Some(json!({ "name": "Anne" })), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["fields"]["name"], "unique field could not be changed");

    let (status, _, body) = send(&app, "PATCH", "/api/users/ann", Some(json!({ "age": -1 })), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["fields"]["age"], "Invalid value[-1]");

    let (status, _, _) = send(&app, "PATCH", "/api/users/ann", Some(json!({ "age": 31 })), &[]).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, user) = get(&app, "/api/users/ann").await;
    assert_eq!(user["age"], 31);
    assert_eq!(user["name"], "Ann");
    assert!(user["updatedAt"].as_str().unwrap() >= user["createdAt"].as_str().unwrap());

    let (status, _, _) = send(&app, "POST", "/api/users/nobody", Some(json!({ "age": 1 })), &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_create_reports_failing_index() {
    let app = router();
    let (status, _, body) = post(&app, "/api/users", json!({ "items": [{ "name": "A" }, { "name": "B" }] })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({ "items": [
            { "id": "a", "href": "/api/users/a" },
            { "id": "b", "href": "/api/users/b" }
        ] })
    );

    let (status, _, body) = post(&app, "/api/users", json!({ "items": [{ "name": "C" }, {}] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["index"], 1);
    let (_, list) = get(&app, "/api/users").await;
    assert_eq!(list["size"], 3);
}

#[tokio::test]
async fn delete_collection_and_instance() {
    let app = router();
    for name in ["a", "b", "c"] {
        post(&app, "/api/users", json!({ "name": name })).await;
    }
    let (status, _, _) = send(&app, "DELETE", "/api/users?name=a*", None, &[]).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, list) = get(&app, "/api/users").await;
    assert_eq!(list["size"], 2);

    let (status, _, _) = send(&app, "DELETE", "/api/users/b", None, &[]).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = get(&app, "/api/users/b").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn collection_body_filters_apply_to_list_and_delete() {
    let app = router();
    for (name, age) in [("a", 1), ("b", 2), ("c", 3)] {
        post(&app, "/api/users", json!({ "name": name, "age": age })).await;
    }

    let (status, _, body) = send(&app, "GET", "/api/users", Some(json!({ "age": 2 })), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["size"], 1);
    assert_eq!(body["items"][0]["id"], "b");

    // Body wins over the query string for the same field.
    let (status, _, _) = send(&app, "DELETE", "/api/users?name=c", Some(json!({ "name": "a" })), &[]).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, list) = get(&app, "/api/users?orderBy=name").await;
    assert_eq!(list["size"], 2);
    assert_eq!(list["items"][0]["id"], "b");
    assert_eq!(list["items"][1]["id"], "c");

    let (status, _, body) = send(&app, "DELETE", "/api/users", Some(json!(["a"])), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    let (_, list) = get(&app, "/api/users").await;
    assert_eq!(list["size"], 2);
}

/// Tenant-scoped hooks: requests need an `X-Tenant` header.
struct TenantHooks;

#[async_trait]
impl Hooks for TenantHooks {
    async fn before(&self, ctx: &HookContext) -> Result<(), AppError> {
        if ctx.header("x-tenant").is_none() {
            return Err(AppError::Unauthorized("missing tenant".into()));
        }
        if ctx.query.get("dryRun").is_some_and(|v| v == "true") {
            return Err(AppError::BadRequest("dry run".into()));
        }
        if ctx.operation == Operation::Create && ctx.body.as_ref().is_some_and(|b| b["name"] == "root") {
            return Err(AppError::BadRequest("reserved name".into()));
        }
        Ok(())
    }

    async fn after(&self, ctx: &HookContext, body: Option<Value>) -> Result<Option<Value>, AppError> {
        Ok(match (ctx.operation, body) {
            (Operation::Read, Some(mut v)) => {
                v["tenant"] = json!(ctx.header("x-tenant"));
                Some(v)
            }
            (_, body) => body,
        })
    }
}

#[tokio::test]
async fn hooks_see_headers_query_and_body() {
    let state = AppState::new(registry(), Arc::new(MemoryStore::new()), Settings::default()).with_hooks(Arc::new(TenantHooks));
    let app = app(state);
    let tenant = [("X-Tenant", "acme")];

    let (status, _, _) = send(&app, "POST", "/users", Some(json!({ "name": "Ann" })), &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, body) = send(&app, "POST", "/users", Some(json!({ "name": "root" })), &tenant).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "bad request: reserved name");
    let (status, _, _) = send(&app, "POST", "/users?dryRun=true", Some(json!({ "name": "Ann" })), &tenant).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&app, "POST", "/users", Some(json!({ "name": "Ann" })), &tenant).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _, body) = send(&app, "GET", "/users/ann", None, &tenant).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant"], "acme");
    let (_, _, body) = send(&app, "GET", "/users", None, &tenant).await;
    assert_eq!(body["size"], 1);
}

#[tokio::test]
async fn credentials_are_checked_when_configured() {
    let app = router_with(Settings::default().with_credentials("client", "secret"));
    let (status, _, body) = send(&app, "GET", "/groups", None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let wrong = [("X-Api-Client", "client"), ("X-Api-Secret", "nope")];
    let (status, _, _) = send(&app, "GET", "/groups", None, &wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let right = [("X-Api-Client", "client"), ("X-Api-Secret", "secret")];
    let (status, _, _) = send(&app, "GET", "/groups", None, &right).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&app, "GET", "/health", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn validation_and_schema_modes() {
    let app = router();
    let validate = [("X-Validation", "true")];
    let (status, _, body) = send(&app, "POST", "/api/users", Some(json!({ "name": "Ann" })), &validate).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
    let (_, list) = get(&app, "/api/users").await;
    assert_eq!(list["size"], 0);

    let (status, _, body) = send(&app, "POST", "/api/users", Some(json!({ "items": [{ "name": "A" }, { "age": 3 }] })), &validate).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["index"], 1);
    assert_eq!(body["error"]["details"]["fields"]["name"], "Invalid value[null]");

    let (status, _, body) = send(&app, "GET", "/api/users", None, &[("X-JSON-Schema", "true")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "user");
    assert_eq!(body["required"], json!(["name"]));
    assert_eq!(body["properties"]["age"]["type"], "number");
}
