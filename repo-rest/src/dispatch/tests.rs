//! End-to-end protocol tests driving the axum router

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{dispatch_middleware, RestService, RestServiceBuilder};
use crate::authorization::{authorizer_fn, InMemoryCredentials, Operation};
use crate::config::{DeletionReport, RestConfig, UnmatchedPolicy, UpsertPolicy};
use crate::error::Error;
use crate::events::{listener_fn, Event, EventKind, EventListener};
use crate::memory::MemoryCollection;
use crate::registry::{method_fn, Method as CustomMethod, MethodResponse, RegisteredCollection};
use crate::repository::{Collection, Options};

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Reply {
    let body = body
        .map(|b| Body::from(b.to_string()))
        .unwrap_or_else(Body::empty);
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Reply {
        status,
        headers,
        body,
    }
}

fn people() -> MemoryCollection {
    MemoryCollection::builder("people")
        .collection_method("echo", |_, options| Ok(Some(options.clone().into_value())))
        .item_method("retire", |doc, _| {
            doc.set("retired", json!(true));
            Ok(Some(doc.to_value()))
        })
        .build()
}

fn app_with(storage: &MemoryCollection, configure: impl FnOnce(RestServiceBuilder) -> RestServiceBuilder) -> Router {
    let registered = RegisteredCollection::builder(Arc::new(storage.clone()))
        .collection_method("echo", CustomMethod::Passthrough)
        .item_method("retire", CustomMethod::Passthrough)
        .build();
    configure(RestService::builder().collection(registered))
        .build()
        .unwrap()
        .into_router()
}

fn app(storage: &MemoryCollection) -> Router {
    app_with(storage, |b| b)
}

async fn seed(storage: &MemoryCollection, ids: &[&str]) {
    for id in ids {
        storage.insert(json!({ "id": id, "n": 1 })).await.unwrap();
    }
}

#[tokio::test]
async fn test_item_lifecycle() {
    let storage = people();
    let app = app(&storage);

    let created = send(&app, Method::POST, "/people", Some(json!({"name": "Ada"}))).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let created = created.json();
    assert_eq!(created["name"], "Ada");
    let id = created["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("people_"));

    let fetched = send(&app, Method::GET, &format!("/people/{id}"), None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json(), created);

    let deleted = send(&app, Method::DELETE, &format!("/people/{id}"), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(deleted.body.is_empty());

    let gone = send(
        &app,
        Method::GET,
        &format!("/people/{id}?errorIfMissing=false"),
        None,
    )
    .await;
    assert_eq!(gone.status, StatusCode::NO_CONTENT);
    assert!(gone.body.is_empty());
}

#[tokio::test]
async fn test_missing_item_policy() {
    let storage = people();
    let app = app(&storage);

    for method in [Method::GET, Method::DELETE] {
        let required = send(&app, method.clone(), "/people/nobody", None).await;
        assert_eq!(required.status, StatusCode::NOT_FOUND, "{method}");
        assert_eq!(required.json()["status"], 404);

        let optional = send(&app, method.clone(), "/people/nobody?errorIfMissing=false", None).await;
        assert_eq!(optional.status, StatusCode::NO_CONTENT, "{method}");
        assert!(optional.body.is_empty());
    }
}

#[tokio::test]
async fn test_refusal_blocks_before_mutation() {
    let storage = people();
    seed(&storage, &["a"]).await;
    let app = app_with(&storage, |b| {
        b.authorize(authorizer_fn(|request| {
            Ok(!matches!(
                request.operation,
                Operation::PutItem | Operation::DeleteItem | Operation::FindAndDeleteItems
            ))
        }))
    });

    let created = send(&app, Method::POST, "/people", Some(json!({"name": "Eve"}))).await;
    assert_eq!(created.status, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, Method::PUT, "/people/a", Some(json!({"n": 9}))).await.status, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, Method::DELETE, "/people/a", None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, Method::DELETE, "/people", None).await.status, StatusCode::FORBIDDEN);

    let count = send(&app, Method::GET, "/people/count", None).await;
    assert_eq!(count.status, StatusCode::OK);
    assert_eq!(count.json(), json!(1));
    assert_eq!(send(&app, Method::GET, "/people/a", None).await.json()["n"], 1);
}

#[tokio::test]
async fn test_collection_authorizer_sees_token() {
    let storage = people();
    let registered = RegisteredCollection::builder(Arc::new(storage.clone()))
        .authorize(authorizer_fn(|request| Ok(request.authorization == Some("secret"))))
        .build();
    let app = RestService::builder()
        .collection(registered)
        .build()
        .unwrap()
        .into_router();

    assert_eq!(send(&app, Method::GET, "/people", None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(
        send(&app, Method::GET, "/people?authorization=secret", None).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_will_put_rewrite_is_persisted() {
    let storage = people();
    let registered = RegisteredCollection::builder(Arc::new(storage.clone()))
        .on(
            EventKind::WillPutItem,
            listener_fn(|event| {
                if let Some(item) = event.item_mut() {
                    item.update_value(json!({"name": "REWRITTEN"}))?;
                }
                Ok(())
            }),
        )
        .build();
    let app = RestService::builder()
        .collection(registered)
        .build()
        .unwrap()
        .into_router();

    let created = send(&app, Method::POST, "/people", Some(json!({"id": "x", "name": "ada"}))).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json()["name"], "REWRITTEN");

    let stored = storage.get_item("x", &Options::new()).await.unwrap().unwrap();
    assert_eq!(stored.serialize()["name"], "REWRITTEN");
}

#[tokio::test]
async fn test_listener_failure_rolls_back() {
    let storage = people();
    let registered = RegisteredCollection::builder(Arc::new(storage.clone()))
        .on(
            EventKind::DidPutItem,
            listener_fn(|_| Err(Error::BadRequest("audit log refused".to_string()))),
        )
        .build();
    let app = RestService::builder()
        .collection(registered)
        .build()
        .unwrap()
        .into_router();

    let created = send(&app, Method::POST, "/people", Some(json!({"id": "x"}))).await;
    assert_eq!(created.status, StatusCode::BAD_REQUEST);
    assert_eq!(storage.count_items(&Options::new()).await.unwrap(), 0);
}

struct SlowRefusal(Duration);

#[async_trait]
impl EventListener for SlowRefusal {
    async fn on_event(&self, _event: &mut Event<'_>) -> crate::error::Result<()> {
        tokio::time::sleep(self.0).await;
        Err(Error::BadRequest("refused after review".to_string()))
    }
}

#[tokio::test]
async fn test_rollback_keeps_concurrent_item_method_write() {
    let storage = people();
    seed(&storage, &["a"]).await;
    let registered = RegisteredCollection::builder(Arc::new(storage.clone()))
        .item_method("retire", CustomMethod::Passthrough)
        .on(
            EventKind::WillPutItem,
            Arc::new(SlowRefusal(Duration::from_millis(100))),
        )
        .build();
    let app = RestService::builder()
        .collection(registered)
        .build()
        .unwrap()
        .into_router();

    let create = {
        let app = app.clone();
        tokio::spawn(async move { send(&app, Method::POST, "/people", Some(json!({"id": "b"}))).await })
    };
    // let the create reach its listener with the transaction open
    tokio::time::sleep(Duration::from_millis(20)).await;

    let retired = send(&app, Method::GET, "/people/a/retire", None).await;
    assert_eq!(retired.status, StatusCode::OK);
    assert_eq!(create.await.unwrap().status, StatusCode::BAD_REQUEST);

    let a = send(&app, Method::GET, "/people/a", None).await;
    assert_eq!(a.json()["retired"], true);
    let b = send(&app, Method::GET, "/people/b?errorIfMissing=false", None).await;
    assert_eq!(b.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_did_events_follow_success() {
    let storage = people();
    seed(&storage, &["a", "b"]).await;
    let found = Arc::new(AtomicUsize::new(0));
    let deleted = Arc::new(AtomicUsize::new(0));
    let (found_in, deleted_in) = (Arc::clone(&found), Arc::clone(&deleted));
    let registered = RegisteredCollection::builder(Arc::new(storage.clone()))
        .on(
            EventKind::DidFindItems,
            listener_fn(move |event| {
                assert_eq!(event.items().len(), event.client_items().len());
                found_in.fetch_add(event.items().len(), Ordering::SeqCst);
                Ok(())
            }),
        )
        .on(
            EventKind::DidDeleteItem,
            listener_fn(move |_| {
                deleted_in.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .build();
    let app = RestService::builder()
        .collection(registered)
        .build()
        .unwrap()
        .into_router();

    send(&app, Method::GET, "/people", None).await;
    assert_eq!(found.load(Ordering::SeqCst), 2);

    send(&app, Method::DELETE, "/people/a", None).await;
    send(&app, Method::DELETE, "/people/missing?errorIfMissing=false", None).await;
    assert_eq!(deleted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_find_and_count_with_bounds() {
    let storage = people();
    seed(&storage, &["e", "a", "c", "b", "d"]).await;
    let app = app(&storage);

    let found = send(&app, Method::GET, "/people?start=b&end=d", None).await;
    assert_eq!(found.status, StatusCode::OK);
    let ids: Vec<_> = found
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["b", "c", "d"]);

    let count = send(&app, Method::GET, "/people/count?start=b&end=d", None).await;
    assert_eq!(count.json(), json!(ids.len()));

    let reversed = send(&app, Method::GET, "/people?reverse=true&limit=2", None).await;
    let first = reversed.json()[0]["id"].clone();
    assert_eq!(first, "e");
    assert_eq!(reversed.json().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_passthrough_forwards_decoded_options() {
    let storage = people();
    let app = app(&storage);

    let response = send(
        &app,
        Method::GET,
        "/people/echo?mood=sunny&n=3&authorization=tok",
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"mood": "sunny", "n": 3}));

    // kebab and camel spellings reach the same method
    let posted = send(&app, Method::POST, "/people/echo?n=1", Some(json!({"ignored": true}))).await;
    assert_eq!(posted.status, StatusCode::CREATED);
    assert_eq!(posted.json(), json!({"n": 1}));
}

#[tokio::test]
async fn test_get_methods_ignore_the_body() {
    let storage = people();
    seed(&storage, &["a"]).await;
    let app = app(&storage);

    for uri in ["/people/echo?mood=sunny", "/people/a/retire"] {
        let response = app
            .clone()
            .oneshot(
                Request::get(uri)
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }

    let posted = app
        .clone()
        .oneshot(
            Request::post("/people/echo")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(posted.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_item_method_resolves_item() {
    let storage = people();
    seed(&storage, &["a"]).await;
    let app = app(&storage);

    let retired = send(&app, Method::POST, "/people/a/retire", None).await;
    assert_eq!(retired.status, StatusCode::CREATED);
    assert_eq!(retired.json()["retired"], true);
    assert_eq!(send(&app, Method::GET, "/people/a", None).await.json()["retired"], true);

    let missing = send(&app, Method::POST, "/people/zed/retire", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    let optional = send(&app, Method::GET, "/people/zed/retire?errorIfMissing=false", None).await;
    assert_eq!(optional.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_handler_method_headers_and_empty_body() {
    let storage = people();
    let registered = RegisteredCollection::builder(Arc::new(storage.clone()))
        .collection_method(
            "stats",
            method_fn(|request| {
                Ok(MethodResponse::body(json!({"collection": request.collection.name()}))
                    .with_header("xTotalCount", "2"))
            }),
        )
        .collection_method("touch", method_fn(|_| Ok(MethodResponse::empty())))
        .build();
    let app = RestService::builder()
        .collection(registered)
        .build()
        .unwrap()
        .into_router();

    let stats = send(&app, Method::GET, "/people/stats", None).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.headers.get("x-total-count").unwrap(), "2");
    assert_eq!(stats.json(), json!({"collection": "people"}));

    let touched = send(&app, Method::POST, "/people/touch", None).await;
    assert_eq!(touched.status, StatusCode::NO_CONTENT);
    assert!(touched.body.is_empty());
}

#[tokio::test]
async fn test_find_and_delete_subset() {
    let storage = people();
    seed(&storage, &["a", "b", "c", "d"]).await;
    let app = app(&storage);

    let deleted = send(&app, Method::DELETE, "/people?start=b&end=c", None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let remaining = send(&app, Method::GET, "/people", None).await.json();
    let ids: Vec<_> = remaining
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].clone())
        .collect();
    assert_eq!(ids, [json!("a"), json!("d")]);
    assert_eq!(send(&app, Method::GET, "/people/count", None).await.json(), json!(2));
}

#[tokio::test]
async fn test_deletion_outcome_report() {
    let storage = people();
    seed(&storage, &["a", "b", "c"]).await;
    let config = RestConfig {
        deletion_report: DeletionReport::Outcome,
        ..RestConfig::default()
    };
    let app = app_with(&storage, |b| b.config(config));

    let one = send(&app, Method::DELETE, "/people/a", None).await;
    assert_eq!(one.status, StatusCode::OK);
    assert_eq!(one.json(), json!(true));

    let many = send(&app, Method::DELETE, "/people", None).await;
    assert_eq!(many.status, StatusCode::OK);
    assert_eq!(many.json(), json!(2));
}

#[tokio::test]
async fn test_update_merges_and_upserts() {
    let storage = people();
    storage
        .insert(json!({"id": "a", "name": "Ada", "age": 1}))
        .await
        .unwrap();
    let app = app(&storage);

    let updated = send(&app, Method::PUT, "/people/a", Some(json!({"age": 2, "id": "other"}))).await;
    assert_eq!(updated.status, StatusCode::OK);
    let updated = updated.json();
    assert_eq!(updated["id"], "a");
    assert_eq!(updated["name"], "Ada");
    assert_eq!(updated["age"], 2);

    let missing = send(&app, Method::PUT, "/people/zed", Some(json!({"age": 5}))).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let upserted = send(
        &app,
        Method::PUT,
        "/people/zed?createIfMissing=true",
        Some(json!({"age": 5})),
    )
    .await;
    assert_eq!(upserted.status, StatusCode::OK);
    assert_eq!(upserted.json()["id"], "zed");
    assert_eq!(send(&app, Method::GET, "/people/zed", None).await.json()["age"], 5);
}

#[tokio::test]
async fn test_upsert_policies() {
    let storage = people();
    let never = app_with(&storage, |b| {
        b.config(RestConfig {
            upsert: UpsertPolicy::Never,
            ..RestConfig::default()
        })
    });
    let response = send(&never, Method::PUT, "/people/a?createIfMissing=true", Some(json!({}))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let always = app_with(&storage, |b| {
        b.config(RestConfig {
            upsert: UpsertPolicy::Always,
            ..RestConfig::default()
        })
    });
    let response = send(&always, Method::PUT, "/people/a", Some(json!({"n": 1}))).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_get_items_ordered_pairs() {
    let storage = people();
    seed(&storage, &["a", "b", "c"]).await;
    let app = app(&storage);

    let response = send(&app, Method::POST, "/people/get-items", Some(json!(["c", "a"]))).await;
    assert_eq!(response.status, StatusCode::CREATED);
    let pairs = response.json();
    assert_eq!(pairs[0]["typeTag"], "people");
    assert_eq!(pairs[0]["value"]["id"], "c");
    assert_eq!(pairs[1]["value"]["id"], "a");

    let missing = send(&app, Method::POST, "/people/get-items", Some(json!(["a", "zed"]))).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let lenient = send(
        &app,
        Method::POST,
        "/people/get-items?errorIfMissing=false",
        Some(json!(["a", "zed"])),
    )
    .await;
    assert_eq!(lenient.json().as_array().unwrap().len(), 1);

    let malformed = send(&app, Method::POST, "/people/get-items", Some(json!({"ids": []}))).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_client_collection_shapes_output() {
    let storage = people();
    seed(&storage, &["a"]).await;
    let client = MemoryCollection::new("public-people");
    let registered = RegisteredCollection::builder(Arc::new(storage.clone()))
        .client(Arc::new(client))
        .build();
    let app = RestService::builder()
        .collection(registered)
        .build()
        .unwrap()
        .into_router();

    let fetched = send(&app, Method::GET, "/people/a", None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["id"], "a");
}

#[tokio::test]
async fn test_top_level_routes() {
    let storage = people();
    let config = RestConfig {
        repository_id: "people-repo".to_string(),
        ..RestConfig::default()
    };
    let app = app_with(&storage, |b| b.config(config));

    let identity = send(&app, Method::GET, "/", None).await;
    assert_eq!(identity.status, StatusCode::OK);
    assert_eq!(identity.json(), json!({"repositoryId": "people-repo"}));

    let ping = send(&app, Method::GET, "/ping", None).await;
    assert_eq!(ping.status, StatusCode::OK);
    assert_eq!(&ping.body[..], b"pong");

    let unknown = send(&app, Method::GET, "/robots", None).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.json()["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_ping_bypasses_authorization() {
    let storage = people();
    let app = app_with(&storage, |b| b.authorize(authorizer_fn(|_| Ok(false))));
    assert_eq!(send(&app, Method::GET, "/ping", None).await.status, StatusCode::OK);
    assert_eq!(send(&app, Method::GET, "/people", None).await.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_mount_path() {
    let storage = people();
    seed(&storage, &["a"]).await;
    let config = RestConfig {
        mount_path: "/api".to_string(),
        ..RestConfig::default()
    };
    let app = app_with(&storage, |b| b.config(config));

    assert_eq!(send(&app, Method::GET, "/api/people/a", None).await.status, StatusCode::OK);
    assert_eq!(send(&app, Method::GET, "/people/a", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unmatched_requests_reach_next_handler() {
    let storage = people();
    let registered = RegisteredCollection::builder(Arc::new(storage.clone())).build();
    let service = Arc::new(
        RestService::builder()
            .collection(registered)
            .build()
            .unwrap(),
    );
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/people/a/history", get(|| async { "history" }))
        .layer(from_fn_with_state(service, dispatch_middleware));

    let health = send(&app, Method::GET, "/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(&health.body[..], b"ok");

    let history = send(&app, Method::GET, "/people/a/history", None).await;
    assert_eq!(&history.body[..], b"history");

    let put_without_id = send(&app, Method::PUT, "/people", Some(json!({}))).await;
    assert_eq!(put_without_id.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_strict_unmatched_policy() {
    let storage = people();
    let config = RestConfig {
        unmatched: UnmatchedPolicy::Strict,
        ..RestConfig::default()
    };
    let app = app_with(&storage, |b| b.config(config));

    let missing_id = send(&app, Method::PUT, "/people", Some(json!({}))).await;
    assert_eq!(missing_id.status, StatusCode::BAD_REQUEST);

    let unsupported = send(&app, Method::PATCH, "/people/a", Some(json!({}))).await;
    assert_eq!(unsupported.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_sign_in_flow() {
    let storage = people();
    let credentials = InMemoryCredentials::new().with_account("ada", "lovelace");
    let app = app_with(&storage, |b| b.credentials(Arc::new(credentials)));

    let refused = send(
        &app,
        Method::POST,
        "/authorizations",
        Some(json!({"username": "ada", "password": "wrong"})),
    )
    .await;
    assert_eq!(refused.status, StatusCode::FORBIDDEN);

    for incomplete in [None, Some(json!({"username": "ada"}))] {
        let response = send(&app, Method::POST, "/authorizations", incomplete).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }
    let garbled = app
        .clone()
        .oneshot(
            Request::post("/authorizations")
                .header("content-type", "application/json")
                .body(Body::from("{username"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(garbled.status(), StatusCode::FORBIDDEN);

    let signed_in = send(
        &app,
        Method::POST,
        "/authorizations",
        Some(json!({"username": "ada", "password": "lovelace"})),
    )
    .await;
    assert_eq!(signed_in.status, StatusCode::CREATED);
    let token = signed_in.json().as_str().unwrap().to_string();

    let path = format!("/authorizations/{token}");
    assert_eq!(send(&app, Method::GET, &path, None).await.status, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, Method::DELETE, &path, None).await.status, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, Method::GET, &path, None).await.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sign_in_requires_handler() {
    let config = RestConfig {
        sign_in: true,
        ..RestConfig::default()
    };
    let result = RestService::builder().config(config).build();
    assert!(matches!(result, Err(Error::Misconfigured(_))));

    // without a handler the routes do not exist
    let app = app(&people());
    let response = send(&app, Method::POST, "/authorizations", Some(json!({}))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let storage = people();
    let app = app(&storage);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/people")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(storage.count_items(&Options::new()).await.unwrap(), 0);
}
