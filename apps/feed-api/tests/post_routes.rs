use axum_test::TestServer;
use feed_api::{AppState, create_app};
use feed_core::{
    EventRecord, EventSourcingHandler, EventStore,
    adapters::{
        in_memory_event_bus::InMemoryEventBus, in_memory_repository::InMemoryEventRepository,
    },
    domain::post::PostAggregate,
};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

const TOPIC: &str = "post-events";

struct TestHarness {
    server: TestServer,
    repo: Arc<InMemoryEventRepository>,
    bus: Arc<InMemoryEventBus>,
}

fn build_server() -> TestHarness {
    let repo = Arc::new(InMemoryEventRepository::default());
    let bus = Arc::new(InMemoryEventBus::default());
    let event_store = EventStore::<PostAggregate>::new(repo.clone(), bus.clone(), TOPIC);
    let post_handler = Arc::new(EventSourcingHandler::new(event_store));

    let state = AppState {
        post_handler,
        pg_pool: None,
    };
    let server = TestServer::new(create_app(state)).expect("failed to build test server");
    TestHarness { server, repo, bus }
}

async fn create_post(harness: &TestHarness, author: &str, message: &str) -> Uuid {
    let response = harness
        .server
        .post("/api/v1/posts")
        .json(&json!({ "author": author, "message": message }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    body["id"].as_str().unwrap().parse().unwrap()
}

async fn stream_len(harness: &TestHarness, post_id: Uuid) -> usize {
    use feed_core::EventStoreRepository;
    harness
        .repo
        .find_by_aggregate_id(post_id)
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn create_post_returns_id_and_persists_first_event() {
    let harness = build_server();
    let post_id = create_post(&harness, "alice", "hello").await;

    use feed_core::EventStoreRepository;
    let stream = harness.repo.find_by_aggregate_id(post_id).await.unwrap();
    assert_eq!(stream.len(), 1);
    assert_eq!(stream[0].event_type, "PostCreated");
    assert_eq!(stream[0].version, 0);
}

#[tokio::test]
async fn create_post_rejects_blank_message() {
    let harness = build_server();
    let response = harness
        .server
        .post("/api/v1/posts")
        .json(&json!({ "author": "alice", "message": "  " }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_post_lifecycle_over_http() {
    let harness = build_server();
    let post_id = create_post(&harness, "alice", "hello").await;

    // bob comments.
    let response = harness
        .server
        .post(&format!("/api/v1/posts/{post_id}/comments"))
        .json(&json!({ "comment": "hi", "username": "bob" }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    let comment_id: Uuid = body["comment_id"].as_str().unwrap().parse().unwrap();
    assert_ne!(comment_id, post_id);
    assert_eq!(stream_len(&harness, post_id).await, 2);

    // carol may not edit bob's comment.
    let response = harness
        .server
        .put(&format!("/api/v1/posts/{post_id}/comments/{comment_id}"))
        .json(&json!({ "comment": "hijacked", "username": "carol" }))
        .await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);
    assert_eq!(stream_len(&harness, post_id).await, 2);

    // alice likes her own post.
    let response = harness
        .server
        .put(&format!("/api/v1/posts/{post_id}/like"))
        .await;
    response.assert_status(axum::http::StatusCode::OK);

    // only alice can delete the post.
    let response = harness
        .server
        .delete(&format!("/api/v1/posts/{post_id}"))
        .json(&json!({ "username": "mallory" }))
        .await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);

    let response = harness
        .server
        .delete(&format!("/api/v1/posts/{post_id}"))
        .json(&json!({ "username": "alice" }))
        .await;
    response.assert_status(axum::http::StatusCode::OK);
    assert_eq!(stream_len(&harness, post_id).await, 4);

    // the removed post rejects further commands.
    let response = harness
        .server
        .put(&format!("/api/v1/posts/{post_id}/like"))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(stream_len(&harness, post_id).await, 4);
}

#[tokio::test]
async fn commands_on_unknown_post_are_domain_rejections() {
    let harness = build_server();
    // Never-created identity loads as an inactive empty aggregate.
    let response = harness
        .server
        .put(&format!("/api/v1/posts/{}/message", Uuid::new_v4()))
        .json(&json!({ "message": "anything" }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restore_read_db_republishes_active_streams() {
    let harness = build_server();
    let live_id = create_post(&harness, "alice", "still here").await;

    let dead_id = create_post(&harness, "bob", "gone soon").await;
    harness
        .server
        .delete(&format!("/api/v1/posts/{dead_id}"))
        .json(&json!({ "username": "bob" }))
        .await
        .assert_status(axum::http::StatusCode::OK);

    // Subscribe after the writes so only republished messages arrive.
    let mut receiver = harness.bus.subscribe(TOPIC);
    let response = harness.server.post("/api/v1/restore-read-db").await;
    response.assert_status(axum::http::StatusCode::OK);

    let message = receiver.recv().await.unwrap();
    let record: EventRecord = serde_json::from_slice(&message.payload).unwrap();
    assert_eq!(record.aggregate_id, live_id);
    assert_eq!(record.event_type, "PostCreated");
    // The deleted post's stream was not republished.
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn queries_unavailable_without_read_model_pool() {
    let harness = build_server();
    let response = harness.server.get("/api/v1/posts").await;
    response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
}
