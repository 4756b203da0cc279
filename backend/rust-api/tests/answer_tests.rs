mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{create_app_with_connector, create_test_app, get, post_json, send, StalledStore};
use mongodb::bson::doc;
use quiz_api::{repositories::answers::answers_collection, store::memory::MemoryStore};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

#[tokio::test]
async fn test_submit_then_list_round_trip() {
    let store = MemoryStore::new();
    let app = create_test_app(&store);

    let (status, body) = send(
        &app,
        post_json(
            "/api/user/answers",
            json!({
                "userId": "u1",
                "answeredQuestions": [{ "question": "2+2?", "answeredCorrectly": true }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Answers recorded successfully" }));

    let (status, body) = send(&app, get("/api/user/answers?userId=u1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "question": "2+2?", "answeredCorrectly": true }]));
}

#[tokio::test]
async fn test_every_submitted_item_is_stored() {
    let store = MemoryStore::new();
    let app = create_test_app(&store);
    let user_id = format!("test-user-{}", Uuid::new_v4());

    let submitted = json!([
        { "question": "2+2?", "answeredCorrectly": true },
        { "question": "Capital of Peru?", "answeredCorrectly": false },
        { "question": "Boiling point of water?", "answeredCorrectly": true },
        { "question": "2+2?", "answeredCorrectly": false }
    ]);
    let (status, _) = send(
        &app,
        post_json(
            "/api/user/answers",
            json!({ "userId": user_id, "answeredQuestions": submitted }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get(&format!("/api/user/answers?userId={}", user_id))).await;
    assert_eq!(status, StatusCode::OK);

    let mut listed: Vec<String> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item.to_string())
        .collect();
    let mut expected: Vec<String> = submitted
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item.to_string())
        .collect();
    listed.sort();
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_missing_user_id_is_400_without_writes() {
    let store = MemoryStore::new();
    let app = create_test_app(&store);

    for payload in [
        json!({ "userId": "", "answeredQuestions": [{ "question": "q", "answeredCorrectly": true }] }),
        json!({ "answeredQuestions": [{ "question": "q", "answeredCorrectly": true }] }),
        json!({ "userId": "u1", "answeredQuestions": [] }),
        json!({ "userId": "u1" }),
        json!({ "userId": null, "answeredQuestions": [{ "question": "q", "answeredCorrectly": true }] }),
        json!({ "userId": "u1", "answeredQuestions": null }),
        json!({ "userId": null, "answeredQuestions": null }),
    ] {
        let (status, body) = send(&app, post_json("/api/user/answers", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "message": "Missing required fields" }));
    }

    assert_eq!(store.sessions_opened(), 0);
    assert_eq!(store.writes_attempted(), 0);
}

#[tokio::test]
async fn test_submit_without_content_type_is_accepted() {
    let store = MemoryStore::new();
    let app = create_test_app(&store);

    let request = Request::builder()
        .method("POST")
        .uri("/api/user/answers")
        .body(Body::from(
            json!({
                "userId": "u1",
                "answeredQuestions": [{ "question": "2+2?", "answeredCorrectly": true }]
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Answers recorded successfully" }));
    assert_eq!(store.documents_in(&answers_collection("u1")).len(), 1);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let store = MemoryStore::new();
    let app = create_test_app(&store);

    let request = Request::builder()
        .method("POST")
        .uri("/api/user/answers")
        .header("content-type", "application/json")
        .body(Body::from("{\"userId\": \"u1\", \"answeredQuestions\": ["))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
    assert_eq!(store.sessions_opened(), 0);
}

#[tokio::test]
async fn test_wrong_methods_are_405_without_store_access() {
    let store = MemoryStore::new();
    let app = create_test_app(&store);

    for method in ["PUT", "DELETE", "PATCH", "HEAD"] {
        let request = Request::builder()
            .method(method)
            .uri("/api/user/answers?userId=u1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        if method != "HEAD" {
            assert_eq!(body, json!({ "message": "Method not allowed" }));
        }
    }

    assert_eq!(store.sessions_opened(), 0);
}

#[tokio::test]
async fn test_missing_user_id_query_is_400() {
    let store = MemoryStore::new();
    let app = create_test_app(&store);

    for uri in ["/api/user/answers", "/api/user/answers?userId="] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "message": "Missing userId" }));
    }
    assert_eq!(store.sessions_opened(), 0);
}

#[tokio::test]
async fn test_unknown_user_is_404() {
    let store = MemoryStore::new();
    let app = create_test_app(&store);

    let (status, body) = send(&app, get("/api/user/answers?userId=nobody")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "No answers found for user" }));
}

#[tokio::test]
async fn test_write_failure_is_500_with_store_prefix() {
    let store = MemoryStore::new();
    store.reject_writes(true);
    let app = create_test_app(&store);

    let (status, body) = send(
        &app,
        post_json(
            "/api/user/answers",
            json!({
                "userId": "u1",
                "answeredQuestions": [{ "question": "2+2?", "answeredCorrectly": true }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Error writing to store:"));
}

#[tokio::test]
async fn test_partial_write_is_500_and_keeps_accepted_records() {
    let store = MemoryStore::new();
    store.fail_writes_at([1]);
    let app = create_test_app(&store);

    let (status, _) = send(
        &app,
        post_json(
            "/api/user/answers",
            json!({
                "userId": "u1",
                "answeredQuestions": [
                    { "question": "a", "answeredCorrectly": true },
                    { "question": "b", "answeredCorrectly": false }
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(store.documents_in(&answers_collection("u1")).len(), 1);
}

#[tokio::test]
async fn test_stalled_write_is_500_timeout() {
    let connector = Arc::new(StalledStore::default());
    let app = create_app_with_connector(connector.clone(), Duration::from_millis(20));

    let (status, body) = send(
        &app,
        post_json(
            "/api/user/answers",
            json!({
                "userId": "u1",
                "answeredQuestions": [{ "question": "2+2?", "answeredCorrectly": true }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "message": "Error writing to store: store operation timed out after 20ms" })
    );
    assert_eq!(connector.open_sessions(), 0);
}

#[tokio::test]
async fn test_corrupt_history_is_500() {
    let store = MemoryStore::new();
    store.insert(
        &answers_collection("u1"),
        "bad",
        doc! { "question": "a", "answeredCorrectly": "maybe" },
    );
    let app = create_test_app(&store);

    let (status, body) = send(&app, get("/api/user/answers?userId=u1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("failed to decode document bad"));
}

#[tokio::test]
async fn test_store_outage_on_listing_is_500() {
    let store = MemoryStore::new();
    store.fail_connections(true);
    let app = create_test_app(&store);

    let (status, _) = send(&app, get("/api/user/answers?userId=u1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
