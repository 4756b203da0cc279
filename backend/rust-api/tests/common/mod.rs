#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mongodb::bson::{doc, Document};
use async_trait::async_trait;
use quiz_api::{
    config::{Config, StoreBackend, StoreSettings},
    create_router,
    repositories::questions::QUESTIONS_COLLECTION,
    state::AppState,
    store::{
        memory::MemoryStore, BatchOutcome, CollectionRef, DocumentStream, NewRecord,
        StoreConnector, StoreError, StoreSession,
    },
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tower::ServiceExt;

pub const METRICS_AUTH: &str = "metrics:secret";

pub fn test_config() -> Config {
    Config {
        port: 0,
        store: StoreSettings {
            backend: StoreBackend::Memory,
            ..StoreSettings::default()
        },
        metrics_auth: Some(METRICS_AUTH.to_string()),
    }
}

fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Router over `store`, built the same way as the server's.
pub fn create_test_app(store: &MemoryStore) -> Router {
    init_test_tracing();

    let app_state = Arc::new(AppState::new(test_config(), Arc::new(store.clone())));
    create_router(app_state)
}

/// Router over an arbitrary connector with a custom store deadline.
pub fn create_app_with_connector(
    connector: Arc<dyn StoreConnector>,
    operation_timeout: Duration,
) -> Router {
    init_test_tracing();

    let mut config = test_config();
    config.store.operation_timeout = operation_timeout;
    create_router(Arc::new(AppState::new(config, connector)))
}

/// Connects immediately but never finishes a read or a write.
#[derive(Default)]
pub struct StalledStore {
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl StalledStore {
    pub fn open_sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for StalledStore {
    async fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StalledSession {
            closed: self.closed.clone(),
        }))
    }
}

struct StalledSession {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreSession for StalledSession {
    async fn documents(&self, _collection: &CollectionRef) -> Result<DocumentStream, StoreError> {
        std::future::pending().await
    }

    async fn write_batch(&self, _records: Vec<NewRecord>) -> BatchOutcome {
        std::future::pending().await
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn question_doc(question: &str, options: [&str; 4], answer: &str) -> Document {
    doc! {
        "question": question,
        "option1": options[0],
        "option2": options[1],
        "option3": options[2],
        "option4": options[3],
        "answer": answer,
    }
}

pub fn seed_question(store: &MemoryStore, key: &str, data: Document) {
    store.insert(&CollectionRef::root(QUESTIONS_COLLECTION), key, data);
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}
