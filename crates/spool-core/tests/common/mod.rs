#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use spool_core::app::{AppContext, ContextBuilder};
use spool_core::config::ServerConfig;
use spool_core::impls::{
    Argon2Hasher, FixedMemoryProbe, InMemoryScheduler, InMemoryStore, RecordingTransport,
};
use spool_core::ports::{Clock, FixedClock, KeyValueStore};
use tower::ServiceExt;

pub struct TestEnv {
    pub ctx: Arc<AppContext>,
    pub clock: Arc<FixedClock>,
    pub store: Arc<dyn KeyValueStore>,
    pub scheduler: Arc<InMemoryScheduler>,
    pub transport: Arc<RecordingTransport>,
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ))
}

pub fn server() -> ServerConfig {
    let mut server = ServerConfig::local("127.0.0.1:8080".parse().unwrap()).unwrap();
    server.namespace = "test".to_string();
    server
}

pub fn env() -> TestEnv {
    let clock = clock();
    let shared: Arc<dyn Clock> = clock.clone();
    env_with_store(clock, Arc::new(InMemoryStore::new(shared)))
}

pub fn env_with_store(clock: Arc<FixedClock>, store: Arc<dyn KeyValueStore>) -> TestEnv {
    let shared: Arc<dyn Clock> = clock.clone();
    let scheduler = Arc::new(InMemoryScheduler::new(shared.clone()));
    let transport = Arc::new(RecordingTransport::new(shared.clone()));

    let ctx = ContextBuilder::new()
        .store(store.clone())
        .scheduler(scheduler.clone())
        .transport(transport.clone())
        .clock(shared)
        .memory(Arc::new(FixedMemoryProbe::new(0)))
        .tokens(Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap()))
        .server(server())
        .build()
        .unwrap();

    TestEnv {
        ctx,
        clock,
        store,
        scheduler,
        transport,
    }
}

/// True when no record at all is stored.
pub async fn store_is_empty(env: &TestEnv) -> bool {
    env.store.find_by_prefix("").await.unwrap().is_empty()
}

/// POST `uri` with `body` and return status plus text body.
pub async fn post(router: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, String) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
