//! Worker route table.
//!
//! Each queue mounts one route, `/{namespace}/async-job/v1/{pointer}`. The
//! handler answers with plain sentinels:
//! - `-1` (403) when the token does not verify
//! - `Done` otherwise

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{self, MethodRouter};
use axum::Router;
use serde::Deserialize;
use tracing::Instrument;

use crate::domain::errors::QueueError;
use crate::domain::outcome::HandleOutcome;
use crate::domain::pointer::Pointer;

/// Largest trigger body read by a worker.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// HTTP verbs a worker route can be mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    fn route(self) -> MethodRouter<Arc<dyn Worker>> {
        match self {
            Verb::Get => routing::get(serve),
            Verb::Post => routing::post(serve),
            Verb::Put => routing::put(serve),
            Verb::Patch => routing::patch(serve),
            Verb::Delete => routing::delete(serve),
        }
    }
}

/// Incoming worker call: the query token, and the body still unread.
pub struct WorkerRequest {
    token: Option<String>,
    body: Body,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl WorkerRequest {
    pub fn new(token: Option<String>, body: impl Into<Body>) -> Self {
        Self {
            token,
            body: body.into(),
        }
    }

    pub fn from_http(request: Request) -> Self {
        let token = token_from_uri(request.uri());
        Self {
            token,
            body: request.into_body(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn into_parts(self) -> (Option<String>, Body) {
        (self.token, self.body)
    }
}

fn token_from_uri(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

/// Read a body up to [`MAX_BODY_BYTES`].
pub async fn read_body(body: Body) -> Result<axum::body::Bytes, QueueError> {
    axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| QueueError::Body(e.to_string()))
}

/// Sentinel response of a worker route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerResponse {
    Rejected,
    Done,
}

impl IntoResponse for WorkerResponse {
    fn into_response(self) -> Response {
        match self {
            WorkerResponse::Rejected => (StatusCode::FORBIDDEN, "-1").into_response(),
            WorkerResponse::Done => (StatusCode::OK, "Done").into_response(),
        }
    }
}

/// Something that can sit behind a worker route.
#[async_trait::async_trait]
pub trait Worker: Send + Sync + 'static {
    fn pointer(&self) -> &Pointer;

    fn route_path(&self) -> String;

    async fn maybe_handle(&self, request: WorkerRequest) -> Result<HandleOutcome, QueueError>;
}

/// Collects worker routes and refuses two workers with the same or an
/// overlapping pointer.
pub struct WorkerRoutes {
    router: Router,
    pointers: HashSet<Pointer>,
}

impl WorkerRoutes {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            pointers: HashSet::new(),
        }
    }

    pub fn mount(&mut self, verb: Verb, worker: Arc<dyn Worker>) -> Result<(), QueueError> {
        let pointer = worker.pointer().clone();
        if self.pointers.contains(&pointer) {
            return Err(QueueError::DuplicatePointer(pointer.to_string()));
        }
        if let Some(other) = self.pointers.iter().find(|p| p.overlaps(&pointer)) {
            return Err(QueueError::OverlappingPointer {
                pointer: pointer.to_string(),
                other: other.to_string(),
            });
        }

        let path = worker.route_path();
        tracing::info!(pointer = %pointer, path = %path, verb = ?verb, "worker route mounted");

        let route = Router::new().route(&path, verb.route()).with_state(worker);
        let router = std::mem::replace(&mut self.router, Router::new());
        self.router = router.merge(route);
        self.pointers.insert(pointer);
        Ok(())
    }

    pub fn is_mounted(&self, pointer: &Pointer) -> bool {
        self.pointers.contains(pointer)
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

impl Default for WorkerRoutes {
    fn default() -> Self {
        Self::new()
    }
}

async fn serve(State(worker): State<Arc<dyn Worker>>, request: Request) -> WorkerResponse {
    let request = WorkerRequest::from_http(request);
    let span = tracing::info_span!("worker", pointer = %worker.pointer());

    // run detached so a caller hanging up does not cancel the pass
    let joined = tokio::spawn(
        async move { worker.maybe_handle(request).await }.instrument(span.clone()),
    )
    .await;
    let _entered = span.enter();

    match joined {
        Ok(Ok(HandleOutcome::Rejected)) => WorkerResponse::Rejected,
        Ok(Ok(outcome)) => {
            tracing::debug!(outcome = ?outcome, "worker call finished");
            WorkerResponse::Done
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "worker call failed");
            WorkerResponse::Done
        }
        Err(e) => {
            tracing::error!(error = %e, "worker task aborted");
            WorkerResponse::Done
        }
    }
}
