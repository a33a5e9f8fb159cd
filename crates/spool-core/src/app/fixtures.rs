//! Test wiring: in-memory ports around a pinned clock.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use super::builder::{AppContext, ContextBuilder};
use crate::config::ServerConfig;
use crate::impls::{
    Argon2Hasher, FixedMemoryProbe, InMemoryScheduler, InMemoryStore, RecordingTransport,
};
use crate::ports::{Clock, FixedClock};

pub(crate) struct Harness {
    pub ctx: Arc<AppContext>,
    pub clock: Arc<FixedClock>,
    pub store: Arc<InMemoryStore>,
    pub scheduler: Arc<InMemoryScheduler>,
    pub transport: Arc<RecordingTransport>,
    pub memory: Arc<FixedMemoryProbe>,
}

pub(crate) fn harness() -> Harness {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ));
    let shared: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(InMemoryStore::new(shared.clone()));
    let scheduler = Arc::new(InMemoryScheduler::new(shared.clone()));
    let transport = Arc::new(RecordingTransport::new(shared.clone()));
    let memory = Arc::new(FixedMemoryProbe::new(0));

    let mut server = ServerConfig::local("127.0.0.1:8080".parse().unwrap()).unwrap();
    server.namespace = "test".to_string();

    let ctx = ContextBuilder::new()
        .store(store.clone())
        .scheduler(scheduler.clone())
        .transport(transport.clone())
        .clock(shared)
        .memory(memory.clone())
        .tokens(Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap()))
        .server(server)
        .build()
        .unwrap();

    Harness {
        ctx,
        clock,
        store,
        scheduler,
        transport,
        memory,
    }
}
