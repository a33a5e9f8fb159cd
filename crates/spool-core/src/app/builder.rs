//! ContextBuilder - wiring of the ports every queue shares.
//!
//! The context is built once at startup and passed explicitly to each
//! `AsyncTask` / `BatchQueue`; nothing is looked up globally.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::impls::{Argon2Hasher, SystemMemoryProbe};
use crate::ports::{
    Clock, IdGenerator, KeyValueStore, MemoryProbe, Scheduler, SystemClock, TokenHasher,
    Transport, UlidGenerator,
};

/// Ports and server settings shared by all queues of one process.
pub struct AppContext {
    pub store: Arc<dyn KeyValueStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    pub memory: Arc<dyn MemoryProbe>,
    pub tokens: Arc<dyn TokenHasher>,
    pub ids: Arc<dyn IdGenerator>,
    pub server: ServerConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing components: {0:?}. Provide them before build().")]
    Missing(Vec<&'static str>),
}

/// Builder for [`AppContext`].
///
/// Store, scheduler, transport and server config have no sensible default and
/// must be set. Clock, memory probe, token hasher and id generator fall back
/// to the system implementations.
///
/// # Fail-fast
/// `build()` lists every missing component at once instead of stopping at the
/// first.
#[derive(Default)]
pub struct ContextBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    memory: Option<Arc<dyn MemoryProbe>>,
    tokens: Option<Arc<dyn TokenHasher>>,
    ids: Option<Arc<dyn IdGenerator>>,
    server: Option<ServerConfig>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn memory(mut self, memory: Arc<dyn MemoryProbe>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn tokens(mut self, tokens: Arc<dyn TokenHasher>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    pub fn build(self) -> Result<Arc<AppContext>, BuildError> {
        let mut missing = Vec::new();
        if self.store.is_none() {
            missing.push("store");
        }
        if self.scheduler.is_none() {
            missing.push("scheduler");
        }
        if self.transport.is_none() {
            missing.push("transport");
        }
        if self.server.is_none() {
            missing.push("server");
        }

        let (Some(store), Some(scheduler), Some(transport), Some(server)) =
            (self.store, self.scheduler, self.transport, self.server)
        else {
            return Err(BuildError::Missing(missing));
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));
        let memory = self
            .memory
            .unwrap_or_else(|| Arc::new(SystemMemoryProbe::new()));
        let tokens = self.tokens.unwrap_or_else(|| Arc::new(Argon2Hasher::new()));

        Ok(Arc::new(AppContext {
            store,
            scheduler,
            transport,
            clock,
            memory,
            tokens,
            ids,
            server,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryScheduler, InMemoryStore, RecordingTransport};

    fn server() -> ServerConfig {
        ServerConfig::local("127.0.0.1:8080".parse().unwrap()).unwrap()
    }

    #[test]
    fn build_with_required_parts() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ctx = ContextBuilder::new()
            .store(Arc::new(InMemoryStore::new(clock.clone())))
            .scheduler(Arc::new(InMemoryScheduler::new(clock.clone())))
            .transport(Arc::new(RecordingTransport::new(clock.clone())))
            .server(server())
            .build();
        assert!(ctx.is_ok());
    }

    #[test]
    fn build_lists_every_missing_part() {
        let result = ContextBuilder::new().server(server()).build();
        assert!(matches!(
            result,
            Err(BuildError::Missing(missing)) if missing == vec!["store", "scheduler", "transport"]
        ));
    }
}
