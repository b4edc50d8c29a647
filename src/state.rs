use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::{GoogleVerifier, IdentityVerifier, TokenService};
use crate::config::AppConfig;
use crate::middleware::PrincipalResolver;
use crate::store::memory::MemoryStore;
use crate::store::{DocumentStore, FederatedDirectory};

/// Shared application context, constructed once at startup and injected
/// everywhere. No ambient singletons: every component receives its
/// collaborators here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub directory: Arc<dyn FederatedDirectory>,
    pub tokens: Arc<TokenService>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub resolver: Arc<PrincipalResolver>,
    /// Cancelled on shutdown; threaded into retry loops and external
    /// verification calls so none of them outlive the server.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn FederatedDirectory>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let config = Arc::new(config);
        let tokens = Arc::new(TokenService::new(&config.security));
        let resolver = Arc::new(PrincipalResolver::new(tokens.clone(), store.clone()));
        Self {
            config,
            store,
            directory,
            tokens,
            verifier,
            resolver,
            shutdown: CancellationToken::new(),
        }
    }

    /// State over the in-memory store and the real Google verifier; used by
    /// the dev server. Returns the concrete store too so callers can seed it.
    pub fn in_memory(config: AppConfig) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let verifier = Arc::new(GoogleVerifier::new(&config.google));
        let state = Self::new(
            config,
            store.clone() as Arc<dyn DocumentStore>,
            store.clone() as Arc<dyn FederatedDirectory>,
            verifier,
        );
        (state, store)
    }
}
