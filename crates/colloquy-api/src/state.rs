//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the REST API.
//! The conversation service is generic over store and responder traits;
//! AppState pins it to the concrete infra implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colloquy_core::auth::resolver::IdentityResolver;
use colloquy_core::chat::service::ConversationService;
use colloquy_core::context::RequestContext;
use colloquy_core::responder::KeywordResponder;
use colloquy_infra::auth::jwt::JwtIdentityResolver;
use colloquy_infra::config::database_url;
use colloquy_infra::sqlite::chat::SqliteConversationStore;
use colloquy_infra::sqlite::pool::DatabasePool;
use colloquy_types::config::ServiceConfig;
use tokio_util::sync::CancellationToken;

/// Concrete type alias for the service generics pinned to infra implementations.
pub type ConcreteConversationService =
    ConversationService<SqliteConversationStore, KeywordResponder>;

/// Shared application state. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub conversation_service: Arc<ConcreteConversationService>,
    pub identity_resolver: Arc<dyn IdentityResolver>,
    pub required_roles: Arc<[String]>,
    pub request_timeout: Duration,
    /// Parent of every request's cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: parse the signing key, connect to
    /// the database, wire services.
    pub async fn init(config: &ServiceConfig) -> anyhow::Result<Self> {
        let resolver = JwtIdentityResolver::from_config(&config.auth)
            .context("failed to load the token verification key")?;

        let db_url = database_url(config);
        let db_pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("failed to open database {db_url}"))?;

        Ok(Self::new(db_pool, Arc::new(resolver), config))
    }

    /// Wire services over an existing pool and resolver.
    pub fn new(
        db_pool: DatabasePool,
        identity_resolver: Arc<dyn IdentityResolver>,
        config: &ServiceConfig,
    ) -> Self {
        let store = SqliteConversationStore::new(db_pool.clone());
        let conversation_service = ConversationService::new(
            store,
            KeywordResponder::new(),
            Duration::from_millis(config.responder.timeout_ms),
        );

        Self {
            conversation_service: Arc::new(conversation_service),
            identity_resolver,
            required_roles: config.auth.required_roles.clone().into(),
            request_timeout: Duration::from_millis(config.server.request_timeout_ms),
            shutdown: CancellationToken::new(),
            db_pool,
        }
    }

    /// A fresh context for one inbound request, cancelled along with
    /// [`shutdown`](Self::shutdown).
    pub fn request_context(&self) -> RequestContext {
        RequestContext::child_of(&self.shutdown, self.request_timeout)
    }
}
