//! HTTP server and shared application state

pub mod http;

use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::content::{CourseRepository, CourseStore, MongoCourseStore};
use crate::credentials::{CredentialResolver, CredentialService};
use crate::db::{MemoryCourseStore, MemorySocialStore, MemoryUserStore, MongoClient};
use crate::logging::VisitLogger;
use crate::registry::RequestRegistry;
use crate::social::{MongoSocialStore, SocialGraph, SocialStore};
use crate::types::Result;
use crate::users::{MongoUserStore, UserService, UserStore};

pub use http::{dispatch, run};

/// Storage backends for every collection
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub social: Arc<dyn SocialStore>,
    pub courses: Arc<dyn CourseStore>,
    /// "mongodb" or "memory"
    pub backend: &'static str,
}

impl Stores {
    /// In-memory stores (dev mode without MongoDB, tests)
    pub fn memory() -> Self {
        Self {
            users: Arc::new(MemoryUserStore::new()),
            social: Arc::new(MemorySocialStore::new()),
            courses: Arc::new(MemoryCourseStore::new()),
            backend: "memory",
        }
    }

    /// MongoDB-backed stores; creates indexes on first use
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: Arc::new(MongoUserStore::new(client).await?),
            social: Arc::new(MongoSocialStore::new(client).await?),
            courses: Arc::new(MongoCourseStore::new(client).await?),
            backend: "mongodb",
        })
    }
}

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Which store backend is in use
    pub store_backend: &'static str,
    pub started_at: Instant,
    pub users: Arc<UserService>,
    pub graph: Arc<SocialGraph>,
    pub credentials: Arc<dyn CredentialResolver>,
    pub courses: Arc<CourseRepository>,
    /// Visit deduplication per client
    pub registry: Arc<RequestRegistry>,
    pub visits: VisitLogger,
}

impl AppState {
    pub fn new(args: Args, stores: Stores, jwt: JwtValidator) -> Self {
        let timeout = args.store_timeout();

        let users = Arc::new(UserService::new(Arc::clone(&stores.users), jwt, timeout));
        let graph = Arc::new(SocialGraph::new(
            Arc::clone(&stores.social),
            users.clone(),
            timeout,
        ));
        let credentials: Arc<dyn CredentialResolver> = Arc::new(CredentialService::new(
            Arc::clone(&stores.users),
            Arc::clone(&graph),
            timeout,
        ));
        let courses = Arc::new(CourseRepository::new(
            Arc::clone(&stores.courses),
            Arc::clone(&credentials),
            timeout,
        ));
        let registry = Arc::new(RequestRegistry::new(args.registry_config()));

        Self {
            args,
            store_backend: stores.backend,
            started_at: Instant::now(),
            users,
            graph,
            credentials,
            courses,
            registry,
            visits: VisitLogger::new(),
        }
    }
}
