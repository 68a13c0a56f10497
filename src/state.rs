//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::SessionManager;
use crate::config::Config;
use crate::storage::ObjectStore;
use crate::upload::UploadService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pub config: Config,
    pub db: SqlitePool,
    pub sessions: SessionManager,
    pub uploads: UploadService,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, db: SqlitePool) -> Self {
        let sessions = SessionManager::new(&config.session.secret, config.session.ttl_hours);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                sessions,
                uploads: UploadService::new(store),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Get the session manager
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    /// Get the upload service
    pub fn uploads(&self) -> &UploadService {
        &self.inner.uploads
    }
}
