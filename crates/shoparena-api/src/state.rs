//! Application state management
//!
//! Author: Shoparena developers

use crate::auth::{AuthService, JwtConfig, PasswordConfig, TokenAuthority};
use crate::mailer::Mailer;
use crate::uploads::ObjectStore;
use shoparena_core::postgres::{PgAccountStore, PgStore};
use shoparena_core::{
    AccountDirectory, AppConfig, BlacklistStore, CatalogStore, ProfileMutator, Role,
    SearchResolver,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

/// Store handles the state is assembled from
#[derive(Clone)]
pub struct Stores {
    pub accounts: AccountDirectory,
    pub catalog: Arc<dyn CatalogStore>,
    pub blacklist: Arc<dyn BlacklistStore>,
}

impl Stores {
    /// All relations backed by one PostgreSQL pool
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        Self {
            accounts: AccountDirectory::new(
                Arc::new(PgAccountStore::new(pool.clone(), Role::Buyer)),
                Arc::new(PgAccountStore::new(pool, Role::Seller)),
            ),
            catalog: store.clone(),
            blacklist: store,
        }
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn memory(backend: &shoparena_core::memory::MemoryBackend) -> Self {
        Self {
            accounts: backend.directory(),
            catalog: backend.store.clone(),
            blacklist: backend.store.clone(),
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    pub accounts: AccountDirectory,
    pub catalog: Arc<dyn CatalogStore>,
    pub tokens: TokenAuthority,
    pub search: SearchResolver,
    pub profiles: ProfileMutator,
    pub auth: AuthService,
    /// Destination for profile images
    pub object_store: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        stores: Stores,
        mailer: Arc<dyn Mailer>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        let tokens = TokenAuthority::new(JwtConfig::from(&config.auth), stores.blacklist);
        let auth = AuthService::new(
            stores.accounts.clone(),
            tokens.clone(),
            mailer,
            config.auth.reset_link_base.clone(),
        );

        Self {
            start_time: Instant::now(),
            search: SearchResolver::new(stores.catalog.clone()),
            profiles: ProfileMutator::new(stores.accounts.clone()),
            accounts: stores.accounts,
            catalog: stores.catalog,
            tokens,
            auth,
            object_store,
            config,
        }
    }

    /// Override the Argon2 cost used for new password hashes
    pub fn with_password_config(mut self, config: PasswordConfig) -> Self {
        self.auth = self.auth.with_password_config(config);
        self
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
