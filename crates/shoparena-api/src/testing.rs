//! In-memory application harness for tests
//!
//! Builds the full [`AppState`] over [`MemoryBackend`] with a recording
//! mailer, an in-memory object store and the cheapest Argon2 parameters.

use crate::auth::password::{hash_password_with_config, PasswordConfig};
use crate::mailer::RecordingMailer;
use crate::state::{AppState, Stores};
use crate::uploads::MemoryObjectStore;
use axum::Router;
use shoparena_core::memory::MemoryBackend;
use shoparena_core::{Account, AccountStore, AppConfig, NewAccount, Role};
use std::sync::Arc;

/// Password every seeded account starts with
pub const TEST_PASSWORD: &str = "Passw0rd!";

pub struct TestApp {
    pub state: Arc<AppState>,
    pub backend: MemoryBackend,
    pub mailer: Arc<RecordingMailer>,
    pub objects: Arc<MemoryObjectStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let backend = MemoryBackend::new();
        let mailer = Arc::new(RecordingMailer::default());
        let objects = Arc::new(MemoryObjectStore::default());

        let state = AppState::new(
            config,
            Stores::memory(&backend),
            mailer.clone(),
            objects.clone(),
        )
        .with_password_config(PasswordConfig::minimal());

        Self {
            state: Arc::new(state),
            backend,
            mailer,
            objects,
        }
    }

    pub fn router(&self) -> Router {
        crate::create_router(self.state.clone())
    }

    /// Insert an active account whose password is [`TEST_PASSWORD`]
    ///
    /// Phone numbers are derived from the username so seeded accounts never
    /// collide on it.
    pub async fn seed_account(&self, role: Role, username: &str, email: &str) -> Account {
        let password_hash = hash_password_with_config(TEST_PASSWORD, &PasswordConfig::minimal())
            .expect("hashing with minimal parameters");

        self.backend
            .accounts(role)
            .create(&NewAccount {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                first_name: "Test".to_string(),
                last_name: username.to_string(),
                phone: format!("080-{username}"),
                address: String::new(),
            })
            .await
            .expect("seeding account")
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Router over a fresh in-memory backend
pub fn create_router_for_testing() -> Router {
    TestApp::new().router()
}
