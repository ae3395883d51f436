pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod storage;

use config::Config;
use std::sync::Arc;

use crate::auth::TokenService;
use crate::db::DocumentStore;
use crate::storage::FileStorage;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn FileStorage>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>, storage: Arc<dyn FileStorage>) -> Self {
        let secret = config.auth.resolve_secret();
        let tokens = TokenService::new(secret.as_bytes(), config.auth.token_ttl());
        Self {
            config,
            store,
            storage,
            tokens,
        }
    }
}
