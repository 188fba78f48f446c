use std::sync::Arc;

use crate::{
    config::Config,
    db::connection::DbPool,
    repositories::{
        refresh_token::{PgRefreshTokenRepository, RefreshTokenRepository},
        user::{PgUserRepository, UserRepository},
    },
    services::{credentials::CredentialVerifier, refresh_token_store::RefreshTokenStore},
    utils::{cookies::CookieOptions, jwt::TokenIssuer},
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: RefreshTokenStore,
    pub tokens: TokenIssuer,
    pub credentials: CredentialVerifier,
    pub config: Config,
}

impl AppState {
    /// Wires the PostgreSQL repositories.
    pub fn new(pool: DbPool, config: Config) -> Self {
        Self::from_repositories(
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgRefreshTokenRepository::new(pool)),
            config,
        )
    }

    pub fn from_repositories(
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        config: Config,
    ) -> Self {
        let tokens = TokenIssuer::from_config(&config);
        let refresh_tokens = RefreshTokenStore::new(
            refresh_tokens,
            config.password_pepper.clone(),
            config.refresh_token_ttl(),
        );
        let credentials = CredentialVerifier::new(users.clone(), config.password_pepper.clone());
        Self {
            users,
            refresh_tokens,
            tokens,
            credentials,
            config,
        }
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            secure: self.config.cookie_secure,
            same_site: self.config.cookie_same_site,
        }
    }
}
