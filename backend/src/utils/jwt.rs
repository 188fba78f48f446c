use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    models::user::{Identity, UserRole},
    types::UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub username: String,
    pub role: String,
    pub exp: i64,    // expiration time
    pub iat: i64,    // issued at
    pub jti: String, // JWT ID
}

impl Claims {
    pub fn new(identity: &Identity, ttl: Duration) -> Self {
        let now = Utc::now();
        let exp = now + ttl;

        Self {
            sub: identity.id.to_string(),
            username: identity.username.clone(),
            role: identity.role.as_str().to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.sub.parse().ok()
    }

    pub fn identity(&self) -> Option<Identity> {
        Some(Identity {
            id: self.user_id()?,
            username: self.username.clone(),
            role: UserRole::parse(&self.role)?,
        })
    }
}

/// A freshly minted token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Mints and verifies access and refresh tokens.
///
/// Access and refresh tokens are signed with independent secrets so a leaked
/// access key can never be used to forge refresh tokens and vice versa.
#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            &config.refresh_token_secret,
            config.access_token_ttl(),
            config.refresh_token_ttl(),
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access_token(&self, identity: &Identity) -> anyhow::Result<IssuedToken> {
        sign(Claims::new(identity, self.access_ttl), &self.access_encoding)
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> anyhow::Result<IssuedToken> {
        sign(Claims::new(identity, self.refresh_ttl), &self.refresh_encoding)
    }

    /// Returns `None` for any malformed, tampered, or expired token.
    pub fn verify_access_token(&self, token: &str) -> Option<Claims> {
        verify(token, &self.access_decoding)
    }

    /// Returns `None` for any malformed, tampered, or expired token.
    pub fn verify_refresh_token(&self, token: &str) -> Option<Claims> {
        verify(token, &self.refresh_decoding)
    }
}

fn sign(claims: Claims, key: &EncodingKey) -> anyhow::Result<IssuedToken> {
    let token = encode(&Header::new(Algorithm::HS256), &claims, key)?;
    Ok(IssuedToken { token, claims })
}

fn verify(token: &str, key: &DecodingKey) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    match decode::<Claims>(token, key, &validation) {
        Ok(data) => Some(data.claims),
        Err(err) => {
            tracing::debug!(error = %err, "token rejected");
            None
        }
    }
}
