use crate::api::{LoginResponse, RefreshResponse, UserResponse};

/// Credentials the client currently holds.
///
/// Passed by `&mut` into every authorized call so a transparent refresh can
/// swap the tokens in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserResponse>,
}

impl AuthSession {
    pub fn from_login(response: &LoginResponse) -> Self {
        Self {
            access_token: Some(response.access_token.clone()),
            refresh_token: Some(response.refresh_token.clone()),
            user: Some(response.user.clone()),
        }
    }

    /// Adopts a refreshed pair. The refresh token is kept when the server
    /// answered without rotating it.
    pub fn apply_refresh(&mut self, response: &RefreshResponse) {
        self.access_token = Some(response.access_token.clone());
        if let Some(refresh_token) = &response.refresh_token {
            self.refresh_token = Some(refresh_token.clone());
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}
