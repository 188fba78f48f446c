pub mod credentials;
pub mod refresh_token_store;

pub use credentials::CredentialVerifier;
pub use refresh_token_store::RefreshTokenStore;
