pub mod memory;
pub mod refresh_token;
pub mod user;

pub use refresh_token::{PgRefreshTokenRepository, RefreshTokenRepository};
pub use user::{PgUserRepository, UserRepository};
