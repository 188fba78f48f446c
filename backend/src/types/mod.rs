pub mod id;

pub use id::{RefreshTokenId, UserId};
