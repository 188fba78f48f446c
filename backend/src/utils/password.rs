use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::OnceLock;

/// Hashes `secret || pepper` with Argon2id and a fresh per-record salt.
///
/// Used for both account passwords and refresh tokens.
pub fn hash_password(secret: &str, pepper: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let peppered = peppered(secret, pepper);
    let password_hash = argon2
        .hash_password(peppered.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    Ok(password_hash.to_string())
}

/// Returns `Ok(false)` on mismatch; errors only when `hash` is not a valid PHC string.
pub fn verify_password(secret: &str, hash: &str, pepper: &str) -> anyhow::Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Invalid password hash: {}", e))?;

    let argon2 = Argon2::default();
    let peppered = peppered(secret, pepper);
    let result = argon2.verify_password(peppered.as_bytes(), &parsed_hash);

    match result {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification error: {}", e)),
    }
}

pub async fn hash_password_async(secret: String, pepper: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&secret, &pepper))
        .await
        .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))?
}

pub async fn verify_password_async(
    secret: String,
    hash: String,
    pepper: String,
) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&secret, &hash, &pepper))
        .await
        .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?
}

/// A valid hash of an unguessable value, verified against when an account is
/// missing so both login failure paths cost one Argon2 run.
pub fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(uuid::Uuid::new_v4().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .unwrap_or_default()
    })
}

fn peppered(secret: &str, pepper: &str) -> String {
    let mut value = String::with_capacity(secret.len() + pepper.len());
    value.push_str(secret);
    value.push_str(pepper);
    value
}
