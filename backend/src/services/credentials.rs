use std::sync::Arc;

use crate::{
    error::AuthError,
    models::user::Identity,
    repositories::user::UserRepository,
    utils::password::{dummy_hash, verify_password_async},
};

/// Checks an email/password pair against the stored Argon2 hash.
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn UserRepository>,
    pepper: String,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserRepository>, pepper: String) -> Self {
        Self { users, pepper }
    }

    /// Unknown email and wrong password both yield `InvalidCredentials`, and
    /// both pay for exactly one hash verification.
    pub async fn verify(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let user = self
            .users
            .find_by_email(email.trim())
            .await
            .map_err(AuthError::StoreFailure)?;

        let hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => dummy_hash().to_string(),
        };

        let matches = verify_password_async(password.to_string(), hash, self.pepper.clone())
            .await
            .map_err(|err| {
                // A corrupt stored hash is an operator problem, not a caller one.
                tracing::error!(error = %err, "Password hash verification failed");
                AuthError::InvalidCredentials
            })?;

        match user {
            Some(user) if matches => Ok(Identity::from(&user)),
            Some(user) => {
                tracing::debug!(user_id = %user.id, "Password mismatch");
                Err(AuthError::InvalidCredentials)
            }
            None => Err(AuthError::InvalidCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::user::{User, UserRole},
        repositories::user::MockUserRepository,
        utils::password::hash_password,
    };

    const PEPPER: &str = "pepper";

    fn alice() -> User {
        User::new(
            "alice".into(),
            "alice@example.com".into(),
            hash_password("correct horse", PEPPER).unwrap(),
            UserRole::User,
        )
    }

    fn verifier(mock: MockUserRepository) -> CredentialVerifier {
        CredentialVerifier::new(Arc::new(mock), PEPPER.to_string())
    }

    #[tokio::test]
    async fn correct_password_yields_identity() {
        let user = alice();
        let expected = Identity::from(&user);
        let mut mock = MockUserRepository::new();
        mock.expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let identity = verifier(mock)
            .verify("alice@example.com", "correct horse")
            .await
            .expect("verify");
        assert_eq!(identity, expected);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_alike() {
        let user = alice();
        let mut known = MockUserRepository::new();
        known
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));
        let mut unknown = MockUserRepository::new();
        unknown.expect_find_by_email().returning(|_| Ok(None));

        let wrong = verifier(known).verify("alice@example.com", "nope").await;
        let missing = verifier(unknown).verify("ghost@example.com", "nope").await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
        assert!(matches!(missing, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn pepper_is_part_of_the_secret() {
        let user = alice();
        let mut mock = MockUserRepository::new();
        mock.expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let other_pepper = CredentialVerifier::new(Arc::new(mock), "other".into());
        assert!(other_pepper
            .verify("alice@example.com", "correct horse")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn repository_failure_is_a_store_failure() {
        let mut mock = MockUserRepository::new();
        mock.expect_find_by_email()
            .returning(|_| Err(anyhow::anyhow!("pool timed out")));

        let result = verifier(mock).verify("alice@example.com", "x").await;
        assert!(matches!(result, Err(AuthError::StoreFailure(_))));
    }
}
