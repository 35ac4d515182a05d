//! Argon2id password hashing.

use super::DirectoryError;
use argon2::{
    password_hash::{self, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};
use rand::rngs::OsRng;

#[derive(Clone, Debug, Default)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    #[must_use]
    pub const fn new(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `password` into a PHC string with a fresh salt.
    ///
    /// # Errors
    /// Returns `DirectoryError::Hash` if Argon2 rejects the input.
    pub fn hash(&self, password: &str) -> Result<String, DirectoryError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| DirectoryError::Hash(err.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch, errors only for an unreadable stored hash.
    ///
    /// # Errors
    /// Returns `DirectoryError::Hash` if `stored_hash` is not a valid PHC string.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, DirectoryError> {
        let parsed =
            PasswordHash::new(stored_hash).map_err(|err| DirectoryError::Hash(err.to_string()))?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(DirectoryError::Hash(err.to_string())),
        }
    }

    /// [`Self::hash`] on the blocking pool.
    ///
    /// # Errors
    /// Same as [`Self::hash`], or `DirectoryError::Hash` if the blocking task dies.
    pub async fn hash_blocking(&self, password: String) -> Result<String, DirectoryError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| DirectoryError::Hash(err.to_string()))?
    }

    /// [`Self::verify`] on the blocking pool.
    ///
    /// # Errors
    /// Same as [`Self::verify`], or `DirectoryError::Hash` if the blocking task dies.
    pub async fn verify_blocking(
        &self,
        password: String,
        stored_hash: String,
    ) -> Result<bool, DirectoryError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|err| DirectoryError::Hash(err.to_string()))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn lightweight() -> CredentialHasher {
    CredentialHasher::new(Params::new(1024, 1, 1, None).unwrap())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hasher = lightweight();
        let hash = hasher.hash("secret1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret1", &hash).unwrap());
        assert!(!hasher.verify("secret2", &hash).unwrap());
    }

    #[test]
    fn salts_differ() {
        let hasher = lightweight();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[tokio::test]
    async fn blocking_variants_agree() {
        let hasher = lightweight();
        let hash = hasher.hash_blocking("secret1".to_string()).await.unwrap();
        assert!(hasher
            .verify_blocking("secret1".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!hasher.verify_blocking("nope".to_string(), hash).await.unwrap());
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert!(matches!(
            lightweight().verify("secret", "not-a-phc-string"),
            Err(DirectoryError::Hash(_))
        ));
    }
}
