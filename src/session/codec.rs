//! Signed, expiring credential claims.
//!
//! Tokens are HS256 JWTs signed with the process-wide secret. The expiry lives inside the
//! signed payload, so the store TTL can never extend a token's logical life. Signature
//! validation and expiry are checked separately so an expired token still yields its
//! subject (renewal needs it), while anything that fails the signature is `Malformed`.

use jsonwebtoken::{
    decode, encode, errors::Error as JwtError, get_current_timestamp, Algorithm, DecodingKey,
    EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use ulid::Ulid;

#[derive(Debug, Error)]
#[error("failed to sign token: {0}")]
pub struct CodecError(#[from] JwtError);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::User => 0,
            Self::Admin => 1,
        }
    }

    #[must_use]
    pub const fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::User),
            1 => Some(Self::Admin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// Who a token is issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

/// The signed payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "uid")]
    pub subject_id: i64,
    pub email: String,
    pub role: Role,
    /// Unix seconds.
    #[serde(rename = "exp")]
    pub expires_at: u64,
    #[serde(rename = "jti")]
    pub token_id: String,
}

impl Claims {
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.subject_id,
            email: self.email.clone(),
            role: self.role,
        }
    }

    /// Seconds left before `expires_at`, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        Duration::from_secs(self.expires_at.saturating_sub(get_current_timestamp()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Expired,
    Malformed,
}

/// Outcome of [`CredentialCodec::parse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parsed {
    Valid(Claims),
    /// Signature verified but `expires_at` has passed.
    Expired(Claims),
    Malformed,
}

impl Parsed {
    #[must_use]
    pub const fn status(&self) -> TokenStatus {
        match self {
            Self::Valid(_) => TokenStatus::Valid,
            Self::Expired(_) => TokenStatus::Expired,
            Self::Malformed => TokenStatus::Malformed,
        }
    }

    /// Claims whose signature verified, expired or not.
    #[must_use]
    pub fn signed_claims(self) -> Option<Claims> {
        match self {
            Self::Valid(claims) | Self::Expired(claims) => Some(claims),
            Self::Malformed => None,
        }
    }
}

pub struct CredentialCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl CredentialCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let key = secret.expose_secret().as_bytes();

        // Expiry is checked by hand in `parse` so expired claims stay readable.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
        }
    }

    /// Sign a new token for `principal` expiring `ttl` from now.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be serialized or signed.
    pub fn mint(&self, principal: &Principal, ttl: Duration) -> Result<String, CodecError> {
        let claims = Claims {
            subject_id: principal.id,
            email: principal.email.clone(),
            role: principal.role,
            expires_at: get_current_timestamp().saturating_add(ttl.as_secs()),
            token_id: Ulid::new().to_string(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    #[must_use]
    pub fn parse(&self, token: &str) -> Parsed {
        let Ok(data) = decode::<Claims>(token, &self.decoding, &self.validation) else {
            return Parsed::Malformed;
        };

        let claims = data.claims;
        if claims.subject_id <= 0 {
            return Parsed::Malformed;
        }

        if get_current_timestamp() >= claims.expires_at {
            Parsed::Expired(claims)
        } else {
            Parsed::Valid(claims)
        }
    }
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("algorithm", &"HS256")
            .field("secret", &"***")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn codec(secret: &str) -> CredentialCodec {
        CredentialCodec::new(&SecretString::from(secret.to_string()))
    }

    fn principal() -> Principal {
        Principal {
            id: 42,
            email: "a@x.com".to_string(),
            role: Role::Admin,
        }
    }

    #[test]
    fn mint_then_parse_is_valid_with_same_claims() {
        let codec = codec("secret");
        let before = get_current_timestamp();
        let token = codec.mint(&principal(), Duration::from_secs(60)).unwrap();

        let Parsed::Valid(claims) = codec.parse(&token) else {
            panic!("expected a valid token");
        };
        assert_eq!(claims.principal(), principal());
        assert!(claims.expires_at >= before + 60);
        assert!(claims.expires_at <= get_current_timestamp() + 60);
        assert!(!claims.token_id.is_empty());
    }

    #[test]
    fn zero_ttl_is_expired_but_keeps_subject() {
        let codec = codec("secret");
        let token = codec.mint(&principal(), Duration::ZERO).unwrap();

        let parsed = codec.parse(&token);
        assert_eq!(parsed.status(), TokenStatus::Expired);
        let claims = parsed.signed_claims().unwrap();
        assert_eq!(claims.subject_id, 42);
        assert_eq!(claims.email, "a@x.com");
    }

    #[test]
    fn other_secret_is_malformed() {
        let token = codec("secret").mint(&principal(), Duration::from_secs(60)).unwrap();
        assert_eq!(codec("other").parse(&token), Parsed::Malformed);
    }

    #[test]
    fn flipping_any_byte_never_validates() {
        let codec = codec("secret");
        let token = codec.mint(&principal(), Duration::from_secs(60)).unwrap();

        for index in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            assert_eq!(
                codec.parse(&tampered).status(),
                TokenStatus::Malformed,
                "byte {index} flipped"
            );
        }
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec("secret");
        assert_eq!(codec.parse(""), Parsed::Malformed);
        assert_eq!(codec.parse("not.a.token"), Parsed::Malformed);
    }

    #[test]
    fn non_positive_subject_is_malformed() {
        let codec = codec("secret");
        let mut nobody = principal();
        nobody.id = 0;
        let token = codec.mint(&nobody, Duration::from_secs(60)).unwrap();
        assert_eq!(codec.parse(&token), Parsed::Malformed);
    }

    #[test]
    fn tokens_are_unique_per_mint() {
        let codec = codec("secret");
        let first = codec.mint(&principal(), Duration::from_secs(60)).unwrap();
        let second = codec.mint(&principal(), Duration::from_secs(60)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn role_round_trips_through_i16() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(Role::from_i16(role.as_i16()), Some(role));
        }
        assert_eq!(Role::from_i16(7), None);
    }

    #[test]
    fn debug_hides_secret() {
        let debug = format!("{:?}", codec("hunter2"));
        assert!(!debug.contains("hunter2"));
    }
}
