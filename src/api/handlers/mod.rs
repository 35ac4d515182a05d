//! API handlers and the helpers they share: input validation, token extraction and the
//! session cookie.

pub mod auth;
pub mod email;
pub mod health;
pub mod types;
pub mod user;

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use regex::Regex;
use std::time::Duration;

/// Name of the cookie carrying the access token.
pub const SESSION_COOKIE_NAME: &str = "Authorization";

const PASSWORD_MIN_CHARS: usize = 4;
const PASSWORD_MAX_CHARS: usize = 25;

/// Lightweight email sanity check.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// 4 to 25 latin or cyrillic letters and digits.
pub fn valid_password(password: &str) -> bool {
    let chars = password.chars().count();
    if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&chars) {
        return false;
    }
    Regex::new(r"^[A-Za-z0-9А-Яа-я]+$").is_ok_and(|re| re.is_match(password))
}

/// Cookie attributes shared by every handler that sets the session cookie.
#[derive(Clone, Copy, Debug)]
pub struct CookieConfig {
    secure: bool,
    max_age: Duration,
}

impl CookieConfig {
    #[must_use]
    pub const fn new(max_age: Duration) -> Self {
        Self {
            secure: false,
            max_age,
        }
    }

    /// Only mark cookies secure when served over HTTPS.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

/// `HttpOnly` cookie carrying the access token, living as long as the refresh entry.
pub fn session_cookie(
    config: CookieConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = config.max_age.as_secs();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if config.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_session_cookie(config: CookieConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Access token from the `Authorization` header (bearer or raw) or else the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_authorization_header(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        // Valueless pairs like `flag` are skipped, not treated as the end.
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        let (key, val) = (key.trim(), val.trim());
        if key == SESSION_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_authorization_header(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = match trimmed.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        // A bare scheme carries no token.
        None if trimmed.eq_ignore_ascii_case("bearer") => "",
        _ => trimmed,
    };
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        auth::AuthService,
        directory::{password::lightweight, MemoryUserDirectory, UserDirectory},
        mail::testing::RecordingMailSender,
        registration::RegistrationGate,
        session::{CredentialCodec, MemoryBackend, SessionStore, TokenTtl},
        verification::CodeStore,
    };
    use axum::body::{to_bytes, Body};
    use secrecy::SecretString;
    use serde::de::DeserializeOwned;
    use std::{sync::Arc, time::Duration};

    use super::CookieConfig;

    pub const PASSWORD: &str = "secret1";

    pub struct TestServices {
        pub auth: Arc<AuthService>,
        pub registration: Arc<RegistrationGate>,
        pub directory: Arc<dyn UserDirectory>,
        pub sessions: Arc<SessionStore>,
        pub codes: Arc<CodeStore>,
        pub mail: Arc<RecordingMailSender>,
        pub cookies: CookieConfig,
    }

    pub fn services() -> TestServices {
        services_with(RecordingMailSender::default())
    }

    pub fn services_with(mail: RecordingMailSender) -> TestServices {
        let ttl = TokenTtl {
            access: Duration::from_secs(60),
            refresh: Duration::from_secs(600),
        };
        let directory: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
        let codec = CredentialCodec::new(&SecretString::from("secret".to_string()));
        let sessions = Arc::new(SessionStore::new(Arc::new(MemoryBackend::new()), codec));
        let codes = Arc::new(CodeStore::new());
        let mail = Arc::new(mail);

        TestServices {
            auth: Arc::new(AuthService::new(
                directory.clone(),
                lightweight(),
                sessions.clone(),
                ttl,
            )),
            registration: Arc::new(RegistrationGate::new(
                codes.clone(),
                mail.clone(),
                directory.clone(),
                lightweight(),
            )),
            directory,
            sessions,
            codes,
            mail,
            cookies: CookieConfig::new(ttl.refresh),
        }
    }

    impl TestServices {
        /// Register `email` with [`PASSWORD`] and return its id.
        pub async fn user(&self, email: &str) -> i64 {
            let hash = lightweight().hash(PASSWORD).unwrap_or_default();
            self.directory
                .insert(email, &hash, crate::session::Role::User)
                .await
                .unwrap_or_default()
        }
    }

    pub async fn json_body<T: DeserializeOwned>(body: Body) -> Option<T> {
        let bytes = to_bytes(body, usize::MAX).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("spaces in@example.com"));
    }

    #[test]
    fn valid_password_bounds() {
        assert!(valid_password("abcd"));
        assert!(valid_password(&"a".repeat(25)));
        assert!(!valid_password("abc"));
        assert!(!valid_password(&"a".repeat(26)));
    }

    #[test]
    fn valid_password_alphabet() {
        assert!(valid_password("Пароль123"));
        assert!(valid_password("Secret42"));
        assert!(!valid_password("with space"));
        assert!(!valid_password("symbols!!"));
    }

    #[test]
    fn token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_token(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn token_from_raw_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("abc.def"));
        assert_eq!(extract_token(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; Authorization=abc.def"),
        );
        assert_eq!(extract_token(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        headers.insert(COOKIE, HeaderValue::from_static("Authorization=cookie"));
        assert_eq!(extract_token(&headers), Some("header".to_string()));
    }

    #[test]
    fn no_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        headers.insert(COOKIE, HeaderValue::from_static("Authorization="));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn bare_bearer_scheme_is_no_token() {
        for value in ["Bearer", "Bearer ", "BEARER   "] {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
            assert_eq!(extract_token(&headers), None, "header {value:?}");
        }

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("BEARER abc.def"));
        assert_eq!(extract_token(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn valueless_cookie_does_not_hide_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("flag; Authorization=abc.def"));
        assert_eq!(extract_token(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn cookie_attributes() {
        let config = CookieConfig::new(Duration::from_secs(600));
        let cookie = session_cookie(config, "abc").ok();
        assert_eq!(
            cookie.as_ref().and_then(|value| value.to_str().ok()),
            Some("Authorization=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=600")
        );

        let cleared = clear_session_cookie(config.with_secure(true)).ok();
        assert_eq!(
            cleared.as_ref().and_then(|value| value.to_str().ok()),
            Some("Authorization=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure")
        );
    }
}
