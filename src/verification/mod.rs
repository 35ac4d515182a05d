//! Short-lived, attempt-limited email verification codes.
//!
//! Entries live in memory only. Nothing sweeps them: a dead entry is removed the next time a
//! check observes it, and until then `exists` still reports it.

use rand::{rngs::OsRng, Rng};
use std::{collections::HashMap, time::Duration};
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, instrument};

pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const CODE_RANGE: std::ops::RangeInclusive<u32> = 1_000_000..=9_999_999;

#[derive(Debug)]
struct Entry {
    code: u32,
    created_at: Instant,
    attempts: u32,
}

#[derive(Debug)]
pub struct CodeStore {
    entries: RwLock<HashMap<String, Entry>>,
    validity: Duration,
    max_attempts: u32,
}

impl Default for CodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            validity: DEFAULT_VALIDITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub const fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Values below one are raised to one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub const fn validity(&self) -> Duration {
        self.validity
    }

    /// Draw a fresh 7-digit code for `email`, replacing any previous one.
    #[instrument(skip(self))]
    pub async fn issue_code(&self, email: &str) -> u32 {
        let code = OsRng.gen_range(CODE_RANGE);
        self.entries.write().await.insert(
            email.to_string(),
            Entry {
                code,
                created_at: Instant::now(),
                attempts: 0,
            },
        );
        debug!("verification code issued");
        code
    }

    /// Consume the code for `email` if it matches.
    ///
    /// A match deletes the entry. A mismatch counts an attempt and deletes the entry once the
    /// attempts run out. An entry older than the validity window is deleted without comparing.
    #[instrument(skip(self, submitted))]
    pub async fn check_code(&self, email: &str, submitted: u32) -> bool {
        let mut entries = self.entries.write().await;

        let Some(entry) = entries.get_mut(email) else {
            return false;
        };

        if entry.created_at.elapsed() >= self.validity {
            entries.remove(email);
            debug!("verification code expired");
            return false;
        }

        if entry.code == submitted {
            entries.remove(email);
            return true;
        }

        entry.attempts += 1;
        if entry.attempts >= self.max_attempts {
            entries.remove(email);
            debug!("verification code attempts exhausted");
        }
        false
    }

    /// Raw presence, stale entries included.
    pub async fn exists(&self, email: &str) -> bool {
        self.entries.read().await.contains_key(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const EMAIL: &str = "a@x.com";

    fn wrong(code: u32) -> u32 {
        if code == *CODE_RANGE.end() {
            code - 1
        } else {
            code + 1
        }
    }

    #[tokio::test]
    async fn code_is_seven_digits() {
        let store = CodeStore::new();
        for _ in 0..100 {
            let code = store.issue_code(EMAIL).await;
            assert!(CODE_RANGE.contains(&code));
        }
    }

    #[tokio::test]
    async fn correct_code_matches_exactly_once() {
        let store = CodeStore::new();
        let code = store.issue_code(EMAIL).await;

        assert!(store.check_code(EMAIL, code).await);
        assert!(!store.check_code(EMAIL, code).await);
        assert!(!store.exists(EMAIL).await);
    }

    #[tokio::test]
    async fn three_wrong_guesses_burn_the_code() {
        let store = CodeStore::new();
        let code = store.issue_code(EMAIL).await;

        for _ in 0..2 {
            assert!(!store.check_code(EMAIL, wrong(code)).await);
            assert!(store.exists(EMAIL).await);
        }
        assert!(!store.check_code(EMAIL, wrong(code)).await);
        assert!(!store.exists(EMAIL).await);

        assert!(!store.check_code(EMAIL, code).await);
    }

    #[tokio::test]
    async fn wrong_guess_below_limit_keeps_code_usable() {
        let store = CodeStore::new();
        let code = store.issue_code(EMAIL).await;

        assert!(!store.check_code(EMAIL, wrong(code)).await);
        assert!(store.check_code(EMAIL, code).await);
    }

    #[tokio::test]
    async fn reissue_resets_attempts() {
        let store = CodeStore::new();
        let first = store.issue_code(EMAIL).await;
        assert!(!store.check_code(EMAIL, wrong(first)).await);
        assert!(!store.check_code(EMAIL, wrong(first)).await);

        let second = store.issue_code(EMAIL).await;
        assert!(!store.check_code(EMAIL, wrong(second)).await);
        assert!(!store.check_code(EMAIL, wrong(second)).await);
        assert!(store.check_code(EMAIL, second).await);
    }

    #[tokio::test]
    async fn unknown_email_never_matches() {
        let store = CodeStore::new();
        assert!(!store.check_code(EMAIL, 1_234_567).await);
        assert!(!store.exists(EMAIL).await);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_lingers_until_checked() {
        let store = CodeStore::new();
        let code = store.issue_code(EMAIL).await;

        tokio::time::advance(DEFAULT_VALIDITY).await;

        assert!(store.exists(EMAIL).await);
        assert!(!store.check_code(EMAIL, code).await);
        assert!(!store.exists(EMAIL).await);
    }

    #[tokio::test(start_paused = true)]
    async fn code_valid_just_inside_window() {
        let store = CodeStore::new().with_validity(Duration::from_secs(10));
        let code = store.issue_code(EMAIL).await;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.check_code(EMAIL, code).await);
    }

    #[tokio::test]
    async fn max_attempts_is_at_least_one() {
        let store = CodeStore::new().with_max_attempts(0);
        let code = store.issue_code(EMAIL).await;

        assert!(!store.check_code(EMAIL, wrong(code)).await);
        assert!(!store.exists(EMAIL).await);
    }

    async fn concurrent_wrong_guesses(guesses: u32) -> bool {
        let store = Arc::new(CodeStore::new());
        let code = store.issue_code(EMAIL).await;

        let tasks: Vec<_> = (0..guesses)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.check_code(EMAIL, wrong(code)).await })
            })
            .collect();
        for task in tasks {
            assert!(!task.await.unwrap_or(true));
        }

        store.exists(EMAIL).await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_guesses_remove_entry_iff_limit_reached() {
        for guesses in 1..=6 {
            let present = concurrent_wrong_guesses(guesses).await;
            assert_eq!(present, guesses < DEFAULT_MAX_ATTEMPTS, "{guesses} guesses");
        }
    }
}
