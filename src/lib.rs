//! # Tollgate (session tokens & email verification)
//!
//! `tollgate` issues signed session tokens backed by a key-value store and gates account
//! creation behind short-lived email verification codes.
//!
//! ## Sessions
//!
//! A login mints an access token (HS256 JWT) and records two entries in the store, keyed by
//! user id: `access:{id}` holding the current token and `refresh:{id}` holding the claims.
//! The signature decides authenticity and the store decides liveness:
//!
//! - **One session per user:** a newer login replaces both entries, so older tokens stop
//!   validating.
//! - **Renewal:** an access token past its expiry is replaced as long as the refresh entry
//!   lives. The renewed token stops validating when the refresh entry expires.
//! - **Logout** deletes both entries; every later check fails.
//!
//! ## Verification codes
//!
//! Codes are 7-digit numbers kept in memory per email for a bounded window. A code is consumed
//! on the first correct guess and burned after a fixed number of wrong guesses.
//!
//! ## Surfaces
//!
//! The HTTP API (`axum`) is documented with `OpenAPI`; the `openapi` binary prints the
//! document and the server serves it under `/swagger-ui`.

pub mod api;
pub mod auth;
pub mod cli;
pub mod directory;
pub mod mail;
pub mod registration;
pub mod session;
pub mod verification;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
