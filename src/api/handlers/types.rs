//! Request/response bodies.

use crate::{directory::UserRecord, session::Claims};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    /// `user` or `admin`.
    pub role: String,
}

impl From<&Claims> for UserResponse {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.subject_id,
            email: claims.email.clone(),
            role: claims.role.as_str().to_string(),
        }
    }
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role.as_str().to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CheckResponse {
    pub user: UserResponse,
    /// Present when the access token was renewed; the client must use it from now on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PushCodeRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub authorization_code: u32,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CreateUserResponse {
    pub id: i64,
}
