//! Session endpoints for cookie and header auth.

use super::{
    clear_session_cookie, extract_token, session_cookie,
    types::{CheckResponse, LoginRequest, TokenResponse, UserResponse},
    valid_email, valid_password, CookieConfig,
};
use crate::auth::{AuthError, AuthService, Credentials, SessionCheck};
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

fn auth_error_response(err: &AuthError) -> Response {
    match err {
        AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()).into_response()
        }
        AuthError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn cookie_headers(cookies: CookieConfig, token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match session_cookie(cookies, token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }
    headers
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened, token also set as cookie", body = TokenResponse),
        (status = 400, description = "Missing payload or invalid email/password format"),
        (status = 401, description = "Unknown email or wrong password"),
        (status = 500, description = "Session store or database failure")
    ),
    tag = "auth"
)]
#[instrument(skip(auth, cookies, payload))]
pub async fn login(
    auth: Extension<Arc<AuthService>>,
    cookies: Extension<CookieConfig>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = request.email.trim().to_lowercase();

    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    if !valid_password(&request.password) {
        return (StatusCode::BAD_REQUEST, "Invalid password".to_string()).into_response();
    }

    let credentials = Credentials {
        email,
        password: request.password,
    };

    match auth.login(credentials).await {
        Ok(token) => {
            let headers = cookie_headers(cookies.0, &token);
            (StatusCode::OK, headers, Json(TokenResponse { token })).into_response()
        }
        Err(err) => {
            debug!("login rejected: {err}");
            auth_error_response(&err)
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/check",
    responses(
        (status = 200, description = "Session is active; `token` is set when it was renewed", body = CheckResponse),
        (status = 401, description = "Missing, revoked or foreign token"),
        (status = 500, description = "Session store failure")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn check(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    cookies: Extension<CookieConfig>,
) -> impl IntoResponse {
    let Some(token) = extract_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match auth.check_session(&token).await {
        Ok(SessionCheck::Active(claims)) => {
            let response = CheckResponse {
                user: UserResponse::from(&claims),
                token: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(SessionCheck::Renewed { claims, token }) => {
            debug!(user_id = claims.subject_id, "access token renewed");
            let headers = cookie_headers(cookies.0, &token);
            let response = CheckResponse {
                user: UserResponse::from(&claims),
                token: Some(token),
            };
            (StatusCode::OK, headers, Json(response)).into_response()
        }
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session revoked and cookie cleared"),
        (status = 401, description = "Missing or foreign token"),
        (status = 500, description = "Session store failure")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    cookies: Extension<CookieConfig>,
) -> impl IntoResponse {
    let Some(token) = extract_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    if let Err(err) = auth.logout(&token).await {
        return auth_error_response(&err);
    }

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(cookies.0) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}
