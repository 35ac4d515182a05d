use super::{types::PushCodeRequest, valid_email};
use crate::registration::{RegistrationError, RegistrationGate};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, instrument};

#[utoipa::path(
    post,
    path = "/v1/email/push-code",
    request_body = PushCodeRequest,
    responses(
        (status = 202, description = "Verification code mailed"),
        (status = 400, description = "Missing payload or invalid email"),
        (status = 409, description = "User with the specified email already exists"),
        (status = 502, description = "Mail relay did not accept the message"),
        (status = 500, description = "Database failure")
    ),
    tag = "email"
)]
#[instrument(skip(registration, payload))]
pub async fn push_code(
    registration: Extension<Arc<RegistrationGate>>,
    payload: Option<Json<PushCodeRequest>>,
) -> impl IntoResponse {
    let request: PushCodeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()),
    };

    let email = request.email.trim().to_lowercase();

    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string());
    }

    match registration.send_code(&email).await {
        Ok(()) => (StatusCode::ACCEPTED, String::new()),
        Err(RegistrationError::UserAlreadyExists) => {
            (StatusCode::CONFLICT, "User already exists".to_string())
        }
        Err(RegistrationError::MailDispatchFailed) => (
            StatusCode::BAD_GATEWAY,
            "Verification mail could not be sent".to_string(),
        ),
        Err(err) => {
            error!("Failed to push verification code: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}
