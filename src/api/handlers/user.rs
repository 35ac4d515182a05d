use super::{
    types::{CreateUserRequest, CreateUserResponse, UserResponse},
    valid_email, valid_password,
};
use crate::{
    directory::UserDirectory,
    registration::{NewUser, RegistrationError, RegistrationGate},
};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, instrument};

#[utoipa::path(
    post,
    path = "/v1/user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreateUserResponse),
        (status = 400, description = "Missing payload, invalid email/password or wrong verification code"),
        (status = 409, description = "User with the specified email already exists"),
        (status = 500, description = "Database or hashing failure")
    ),
    tag = "user"
)]
#[instrument(skip(registration, payload))]
pub async fn create(
    registration: Extension<Arc<RegistrationGate>>,
    payload: Option<Json<CreateUserRequest>>,
) -> impl IntoResponse {
    let request: CreateUserRequest = match payload {
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

    let user = NewUser {
        email,
        password: request.password,
        code: request.authorization_code,
    };

    match registration.register(user).await {
        Ok(id) => (StatusCode::CREATED, Json(CreateUserResponse { id })).into_response(),
        Err(RegistrationError::InvalidCode) => {
            (StatusCode::BAD_REQUEST, "Invalid authorization code".to_string()).into_response()
        }
        Err(RegistrationError::UserAlreadyExists) => {
            (StatusCode::CONFLICT, "User already exists".to_string()).into_response()
        }
        Err(err) => {
            error!("Failed to create user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/user/{value}",
    params(
        ("value" = String, Path, description = "Numeric user id or email address")
    ),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, description = "Value is neither a positive id nor an email"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Database failure")
    ),
    tag = "user"
)]
#[instrument(skip(directory))]
pub async fn get(
    Path(value): Path<String>,
    directory: Extension<Arc<dyn UserDirectory>>,
) -> impl IntoResponse {
    let value = value.trim();

    let lookup = match value.parse::<i64>() {
        Ok(id) if id > 0 => directory.find_by_id(id).await,
        Ok(_) => return (StatusCode::BAD_REQUEST, "Invalid user id".to_string()).into_response(),
        Err(_) => {
            let email = value.to_lowercase();
            if !valid_email(&email) {
                return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
            }
            directory.find_by_email(&email).await
        }
    };

    match lookup {
        Ok(Some(user)) => (StatusCode::OK, Json(UserResponse::from(user))).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to look up user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::handlers::test_support::{json_body, services, TestServices};
    use axum::response::Response;

    fn request(email: &str, password: &str, code: u32) -> Option<Json<CreateUserRequest>> {
        Some(Json(CreateUserRequest {
            email: email.to_string(),
            password: password.to_string(),
            authorization_code: code,
        }))
    }

    async fn do_create(services: &TestServices, email: &str, code: u32) -> Response {
        create(
            Extension(services.registration.clone()),
            request(email, "secret1", code),
        )
        .await
        .into_response()
    }

    async fn do_get(services: &TestServices, value: &str) -> Response {
        get(Path(value.to_string()), Extension(services.directory.clone()))
            .await
            .into_response()
    }

    #[tokio::test]
    async fn create_with_valid_code() {
        let services = services();
        let code = services.codes.issue_code("a@x.com").await;

        let response = do_create(&services, "A@x.com", code).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: CreateUserResponse = json_body(response.into_body()).await.unwrap();
        let user = services.directory.find_by_id(body.id).await.unwrap().unwrap();
        assert_eq!(user.email, "a@x.com");
    }

    #[tokio::test]
    async fn create_with_wrong_code_is_bad_request() {
        let services = services();
        let code = services.codes.issue_code("a@x.com").await;
        let wrong = if code == 9_999_999 { code - 1 } else { code + 1 };

        let response = do_create(&services, "a@x.com", wrong).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(services.directory.find_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_existing_user_conflicts() {
        let services = services();
        services.user("a@x.com").await;
        let code = services.codes.issue_code("a@x.com").await;

        let response = do_create(&services, "a@x.com", code).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_validation() {
        let services = services();
        let response = create(Extension(services.registration.clone()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = create(
            Extension(services.registration.clone()),
            request("a@x.com", "bad password!", 1_234_567),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_by_id_and_email() {
        let services = services();
        let id = services.user("a@x.com").await;

        let response = do_get(&services, &id.to_string()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: UserResponse = json_body(response.into_body()).await.unwrap();
        assert_eq!(body.email, "a@x.com");
        assert_eq!(body.role, "user");

        let response = do_get(&services, "A@X.com").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: UserResponse = json_body(response.into_body()).await.unwrap();
        assert_eq!(body.id, id);
    }

    #[tokio::test]
    async fn get_unknown_and_invalid() {
        let services = services();
        assert_eq!(do_get(&services, "42").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            do_get(&services, "b@x.com").await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(do_get(&services, "0").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(do_get(&services, "-3").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            do_get(&services, "nobody").await.status(),
            StatusCode::BAD_REQUEST
        );
    }
}
