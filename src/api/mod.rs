use crate::{
    api::handlers::{health, CookieConfig},
    auth::AuthService,
    directory::UserDirectory,
    registration::RegistrationGate,
    session::SessionStore,
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    routing::options,
    Extension, Router,
};
use std::{
    future::{pending, Future},
    sync::Arc,
    time::Duration,
};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Everything the handlers pull out of request extensions.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub registration: Arc<RegistrationGate>,
    pub directory: Arc<dyn UserDirectory>,
    pub sessions: Arc<SessionStore>,
    pub cookies: CookieConfig,
}

/// Assemble the application: documented routes, Swagger UI and the middleware stack.
#[must_use]
pub fn app(services: Services, request_timeout: Duration) -> Router {
    let (router, openapi) = router().split_for_parts();

    router
        .route("/health", options(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                ))
                .layer(Extension(services.auth))
                .layer(Extension(services.registration))
                .layer(Extension(services.directory))
                .layer(Extension(services.sessions))
                .layer(Extension(services.cookies)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind the port or serve
pub async fn new(port: u16, services: Services, request_timeout: Duration) -> Result<()> {
    let app = app(services, request_timeout);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {err}");
            pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    let received = first_signal(ctrl_c, terminate).await;
    info!("Received {received}, gracefully shutdown");
}

async fn first_signal(
    ctrl_c: impl Future<Output = ()>,
    terminate: impl Future<Output = ()>,
) -> &'static str {
    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
