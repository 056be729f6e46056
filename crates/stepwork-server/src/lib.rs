pub mod auth;
pub mod error;
pub mod llm;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Everything except the health check requires an authenticated caller.
    let protected = Router::new()
        // Sessions
        .route(
            "/api/sessions/start",
            post(routes::sessions::start_session).get(routes::sessions::incomplete_session),
        )
        .route("/api/sessions/answer", post(routes::answers::submit_answer))
        .route("/api/sessions", get(routes::sessions::list_sessions))
        .route("/api/sessions/{id}", get(routes::sessions::get_session))
        .route(
            "/api/sessions/{id}/reflection",
            post(routes::reflections::create_reflection),
        )
        // Script
        .route(
            "/api/steps/{step}/questions",
            get(routes::steps::list_step_questions),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(routes::health::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the server on `0.0.0.0:port`.
pub async fn serve(app_state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener).await
}

/// Start the server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    if app_state.auth_secret.is_none() {
        tracing::warn!(
            "no auth secret configured; every /api request except /api/health will be rejected"
        );
    }
    let app = build_router(app_state);

    tracing::info!("stepwork server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
