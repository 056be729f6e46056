//! Bearer-token authentication.
//!
//! Tokens are issued by the identity provider as
//! `<base64url(user_id)>.<base64url(hmac_sha256(secret, user_id))>`, both
//! parts unpadded. The middleware verifies the signature and attaches an
//! [`AuthUser`] extension; handlers never see unauthenticated requests.

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The verified caller, inserted into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

fn mac_for(secret: &str, user_id: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("infallible: HMAC accepts keys of any length");
    mac.update(user_id.as_bytes());
    mac
}

/// Issue a token for `user_id`. Used by the CLI and by tests; production
/// tokens come from the identity provider.
pub fn sign_token(secret: &str, user_id: &str) -> String {
    let sig = mac_for(secret, user_id).finalize().into_bytes();
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(user_id.as_bytes()),
        URL_SAFE_NO_PAD.encode(sig)
    )
}

/// Return the user id if `token` carries a valid signature.
pub fn verify_token(secret: &str, token: &str) -> Option<String> {
    let (user_part, sig_part) = token.split_once('.')?;
    let user_bytes = URL_SAFE_NO_PAD.decode(user_part).ok()?;
    let sig = URL_SAFE_NO_PAD.decode(sig_part).ok()?;
    let user_id = String::from_utf8(user_bytes).ok()?;
    if user_id.trim().is_empty() {
        return None;
    }
    mac_for(secret, &user_id).verify_slice(&sig).ok()?;
    Some(user_id)
}

fn bearer(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "unauthorized" })),
    )
        .into_response()
}

/// Axum middleware gating protected routes.
///
/// With no secret configured every request is rejected.
pub async fn auth_middleware(
    State(app): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(secret) = app.auth_secret.as_deref() else {
        return unauthorized();
    };
    let Some(token) = bearer(&req) else {
        return unauthorized();
    };
    let Some(user_id) = verify_token(secret, token) else {
        tracing::warn!(path = %req.uri().path(), "rejected bearer token");
        return unauthorized();
    };
    req.extensions_mut().insert(AuthUser { user_id });
    next.run(req).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::DisabledGenerator;
    use axum::{body::Body, http::Request, middleware, routing::get, Extension, Router};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use stepwork_core::config::Config;
    use stepwork_core::script::QuestionScript;
    use tower::ServiceExt;

    async fn whoami(Extension(user): Extension<AuthUser>) -> String {
        user.user_id
    }

    fn test_app(secret: Option<&str>) -> Router {
        let state = AppState::new(
            std::env::temp_dir(),
            Config::default(),
            QuestionScript::builtin().unwrap(),
            secret.map(str::to_string),
            Arc::new(DisabledGenerator),
        );
        Router::new()
            .route("/api/whoami", get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    fn request(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/whoami");
        if let Some(t) = token {
            builder = builder.header("authorization", format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn signed_token_verifies() {
        let token = sign_token("s3cret", "user-42");
        assert_eq!(verify_token("s3cret", &token).as_deref(), Some("user-42"));
    }

    #[test]
    fn wrong_secret_or_tampered_user_fails() {
        let token = sign_token("s3cret", "user-42");
        assert!(verify_token("other", &token).is_none());

        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!("{}.{sig}", URL_SAFE_NO_PAD.encode("user-43"));
        assert!(verify_token("s3cret", &forged).is_none());
    }

    #[test]
    fn malformed_tokens_fail() {
        assert!(verify_token("s", "").is_none());
        assert!(verify_token("s", "no-dot").is_none());
        assert!(verify_token("s", "!!!.???").is_none());
        assert!(verify_token("s", &sign_token("s", "")).is_none());
    }

    #[tokio::test]
    async fn valid_token_reaches_handler_with_user() {
        let token = sign_token("s3cret", "user-42");
        let resp = test_app(Some("s3cret"))
            .oneshot(request(Some(&token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"user-42");
    }

    #[tokio::test]
    async fn missing_header_returns_401_json() {
        let resp = test_app(Some("s3cret")).oneshot(request(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let ct = resp
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(ct.contains("application/json"));
    }

    #[tokio::test]
    async fn bad_signature_returns_401() {
        let token = sign_token("wrong", "user-42");
        let resp = test_app(Some("s3cret"))
            .oneshot(request(Some(&token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn no_secret_rejects_everything() {
        let token = sign_token("s3cret", "user-42");
        let resp = test_app(None).oneshot(request(Some(&token))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
