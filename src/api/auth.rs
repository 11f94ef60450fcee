//! Bearer-token auth and the OAuth login flow.
//!
//! - `/api/auth/login` redirects the browser to the identity provider
//! - `/api/auth/callback` exchanges the returned code, registers the user on
//!   first login and hands the access token back to the client
//! - When `DEV_MODE=false`, protected endpoints require
//!   `Authorization: Bearer <access token>`, verified against the provider

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};

use super::routes::AppState;
use super::types::{CallbackQuery, CallbackResponse};
use crate::identity::IdentityError;
use crate::store::NewUser;

/// The verified caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

impl AuthUser {
    pub fn dev() -> Self {
        Self {
            user_id: "dev".to_string(),
            email: "dev@localhost".to_string(),
        }
    }
}

fn bearer_token(req: &Request<Body>) -> &str {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("")
        .trim()
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode => no auth checks.
    if state.config.dev_mode {
        req.extensions_mut().insert(AuthUser::dev());
        return next.run(req).await;
    }

    let token = bearer_token(&req).to_string();
    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response();
    }

    match state.identity.verify(&token).await {
        Ok(identity) => {
            req.extensions_mut().insert(AuthUser {
                user_id: identity.user_id,
                email: identity.email,
            });
            next.run(req).await
        }
        Err(IdentityError::InvalidToken) => {
            (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response()
        }
        Err(e) => {
            tracing::warn!("Token verification failed: {}", e);
            (StatusCode::BAD_GATEWAY, "Identity provider unavailable").into_response()
        }
    }
}

/// GET /api/auth/login - Redirect to the provider's authorize page.
pub async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect, (StatusCode, String)> {
    let url = state
        .oauth
        .authorize_url()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Redirect::temporary(url.as_str()))
}

/// GET /api/auth/callback - Finish the authorization-code flow.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, (StatusCode, String)> {
    if let Some(error) = query.error {
        return Err((StatusCode::UNAUTHORIZED, format!("Login denied: {}", error)));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Missing code".to_string()))?;

    let grant = state.oauth.exchange_code(&code).await.map_err(|e| match e {
        IdentityError::CodeRejected(_) => (StatusCode::UNAUTHORIZED, e.to_string()),
        _ => (StatusCode::BAD_GATEWAY, e.to_string()),
    })?;

    let identity = state
        .identity
        .verify(&grant.access_token)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    let existing = state
        .store
        .get_user(&identity.user_id)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    if existing.is_none() {
        state
            .store
            .create_user(&NewUser {
                user_id: identity.user_id.clone(),
                email: identity.email.clone(),
                token: Some(grant.access_token.clone()),
            })
            .await
            .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
        tracing::info!(user_id = %identity.user_id, "Registered new user");
    }

    Ok(Json(CallbackResponse {
        user_id: identity.user_id,
        email: identity.email,
        access_token: grant.access_token,
    }))
}
