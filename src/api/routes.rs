//! HTTP routes and server startup.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::identity::{IdentityProvider, OAuthIdentity};
use crate::llm::{LlmClient, OpenAiClient};
use crate::planner::Planner;
use crate::store::{GoalStore, MemoryStore, SupabaseClient};

use super::auth;
use super::chat;
use super::data;
use super::types::{HealthResponse, MessageResponse};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub planner: Planner,
    pub store: Arc<dyn GoalStore>,
    /// Verifies bearer tokens on protected routes.
    pub identity: Arc<dyn IdentityProvider>,
    /// Drives the browser login flow.
    pub oauth: Arc<OAuthIdentity>,
}

impl AppState {
    /// Wire up the production collaborators described by `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let api_key = match config.openai_api_key.clone() {
            Some(key) => key,
            None => {
                tracing::warn!("OPENAI_API_KEY not set; generation endpoints will fail");
                String::new()
            }
        };
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::with_endpoint(
            api_key,
            config.openai_api_url.clone(),
        ));
        let planner =
            Planner::new(llm, config.llm_model.clone()).with_max_tokens(config.llm_max_tokens);

        let store: Arc<dyn GoalStore> = match &config.supabase {
            Some(supabase) => Arc::new(SupabaseClient::new(
                &supabase.url,
                &supabase.service_role_key,
            )),
            None => {
                tracing::warn!("Supabase not configured; using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let oauth = Arc::new(OAuthIdentity::new(config.oauth.clone()));
        let identity: Arc<dyn IdentityProvider> = oauth.clone();

        Ok(Self {
            config,
            planner,
            store,
            identity,
            oauth,
        })
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/auth/login", get(auth::login))
        .route("/api/auth/callback", get(auth::callback))
        .route("/create-user", post(data::create_user))
        .route("/api/generate-goal", post(chat::generate_goal))
        .route("/api/generate-status", post(chat::generate_status))
        .route("/api/generate-milestones", post(chat::generate_milestones))
        .route("/api/generate-missions", post(chat::generate_missions))
        .route("/api/generate-schedules", post(chat::generate_schedules));

    let protected_routes = Router::new()
        .route("/api/save-data", post(data::save_data))
        .route("/api/back-get-status", post(data::get_progress))
        .route("/api/load-data", post(data::load_data))
        .route("/api/tasks/:id", delete(data::delete_task))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    if config.dev_mode {
        tracing::warn!("DEV_MODE is on: protected routes accept any caller as `dev`");
    }
    let state = Arc::new(AppState::from_config(config)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGTERM/SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Goal Reacher backend is running"))
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
    })
}
