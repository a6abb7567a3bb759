//! Brigadas Backend
//!
//! REST backend for community emergency coordination: a feed of help posts
//! with volunteer commitments, plus squad data ingested from spreadsheets.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod events;
mod ingest;
mod lifecycle;
mod models;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use events::EventBus;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
    pub events: Arc<EventBus>,
    /// Client for published-sheet downloads
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(repo: Repository, config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.sheet_fetch_timeout)
            .build()?;

        Ok(Self {
            repo: Arc::new(repo),
            config: Arc::new(config),
            events: Arc::new(EventBus::default()),
            http,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Brigadas Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (COORD_API_PSK). Authentication is disabled!");
    }
    if config.admin_uids.is_empty() {
        tracing::warn!("No bootstrap admins configured (COORD_ADMIN_UIDS)");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Repository::new(pool);

    let bind_addr = config.bind_addr;
    let state = AppState::new(repo, config)?;

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Posts
        .route("/posts", get(api::list_posts).post(api::create_post))
        .route("/posts/stream", get(api::stream_posts))
        .route("/posts/{id}", get(api::get_post).delete(api::delete_post))
        .route("/posts/{id}/commitments", post(api::commit_assistance))
        .route("/posts/{id}/resolve", post(api::resolve_post))
        // Squads
        .route("/squads", get(api::list_squads))
        .route("/squads/stream", get(api::stream_squads))
        .route("/squads/{id}", get(api::get_squad))
        .route(
            "/squads/upload",
            post(api::upload_squads).layer(DefaultBodyLimit::max(api::MAX_UPLOAD_BYTES)),
        )
        .route("/squads/sync", post(api::sync_squads))
        // Config
        .route("/config", get(api::get_config).put(api::update_config))
        // Users
        .route("/users/me", get(api::get_me).put(api::ensure_me))
        .route("/users/{uid}/role", put(api::update_user_role))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check and public map feed (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/public/squads", get(api::list_public_squads));

    Router::new()
        .nest("/api", api_routes)
        .merge(public_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
