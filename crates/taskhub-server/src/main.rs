//! Taskhub Server
//!
//! CRUD backend for users and projects with JWT + session auth, a
//! fixed-window rate limiter, a cache-aside layer over the relational
//! store, and a background email/report runner.
//!
//! Uses SQLite (embedded) and an in-process cache store, both constructed at
//! startup and injected, no process-wide singletons.

mod error;
mod extractors;
mod handlers;
mod services;
mod storage;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use taskhub_core::ports::CacheStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use services::rate_limit::{rate_limit_middleware, OutagePolicy};
use services::tasks::LogMailer;
use services::{AuthService, EntityCache, ProjectService, RateLimiter, TaskRunner, UserService};
use storage::{Database, MemoryCache};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub projects: Arc<ProjectService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub tasks: Arc<TaskRunner>,
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        tracing::error!("PANIC at {:?}: {}", location, info);
    }));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Taskhub Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, db={}",
        config.bind_address, config.database_path
    );

    let db = Arc::new(
        Database::open(&config.database_path)
            .await
            .context("Failed to initialize database")?,
    );

    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let entity_cache = Arc::new(EntityCache::new(cache.clone(), config.cache_ttl));

    let auth = Arc::new(AuthService::new(
        db.clone(),
        cache.clone(),
        config.jwt_secret.clone(),
        config.session_ttl,
    ));
    let users = Arc::new(UserService::new(db.clone(), entity_cache.clone()));
    let projects = Arc::new(ProjectService::new(db.clone(), entity_cache));
    let rate_limiter = Arc::new(RateLimiter::new(
        cache.clone(),
        config.rate_limit_max_requests,
        config.rate_limit_window,
        config.rate_limit_outage_policy,
    ));
    let tasks = Arc::new(TaskRunner::start(
        Arc::new(LogMailer),
        db.clone(),
        config.report_interval,
    ));
    info!("Services initialized");

    let state = AppState {
        db,
        auth,
        users,
        projects,
        rate_limiter,
        tasks,
    };

    let app = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/users",
            get(handlers::users::list).post(handlers::users::create),
        )
        .route("/users/by_ids", get(handlers::users::get_by_ids))
        .route("/users/bulk", post(handlers::users::create_bulk))
        .route(
            "/users/:id",
            get(handlers::users::get)
                .patch(handlers::users::update)
                .delete(handlers::users::delete),
        )
        .route(
            "/projects",
            get(handlers::projects::list).post(handlers::projects::create),
        )
        .route("/projects/bulk", post(handlers::projects::create_bulk))
        .route(
            "/projects/:id",
            get(handlers::projects::get)
                .patch(handlers::projects::update)
                .delete(handlers::projects::delete),
        )
        // Every API request passes the fixed-window limiter first
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

#[derive(Debug, Clone)]
struct Config {
    bind_address: String,
    database_path: String,
    jwt_secret: String,
    session_ttl: Duration,
    cache_ttl: Duration,
    rate_limit_max_requests: i64,
    rate_limit_window: Duration,
    rate_limit_outage_policy: OutagePolicy,
    report_interval: Duration,
}

fn load_config() -> Result<Config> {
    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "data/taskhub.db".to_string());

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        warn!("JWT_SECRET not set, using default (insecure for production)");
        "change-me-in-production".to_string()
    });

    let session_ttl = Duration::from_secs(env_u64("SESSION_TTL_SECS", 1800)?);
    let cache_ttl = Duration::from_secs(env_u64("CACHE_TTL_SECS", 300)?);
    let rate_limit_max_requests = env_i64("RATE_LIMIT_MAX_REQUESTS", 10)?;
    anyhow::ensure!(
        rate_limit_max_requests >= 1,
        "RATE_LIMIT_MAX_REQUESTS must be at least 1, got {rate_limit_max_requests}"
    );
    let rate_limit_window = Duration::from_secs(env_u64("RATE_LIMIT_WINDOW_SECS", 60)?);
    let report_interval = Duration::from_secs(env_u64("REPORT_INTERVAL_SECS", 7 * 24 * 3600)?);

    let rate_limit_outage_policy = match std::env::var("RATE_LIMIT_OUTAGE_POLICY") {
        Ok(raw) => OutagePolicy::parse(&raw)
            .with_context(|| format!("Invalid RATE_LIMIT_OUTAGE_POLICY: {raw}"))?,
        Err(_) => OutagePolicy::default(),
    };

    Ok(Config {
        bind_address,
        database_path,
        jwt_secret,
        session_ttl,
        cache_ttl,
        rate_limit_max_requests,
        rate_limit_window,
        rate_limit_outage_policy,
        report_interval,
    })
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Invalid {name}: {raw}")),
        Err(_) => Ok(default),
    }
}

fn env_i64(name: &str, default: i64) -> Result<i64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Invalid {name}: {raw}")),
        Err(_) => Ok(default),
    }
}
