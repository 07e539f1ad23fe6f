use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::i18n::{EnglishCatalog, Localizer};
use crate::services::{AuthService, SeaOrmAuthService, SeaOrmUserService, UserService};
use crate::state::SharedState;

pub mod auth;
mod error;
pub mod observability;
pub mod users;

pub use error::ApiError;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::RwLock;

pub struct AppState {
    pub shared: Arc<SharedState>,

    auth_service: Arc<dyn AuthService>,

    user_service: Arc<dyn UserService>,

    localizer: Arc<dyn Localizer>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<crate::services::TokenStore> {
        &self.shared.tokens
    }

    #[must_use]
    pub fn images(&self) -> &Arc<crate::services::ImageStore> {
        &self.shared.images
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.auth_service
    }

    #[must_use]
    pub fn user_service(&self) -> &Arc<dyn UserService> {
        &self.user_service
    }

    #[must_use]
    pub fn localizer(&self) -> &Arc<dyn Localizer> {
        &self.localizer
    }
}

pub async fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let security = shared.config.read().await.security.clone();

    let auth_service = Arc::new(SeaOrmAuthService::new(
        shared.store.clone(),
        shared.tokens.clone(),
    ));

    let user_service = Arc::new(SeaOrmUserService::new(
        shared.store.clone(),
        shared.images.clone(),
        security,
    ));

    Ok(Arc::new(AppState {
        shared,
        auth_service,
        user_service,
        localizer: Arc::new(EnglishCatalog),
        prometheus_handle,
    }))
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    create_app_state(shared, prometheus_handle).await
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = {
        let config = state.config().read().await;
        config.server.cors_allowed_origins.clone()
    };
    let profile_folder = state.images().profile_folder().to_path_buf();

    let api_router = Router::new()
        .route("/auth", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/users", post(users::register))
        .route("/users/{id}", put(users::update_user))
        // Base64 inflates a maximal 2 MiB image payload past axum's 2 MB
        // default body cap; the decoded-size ceiling is enforced downstream.
        .layer(DefaultBodyLimit::max(3 * 1024 * 1024))
        .with_state(state.clone());

    let metrics_router = Router::new()
        .route("/metrics", get(observability::get_metrics))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    // Stored images are immutable (every write gets a fresh name), so a
    // one-year cache is safe.
    let images_service = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        ))
        .service(ServeDir::new(profile_folder));

    Router::new()
        .nest("/api/1.0", api_router)
        .merge(metrics_router)
        .nest_service("/images", images_service)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
}
