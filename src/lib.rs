pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod models;
pub mod reviews;
pub mod routes;
pub mod sync;
pub mod tmdb;

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};

use crate::{catalog::Catalog, config::Config, reviews::ReviewStore, tmdb::TmdbClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub catalog: Catalog,
    pub reviews: ReviewStore,
    pub tmdb: Arc<TmdbClient>,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: DatabaseConnection, http: reqwest::Client) -> Self {
        let tmdb = TmdbClient::new(
            http,
            config.tmdb_access_token.clone(),
            config.tmdb_base_url.clone(),
            config.tmdb_language.clone(),
            config.tmdb_rps,
        );

        Self {
            catalog: Catalog::new(db.clone(), config.catalog_ttl_days),
            reviews: ReviewStore::new(db.clone()),
            tmdb: Arc::new(tmdb),
            db,
            config,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.frontend_url);

    Router::new()
        .route("/api/movies/latest", get(routes::latest))
        .route("/api/movies/search", get(routes::search))
        .route("/api/movies/{id}", get(routes::movie_detail))
        .route("/api/reviews", post(routes::create_review))
        .route("/api/reviews/update", post(routes::update_review))
        .route("/api/reviews/reviewed", get(routes::reviewed))
        .route("/api/reviews/user/{movie_id}", get(routes::user_review))
        .route("/api/user", get(routes::current_user))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(err) => {
            tracing::warn!(
                frontend_url = %frontend_url,
                error = %err,
                "invalid FRONTEND_URL, cross-origin requests disabled"
            );
            layer
        },
    }
}
