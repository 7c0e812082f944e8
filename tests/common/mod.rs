//! Shared harness for integration tests.
//!
//! [`TestHarness`] migrates an in-memory SQLite database, points the TMDB
//! client at a [`MockServer`] and serves the router on a random port.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use reelnote::{
    AppState, auth, build_router, config::Config, db, entities::movie, models::CatalogMovie,
};
use sea_orm::{EntityTrait, sea_query::Expr};
use serde_json::{Value, json};
use wiremock::MockServer;

pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const TMDB_TOKEN: &str = "test-token";

pub struct TestHarness {
    pub state: Arc<AppState>,
    pub tmdb: MockServer,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
}

impl TestHarness {
    pub async fn start() -> Self {
        Self::with_ttl_days(7).await
    }

    pub async fn with_ttl_days(catalog_ttl_days: i64) -> Self {
        let tmdb = MockServer::start().await;

        let config = Config {
            addr: "127.0.0.1:0".parse().unwrap(),
            database_url: "sqlite::memory:".to_string(),
            tmdb_access_token: TMDB_TOKEN.to_string(),
            tmdb_base_url: tmdb.uri(),
            tmdb_image_base_url: IMAGE_BASE.to_string(),
            tmdb_language: "ja-JP".to_string(),
            tmdb_rps: 1000,
            http_timeout_secs: 5,
            catalog_ttl_days,
            frontend_url: "http://localhost:3001".to_string(),
        };

        let db = db::connect_and_migrate(&config.database_url)
            .await
            .expect("failed to create in-memory database");
        let state = Arc::new(AppState::new(Arc::new(config), db, reqwest::Client::new()));
        let app = build_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { state, tmdb, addr, client: reqwest::Client::new() }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Creates a user and returns its bearer token.
    pub async fn create_user(&self, name: &str) -> String {
        let (_, token) = auth::create_user(&self.state.db, name, &format!("{name}@example.com"))
            .await
            .expect("failed to create user");
        token
    }

    pub async fn seed_movie(&self, api_id: i64, title: &str) {
        let movie = CatalogMovie {
            api_id,
            title: title.to_string(),
            poster_url: Some(format!("{IMAGE_BASE}/{api_id}.jpg")),
            description: None,
            release_date: None,
        };
        self.state.catalog.upsert_movies(&[movie]).await.expect("failed to seed movie");
    }

    /// Marks every cached movie as last refreshed at the epoch.
    pub async fn expire_catalog(&self) {
        movie::Entity::update_many()
            .col_expr(movie::Column::UpdatedAt, Expr::value(0i64))
            .exec(&self.state.db)
            .await
            .expect("failed to backdate catalog");
    }

    pub async fn movies(&self) -> Vec<movie::Model> {
        movie::Entity::find().all(&self.state.db).await.expect("failed to list movies")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("request failed")
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("request failed")
    }
}

pub fn tmdb_movie(id: i64, title: &str, poster_path: Option<&str>, release_date: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "poster_path": poster_path,
        "overview": format!("{title} overview"),
        "release_date": release_date,
        "adult": false,
    })
}

pub fn tmdb_page(results: Vec<Value>) -> Value {
    let total = results.len();
    json!({
        "page": 1,
        "results": results,
        "total_pages": 1,
        "total_results": total,
    })
}
