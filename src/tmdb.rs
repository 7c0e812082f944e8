use std::{num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("movie provider connection error")]
    Connection(#[source] reqwest::Error),

    #[error("movie provider returned status {status}")]
    Status { status: u16 },

    #[error("movie provider returned an unreadable response")]
    Decode(#[source] reqwest::Error),
}

pub struct TmdbClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    language: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(
        client: reqwest::Client,
        access_token: String,
        base_url: String,
        language: String,
        rps: u32,
    ) -> Self {
        if access_token.trim().is_empty() {
            tracing::warn!("no TMDB_ACCESS_TOKEN provided, provider calls will be rejected");
        }

        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN),
        )));
        Self { client, access_token, base_url, language, limiter }
    }

    /// First page of the now-playing feed.
    pub async fn now_playing(&self) -> Result<Vec<TmdbMovie>, TmdbError> {
        let resp = self
            .get("/movie/now_playing", &[("language", self.language.as_str()), ("page", "1")])
            .await?;
        Ok(resp.results)
    }

    /// First page of keyword search results, adult titles excluded.
    pub async fn search_movies(&self, keyword: &str) -> Result<Vec<TmdbMovie>, TmdbError> {
        let resp = self
            .get(
                "/search/movie",
                &[
                    ("language", self.language.as_str()),
                    ("page", "1"),
                    ("query", keyword),
                    ("include_adult", "false"),
                ],
            )
            .await?;
        Ok(resp.results)
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<PagedResponse, TmdbError> {
        self.limiter.until_ready().await;

        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        tracing::debug!(path = %path, "TMDB request");

        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(TmdbError::Connection)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TmdbError::Status { status: status.as_u16() });
        }

        resp.json().await.map_err(TmdbError::Decode)
    }
}

#[derive(Debug, Deserialize)]
struct PagedResponse {
    #[serde(default)]
    results: Vec<TmdbMovie>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerates_missing_optional_fields() {
        let body = r#"{"page":1,"results":[{"id":603,"title":"The Matrix"}],"total_pages":1}"#;
        let parsed: PagedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].id, 603);
        assert!(parsed.results[0].poster_path.is_none());
    }

    #[test]
    fn missing_results_is_empty() {
        let parsed: PagedResponse = serde_json::from_str(r#"{"page":1}"#).unwrap();
        assert!(parsed.results.is_empty());
    }
}
