use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{
    catalog::Catalog,
    error::{AppError, AppResult},
    models::CatalogMovie,
    tmdb::TmdbClient,
};

/// Keyword search backed by the local catalog.
///
/// Fresh local matches are served without contacting TMDB. A keyword with no
/// local match, or with a stale one, is looked up on TMDB and every result is
/// upserted into the catalog. A successful revalidation refreshes every
/// local match and keeps the ones TMDB did not return. When revalidating
/// stale rows fails upstream, the stale rows are served instead.
pub async fn search(
    catalog: &Catalog,
    tmdb: &TmdbClient,
    image_base_url: &str,
    keyword: &str,
) -> AppResult<Vec<CatalogMovie>> {
    let local = catalog.search_by_title(keyword).await?;

    if local.is_empty() {
        debug!(keyword = %keyword, "catalog miss");
        return fetch_and_store(catalog, tmdb, image_base_url, keyword).await;
    }

    if local.iter().all(|m| catalog.is_fresh(m)) {
        debug!(keyword = %keyword, hits = local.len(), "catalog hit");
        return Ok(local.into_iter().map(CatalogMovie::from).collect());
    }

    debug!(keyword = %keyword, hits = local.len(), "stale catalog rows, revalidating");
    match fetch_and_store(catalog, tmdb, image_base_url, keyword).await {
        Ok(mut movies) => {
            // Local matches TMDB no longer returns still count as revalidated.
            let ids: Vec<i64> = local.iter().map(|m| m.api_id).collect();
            catalog.touch(&ids).await?;

            let returned: HashSet<i64> = movies.iter().map(|m| m.api_id).collect();
            movies.extend(
                local
                    .into_iter()
                    .filter(|m| !returned.contains(&m.api_id))
                    .map(CatalogMovie::from),
            );
            Ok(movies)
        },
        Err(AppError::Upstream(err)) => {
            warn!(keyword = %keyword, error = %err, "revalidation failed, serving stale rows");
            Ok(local.into_iter().map(CatalogMovie::from).collect())
        },
        Err(err) => Err(err),
    }
}

/// First page of TMDB's now-playing feed. Not cached.
pub async fn latest(tmdb: &TmdbClient, image_base_url: &str) -> AppResult<Vec<CatalogMovie>> {
    let movies = tmdb.now_playing().await?;
    debug!(count = movies.len(), "fetched now playing");
    Ok(movies.into_iter().map(|m| CatalogMovie::from_tmdb(m, image_base_url)).collect())
}

async fn fetch_and_store(
    catalog: &Catalog,
    tmdb: &TmdbClient,
    image_base_url: &str,
    keyword: &str,
) -> AppResult<Vec<CatalogMovie>> {
    let movies: Vec<CatalogMovie> = tmdb
        .search_movies(keyword)
        .await?
        .into_iter()
        .map(|m| CatalogMovie::from_tmdb(m, image_base_url))
        .collect();

    let stored = catalog.upsert_movies(&movies).await?;
    debug!(keyword = %keyword, results = movies.len(), stored = stored, "cached search results");

    Ok(movies)
}
