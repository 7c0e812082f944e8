use std::collections::HashSet;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, LikeExpr, OnConflict},
};

use crate::{entities::movie, error::AppResult, models::CatalogMovie};

/// Local copy of movies seen from TMDB, keyed by TMDB id.
#[derive(Clone)]
pub struct Catalog {
    db: DatabaseConnection,
    ttl_seconds: i64,
}

impl Catalog {
    pub fn new(db: DatabaseConnection, ttl_days: i64) -> Self {
        Self { db, ttl_seconds: ttl_days.max(0) * 86_400 }
    }

    pub async fn search_by_title(&self, keyword: &str) -> AppResult<Vec<movie::Model>> {
        let pattern = LikeExpr::new(format!("%{}%", escape_like(keyword))).escape('\\');
        let movies = movie::Entity::find()
            .filter(movie::Column::Title.like(pattern))
            .order_by_asc(movie::Column::Title)
            .order_by_asc(movie::Column::ApiId)
            .all(&self.db)
            .await?;
        Ok(movies)
    }

    pub async fn find_by_api_id(&self, api_id: i64) -> AppResult<Option<movie::Model>> {
        let movie = movie::Entity::find()
            .filter(movie::Column::ApiId.eq(api_id))
            .one(&self.db)
            .await?;
        Ok(movie)
    }

    /// Inserts new movies and overwrites the descriptive columns of existing
    /// ones. Later duplicates of an id in `movies` win.
    pub async fn upsert_movies(&self, movies: &[CatalogMovie]) -> AppResult<u64> {
        let now = now_sec();
        let mut seen = HashSet::new();
        let models: Vec<movie::ActiveModel> = movies
            .iter()
            .rev()
            .filter(|m| seen.insert(m.api_id))
            .map(|m| movie::ActiveModel {
                id: Default::default(),
                api_id: Set(m.api_id),
                title: Set(m.title.clone()),
                poster_path: Set(m.poster_url.clone()),
                description: Set(m.description.clone()),
                release_date: Set(m.release_date.map(|d| d.to_string())),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .collect();

        if models.is_empty() {
            return Ok(0);
        }

        let affected = movie::Entity::insert_many(models)
            .on_conflict(
                OnConflict::column(movie::Column::ApiId)
                    .update_columns([
                        movie::Column::Title,
                        movie::Column::PosterPath,
                        movie::Column::Description,
                        movie::Column::ReleaseDate,
                        movie::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(affected)
    }

    /// Marks rows as revalidated without changing their contents.
    pub async fn touch(&self, api_ids: &[i64]) -> AppResult<u64> {
        if api_ids.is_empty() {
            return Ok(0);
        }
        let result = movie::Entity::update_many()
            .col_expr(movie::Column::UpdatedAt, Expr::value(now_sec()))
            .filter(movie::Column::ApiId.is_in(api_ids.iter().copied()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    pub fn is_fresh(&self, movie: &movie::Model) -> bool {
        self.ttl_seconds == 0 || now_sec().saturating_sub(movie.updated_at) <= self.ttl_seconds
    }
}

fn escape_like(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub(crate) fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100% Wolf"), "100\\% Wolf");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
        assert_eq!(escape_like("Matrix"), "Matrix");
    }

    fn row(updated_at: i64) -> movie::Model {
        movie::Model {
            id: 1,
            api_id: 603,
            title: "The Matrix".to_string(),
            poster_path: None,
            description: None,
            release_date: None,
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn rows_older_than_ttl_are_stale() {
        let catalog = Catalog::new(DatabaseConnection::Disconnected, 7);
        assert!(catalog.is_fresh(&row(now_sec() - 86_400)));
        assert!(!catalog.is_fresh(&row(now_sec() - 8 * 86_400)));
    }

    #[test]
    fn zero_ttl_never_expires() {
        let catalog = Catalog::new(DatabaseConnection::Disconnected, 0);
        assert!(catalog.is_fresh(&row(0)));
    }
}
