use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr, sea_query::Expr,
};
use tracing::debug;

use crate::{
    catalog::now_sec,
    entities::{movie, review},
    error::{AppError, AppResult},
    models::{CatalogMovie, NewReview, ReviewRecord, ReviewUpdate, ReviewedMovie, parse_date},
};

#[derive(Clone)]
pub struct ReviewStore {
    db: DatabaseConnection,
}

#[derive(Debug, FromQueryResult)]
struct ReviewedRow {
    api_id: i64,
    title: String,
    poster_path: Option<String>,
    release_date: Option<String>,
    rating_sum: i64,
    rating_count: i64,
}

impl ReviewStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, user_id: i32, input: &NewReview) -> AppResult<ReviewRecord> {
        let movie = self.movie_by_api_id(input.movie_api_id).await?;
        let now = now_sec();

        let existing = review::Entity::find()
            .filter(review::Column::UserId.eq(user_id))
            .filter(review::Column::MovieId.eq(movie.id))
            .one(&self.db)
            .await?;

        if let Some(existing) = existing {
            if !existing.is_deleted {
                return Err(AppError::Conflict("review already exists for this movie"));
            }
            // A soft-deleted review is brought back rather than duplicated.
            let mut active: review::ActiveModel = existing.into();
            active.rating = Set(input.rating);
            active.comment = Set(input.comment.clone());
            active.is_deleted = Set(false);
            active.updated_at = Set(now);
            let restored = active.update(&self.db).await?;
            debug!(review_id = restored.id, user_id = user_id, "restored review");
            return Ok(ReviewRecord::new(restored, movie.api_id));
        }

        let created = review::ActiveModel {
            id: Default::default(),
            user_id: Set(user_id),
            movie_id: Set(movie.id),
            rating: Set(input.rating),
            comment: Set(input.comment.clone()),
            is_deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict("review already exists for this movie")
            },
            _ => AppError::from(err),
        })?;

        debug!(review_id = created.id, user_id = user_id, movie_id = movie.id, "created review");
        Ok(ReviewRecord::new(created, movie.api_id))
    }

    pub async fn update(&self, user_id: i32, input: &ReviewUpdate) -> AppResult<review::Model> {
        let review = review::Entity::find_by_id(input.review_id)
            .one(&self.db)
            .await?
            .filter(|r| !r.is_deleted)
            .ok_or(AppError::ReviewNotFound)?;

        if review.user_id != user_id {
            return Err(AppError::Forbidden);
        }

        let movie = movie::Entity::find_by_id(review.movie_id).one(&self.db).await?;
        if movie.map(|m| m.api_id) != Some(input.movie_api_id) {
            return Err(AppError::invalid("movie_id", "The movie_id does not match the review."));
        }

        let mut active: review::ActiveModel = review.into();
        active.rating = Set(input.rating);
        active.comment = Set(input.comment.clone());
        active.updated_at = Set(now_sec());
        let updated = active.update(&self.db).await?;

        debug!(review_id = updated.id, user_id = user_id, "updated review");
        Ok(updated)
    }

    pub async fn find_for_user(
        &self,
        user_id: i32,
        movie_api_id: i64,
    ) -> AppResult<Option<ReviewRecord>> {
        let review = review::Entity::find()
            .join(JoinType::InnerJoin, review::Relation::Movie.def())
            .filter(movie::Column::ApiId.eq(movie_api_id))
            .filter(review::Column::UserId.eq(user_id))
            .filter(review::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await?;
        Ok(review.map(|r| ReviewRecord::new(r, movie_api_id)))
    }

    /// One row per reviewed movie with the floored mean of its ratings,
    /// limited to `user_id`'s reviews when given.
    pub async fn reviewed_movies(&self, user_id: Option<i32>) -> AppResult<Vec<ReviewedMovie>> {
        let mut query = review::Entity::find()
            .select_only()
            .column(movie::Column::ApiId)
            .column(movie::Column::Title)
            .column(movie::Column::PosterPath)
            .column(movie::Column::ReleaseDate)
            .column_as(Expr::col((review::Entity, review::Column::Rating)).sum(), "rating_sum")
            .column_as(Expr::col((review::Entity, review::Column::Id)).count(), "rating_count")
            .join(JoinType::InnerJoin, review::Relation::Movie.def())
            .filter(review::Column::IsDeleted.eq(false));

        if let Some(user_id) = user_id {
            query = query.filter(review::Column::UserId.eq(user_id));
        }

        let rows = query
            .group_by(movie::Column::Id)
            .group_by(movie::Column::ApiId)
            .group_by(movie::Column::Title)
            .group_by(movie::Column::PosterPath)
            .group_by(movie::Column::ReleaseDate)
            .order_by_asc(movie::Column::Title)
            .into_model::<ReviewedRow>()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let rating = floor_average(row.rating_sum, row.rating_count);
                let movie = CatalogMovie {
                    api_id: row.api_id,
                    title: row.title,
                    poster_url: row.poster_path,
                    description: None,
                    release_date: row.release_date.as_deref().and_then(parse_date),
                };
                ReviewedMovie { movie: movie.into(), rating }
            })
            .collect())
    }

    async fn movie_by_api_id(&self, api_id: i64) -> AppResult<movie::Model> {
        movie::Entity::find()
            .filter(movie::Column::ApiId.eq(api_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::invalid("movie_id", "The selected movie_id is invalid."))
    }
}

fn floor_average(sum: i64, count: i64) -> i64 {
    if count <= 0 { 0 } else { sum.div_euclid(count) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_floored() {
        assert_eq!(floor_average(3 + 4 + 5, 3), 4);
        assert_eq!(floor_average(4 + 5, 2), 4);
        assert_eq!(floor_average(1 + 2, 2), 1);
        assert_eq!(floor_average(5, 1), 5);
    }

    #[test]
    fn no_ratings_average_to_zero() {
        assert_eq!(floor_average(0, 0), 0);
    }
}
