use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::{
    entities::{movie, review},
    error::{AppError, AppResult, FieldErrors},
    tmdb::TmdbMovie,
};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
pub const MAX_COMMENT_CHARS: usize = 500;

/// A movie as the service understands it, whether it came from TMDB or the
/// local catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogMovie {
    pub api_id: i64,
    pub title: String,
    pub poster_url: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<Date>,
}

impl CatalogMovie {
    pub fn from_tmdb(m: TmdbMovie, image_base_url: &str) -> Self {
        Self {
            api_id: m.id,
            title: m.title,
            poster_url: m.poster_path.as_deref().and_then(|p| poster_url(image_base_url, p)),
            description: m.overview.filter(|s| !s.trim().is_empty()),
            release_date: m.release_date.as_deref().and_then(parse_date),
        }
    }
}

impl From<movie::Model> for CatalogMovie {
    fn from(m: movie::Model) -> Self {
        Self {
            api_id: m.api_id,
            title: m.title,
            poster_url: m.poster_path,
            description: m.description,
            release_date: m.release_date.as_deref().and_then(parse_date),
        }
    }
}

/// Listing shape shared by the latest, search and reviewed endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct MovieSummary {
    pub id: i64,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: Option<Date>,
}

impl From<CatalogMovie> for MovieSummary {
    fn from(m: CatalogMovie) -> Self {
        Self {
            id: m.api_id,
            title: m.title,
            poster_path: m.poster_url,
            release_date: m.release_date,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ReviewedMovie {
    #[serde(flatten)]
    pub movie: MovieSummary,
    pub rating: i64,
}

/// A review as returned to clients. `movie_id` is the movie's external id,
/// the same value the review endpoints accept.
#[derive(Clone, Debug, Serialize)]
pub struct ReviewRecord {
    pub id: i32,
    pub user_id: i32,
    pub movie_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ReviewRecord {
    pub fn new(r: review::Model, movie_api_id: i64) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            movie_id: movie_api_id,
            rating: r.rating,
            comment: r.comment,
            is_deleted: r.is_deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data) }
    }
}

impl ApiResponse<()> {
    pub fn done() -> Self {
        Self { success: true, data: None }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "searchKeyword")]
    pub search_keyword: Option<String>,
}

impl SearchQuery {
    pub fn keyword(&self) -> AppResult<&str> {
        match self.search_keyword.as_deref().map(str::trim) {
            Some(k) if !k.is_empty() => Ok(k),
            _ => Err(AppError::invalid("searchKeyword", "The search keyword field is required.")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewInput {
    pub movie_id: Option<i64>,
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReview {
    pub movie_api_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
}

impl ReviewInput {
    pub fn validate(self) -> AppResult<NewReview> {
        let mut errors = FieldErrors::new();
        let movie_api_id = required(&mut errors, "movie_id", self.movie_id);
        let rating = check_rating(&mut errors, self.rating);
        let comment = check_comment(&mut errors, self.comment);

        match (movie_api_id, rating) {
            (Some(movie_api_id), Some(rating)) if errors.is_empty() => {
                Ok(NewReview { movie_api_id, rating, comment })
            },
            _ => Err(AppError::Validation(errors)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewInput {
    pub review_id: Option<i32>,
    pub movie_id: Option<i64>,
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewUpdate {
    pub review_id: i32,
    pub movie_api_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
}

impl UpdateReviewInput {
    pub fn validate(self) -> AppResult<ReviewUpdate> {
        let mut errors = FieldErrors::new();
        let review_id = required(&mut errors, "review_id", self.review_id);
        let movie_api_id = required(&mut errors, "movie_id", self.movie_id);
        let rating = check_rating(&mut errors, self.rating);
        let comment = check_comment(&mut errors, self.comment);

        match (review_id, movie_api_id, rating) {
            (Some(review_id), Some(movie_api_id), Some(rating)) if errors.is_empty() => {
                Ok(ReviewUpdate { review_id, movie_api_id, rating, comment })
            },
            _ => Err(AppError::Validation(errors)),
        }
    }
}

fn required<T>(errors: &mut FieldErrors, field: &'static str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.entry(field).or_default().push(format!("The {field} field is required."));
    }
    value
}

fn check_rating(errors: &mut FieldErrors, rating: Option<i64>) -> Option<i32> {
    let rating = required(errors, "rating", rating)?;
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        errors
            .entry("rating")
            .or_default()
            .push(format!("The rating must be between {MIN_RATING} and {MAX_RATING}."));
        return None;
    }
    i32::try_from(rating).ok()
}

fn check_comment(errors: &mut FieldErrors, comment: Option<String>) -> Option<String> {
    // Blank comments are stored as null.
    let comment = comment.filter(|c| !c.trim().is_empty())?;
    if comment.chars().count() > MAX_COMMENT_CHARS {
        errors
            .entry("comment")
            .or_default()
            .push(format!("The comment may not be greater than {MAX_COMMENT_CHARS} characters."));
        return None;
    }
    Some(comment)
}

fn poster_url(image_base_url: &str, path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let base = image_base_url.trim_end_matches('/');
    Some(if path.starts_with('/') { format!("{base}{path}") } else { format!("{base}/{path}") })
}

pub(crate) fn parse_date(s: &str) -> Option<Date> {
    s.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

    fn tmdb(poster: Option<&str>, date: Option<&str>) -> TmdbMovie {
        TmdbMovie {
            id: 603,
            title: "The Matrix".to_string(),
            poster_path: poster.map(str::to_string),
            overview: Some("A hacker learns the truth.".to_string()),
            release_date: date.map(str::to_string),
        }
    }

    #[test]
    fn provider_movie_gets_absolute_poster() {
        let m = CatalogMovie::from_tmdb(tmdb(Some("/abc.jpg"), Some("1999-03-31")), IMAGE_BASE);
        assert_eq!(m.poster_url.as_deref(), Some("https://image.tmdb.org/t/p/w500/abc.jpg"));
        assert_eq!(m.release_date, Some(jiff::civil::date(1999, 3, 31)));
    }

    #[test]
    fn empty_poster_and_date_become_null() {
        let m = CatalogMovie::from_tmdb(tmdb(Some(""), Some("")), IMAGE_BASE);
        assert_eq!(m.poster_url, None);
        assert_eq!(m.release_date, None);
    }

    #[test]
    fn stored_and_provider_movies_share_one_shape() {
        let from_provider =
            CatalogMovie::from_tmdb(tmdb(Some("/abc.jpg"), Some("1999-03-31")), IMAGE_BASE);
        let row = movie::Model {
            id: 1,
            api_id: 603,
            title: "The Matrix".to_string(),
            poster_path: Some("https://image.tmdb.org/t/p/w500/abc.jpg".to_string()),
            description: Some("A hacker learns the truth.".to_string()),
            release_date: Some("1999-03-31".to_string()),
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(CatalogMovie::from(row), from_provider);
    }

    #[test]
    fn summary_serializes_date_as_plain_string() {
        let m = CatalogMovie::from_tmdb(tmdb(None, Some("1999-03-31")), IMAGE_BASE);
        let json = serde_json::to_value(MovieSummary::from(m)).unwrap();
        assert_eq!(json["id"], 603);
        assert_eq!(json["release_date"], "1999-03-31");
        assert!(json["poster_path"].is_null());
    }

    #[test]
    fn review_record_exposes_external_movie_id() {
        let row = review::Model {
            id: 7,
            user_id: 2,
            movie_id: 1,
            rating: 4,
            comment: None,
            is_deleted: false,
            created_at: 10,
            updated_at: 10,
        };
        let json = serde_json::to_value(ReviewRecord::new(row, 603)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["movie_id"], 603);
    }

    #[test]
    fn rating_bounds_are_enforced() {
        for rating in [0, 6, -1] {
            let input = ReviewInput { movie_id: Some(603), rating: Some(rating), comment: None };
            let Err(AppError::Validation(errors)) = input.validate() else {
                panic!("rating {rating} should be rejected");
            };
            assert!(errors.contains_key("rating"));
        }
        for rating in MIN_RATING..=MAX_RATING {
            let input = ReviewInput { movie_id: Some(603), rating: Some(rating), comment: None };
            assert!(input.validate().is_ok());
        }
    }

    #[test]
    fn comment_length_is_counted_in_chars() {
        let ok = "映".repeat(MAX_COMMENT_CHARS);
        let input = ReviewInput { movie_id: Some(1), rating: Some(3), comment: Some(ok.clone()) };
        assert_eq!(input.validate().unwrap().comment, Some(ok));

        let too_long = "a".repeat(MAX_COMMENT_CHARS + 1);
        let input = ReviewInput { movie_id: Some(1), rating: Some(3), comment: Some(too_long) };
        let Err(AppError::Validation(errors)) = input.validate() else {
            panic!("long comment should be rejected");
        };
        assert!(errors.contains_key("comment"));
    }

    #[test]
    fn update_requires_review_id() {
        let input = UpdateReviewInput {
            review_id: None,
            movie_id: Some(1),
            rating: Some(4),
            comment: None,
        };
        let Err(AppError::Validation(errors)) = input.validate() else {
            panic!("missing review_id should be rejected");
        };
        assert!(errors.contains_key("review_id"));
    }

    #[test]
    fn blank_keyword_is_rejected() {
        let q = SearchQuery { search_keyword: Some("   ".to_string()) };
        assert!(q.keyword().is_err());
        let q = SearchQuery { search_keyword: Some(" Matrix ".to_string()) };
        assert_eq!(q.keyword().unwrap(), "Matrix");
    }
}
