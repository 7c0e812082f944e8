use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    auth::AuthUser,
    entities::movie,
    error::{AppError, AppResult},
    models::{
        ApiResponse, MovieSummary, ReviewInput, ReviewRecord, ReviewedMovie, SearchQuery,
        UpdateReviewInput,
    },
    sync,
};

pub async fn latest(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<MovieSummary>>> {
    let movies = sync::latest(&state.tmdb, &state.config.tmdb_image_base_url).await?;
    Ok(Json(movies.into_iter().map(MovieSummary::from).collect()))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(q), _): WithRejection<Query<SearchQuery>, AppError>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let keyword = q.keyword()?;
    let movies =
        sync::search(&state.catalog, &state.tmdb, &state.config.tmdb_image_base_url, keyword)
            .await?;
    Ok(Json(movies.into_iter().map(MovieSummary::from).collect()))
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(api_id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<ApiResponse<movie::Model>>> {
    let movie = state.catalog.find_by_api_id(api_id).await?.ok_or(AppError::MovieNotFound)?;
    Ok(Json(ApiResponse::ok(movie)))
}

pub async fn reviewed(
    State(state): State<Arc<AppState>>,
    user: Option<AuthUser>,
) -> AppResult<Json<ApiResponse<Vec<ReviewedMovie>>>> {
    let movies = state.reviews.reviewed_movies(user.map(|u| u.id)).await?;
    Ok(Json(ApiResponse::ok(movies)))
}

pub async fn user_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    WithRejection(Path(movie_api_id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<ApiResponse<ReviewRecord>>> {
    let review = state
        .reviews
        .find_for_user(user.id, movie_api_id)
        .await?
        .ok_or(AppError::ReviewNotFound)?;
    Ok(Json(ApiResponse::ok(review)))
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    WithRejection(Json(input), _): WithRejection<Json<ReviewInput>, AppError>,
) -> AppResult<Json<ApiResponse<ReviewRecord>>> {
    let input = input.validate()?;
    let review = state.reviews.create(user.id, &input).await?;
    Ok(Json(ApiResponse::ok(review)))
}

pub async fn update_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    WithRejection(Json(input), _): WithRejection<Json<UpdateReviewInput>, AppError>,
) -> AppResult<Json<ApiResponse<()>>> {
    let input = input.validate()?;
    state.reviews.update(user.id, &input).await?;
    Ok(Json(ApiResponse::done()))
}

pub async fn current_user(user: AuthUser) -> Json<AuthUser> {
    Json(user)
}
