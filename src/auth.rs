use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use rand::RngCore;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    AppState,
    catalog::now_sec,
    entities::user,
    error::{AppError, AppResult},
};

/// The authenticated caller, resolved once from the bearer token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: i32,
    pub name: String,
    pub email: String,
}

impl From<user::Model> for AuthUser {
    fn from(u: user::Model) -> Self {
        Self { id: u.id, name: u.name, email: u.email }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        <AuthUser as OptionalFromRequestParts<Arc<AppState>>>::from_request_parts(parts, state)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

/// Absent, malformed or unknown credentials yield `None`. Handlers that need a
/// principal take `AuthUser` directly and reject those with 401.
impl OptionalFromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(None);
        };
        let Some(token) = header
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            tracing::debug!("malformed authorization header");
            return Ok(None);
        };

        let user = user::Entity::find()
            .filter(user::Column::ApiTokenHash.eq(hash_token(token)))
            .one(&state.db)
            .await?;

        match user {
            Some(user) => {
                tracing::debug!(user_id = user.id, "authenticated request");
                Ok(Some(user.into()))
            },
            None => {
                tracing::debug!("unknown api token");
                Ok(None)
            },
        }
    }
}

/// Creates a user and returns it with its plaintext token. Only the token's
/// digest is stored.
pub async fn create_user(
    db: &DatabaseConnection,
    name: &str,
    email: &str,
) -> AppResult<(AuthUser, String)> {
    let token = generate_token();
    let created = user::ActiveModel {
        id: Default::default(),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        api_token_hash: Set(hash_token(&token)),
        created_at: Set(now_sec()),
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = created.id, email = %created.email, "created user");
    Ok((created.into(), token))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
