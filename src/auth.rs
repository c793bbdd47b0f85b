//! Identity boundary.
//!
//! Tokens are issued by the external identity provider; this service only
//! verifies the shared-secret JWT and reads the subject and role claims.
//! Admin routes take the [`AdminUser`] extractor, which rejects anything
//! without the admin role before the handler body runs.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::ServiceError, services::cart::OwnerKey, AppState};

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// JWT claims shared with the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}

/// An authenticated user holding the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthenticatedUser);

/// Verifies a bearer token and extracts the caller identity.
pub fn verify_token(token: &str, secret: &str) -> Result<AuthenticatedUser, ServiceError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("Invalid token: {}", e)))?;

    let user_id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| ServiceError::Unauthorized("Invalid subject claim".to_string()))?;

    Ok(AuthenticatedUser {
        user_id,
        role: data.claims.role,
    })
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;
        verify_token(token, &state.config.jwt_secret)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ServiceError::Forbidden(
                "Admin role required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

/// Cart owner context: the authenticated user when a valid bearer token is
/// present, otherwise the anonymous session identifier from the
/// `X-Session-Id` header. Exactly one of the two keys scopes every cart
/// operation.
#[derive(Debug, Clone)]
pub struct CartOwner(pub OwnerKey);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CartOwner {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(parts) {
            let user = verify_token(token, &state.config.jwt_secret)?;
            return Ok(CartOwner(OwnerKey::User(user.user_id)));
        }

        let session_id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match session_id {
            Some(sid) => Ok(CartOwner(OwnerKey::Session(sid.to_string()))),
            None => Err(ServiceError::ValidationError(
                "Missing cart owner: provide a bearer token or X-Session-Id header".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret-test-secret-test-secret!";

    fn token_for(role: Role, exp_offset_secs: i64) -> String {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role,
            exp: (chrono::Utc::now().timestamp() + exp_offset_secs) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode")
    }

    #[test]
    fn valid_token_round_trips() {
        let token = token_for(Role::Admin, 3600);
        let user = verify_token(&token, SECRET).expect("verify");
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = token_for(Role::Customer, -3600);
        assert!(matches!(
            verify_token(&token, SECRET),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = token_for(Role::Customer, 3600);
        assert!(verify_token(&token, "another-secret-another-secret!!!").is_err());
    }
}
