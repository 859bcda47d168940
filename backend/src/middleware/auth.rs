//! Authentication middleware
//!
//! Decodes the bearer JWT, checks it against the configured secret and
//! exposes the caller's company, user and permissions to handlers.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Permission to read catalog, ledger and reports
pub const STOCK_READ: (&str, &str) = ("stock", "read");
/// Permission to create and edit catalog items, movements and drafts
pub const STOCK_WRITE: (&str, &str) = ("stock", "write");
/// Permission to confirm and cancel journals
pub const STOCK_CONFIRM: (&str, &str) = ("stock", "confirm");

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        let permission = format!("{}:{}", resource, action);
        self.permissions.contains(&permission)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub company_id: String,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token.to_string(),
        None => return unauthorized("Missing or invalid Authorization header"),
    };

    let claims = match decode_jwt(&token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => return unauthorized(&msg),
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized("Invalid user ID in token"),
    };

    let company_id = match Uuid::parse_str(&claims.company_id) {
        Ok(id) => id,
        Err(_) => return unauthorized("Invalid company ID in token"),
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        company_id,
        permissions: claims.permissions,
    });

    next.run(request).await
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn unauthorized(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}

/// Extractor for authenticated user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Permission guard for use in handlers
pub fn check_permission(user: &AuthUser, (resource, action): (&str, &str)) -> AppResult<()> {
    if user.has_permission(resource, action) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.user_id, "Permission denied: requires {}:{}", resource, action);
        Err(AppError::InsufficientPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_check() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            permissions: vec!["stock:read".to_string(), "stock:write".to_string()],
        };

        assert!(check_permission(&user, STOCK_READ).is_ok());
        assert!(check_permission(&user, STOCK_WRITE).is_ok());
        assert!(matches!(
            check_permission(&user, STOCK_CONFIRM),
            Err(AppError::InsufficientPermissions)
        ));
    }
}
