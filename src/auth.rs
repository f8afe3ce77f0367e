//! Caller identity, consumed at its interface: "is the caller authenticated,
//! and what is the caller's customer id".
//!
//! Identity arrives as a bearer JWT issued by the account system. The
//! `authenticate` middleware decodes it once per request and stashes the
//! resulting [`AuthCustomer`] in request extensions; extractors below read it
//! from there. A browsing session is a separate axis, carried in the
//! `x-session-id` header, and exists before any login does.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

/// Header carrying the opaque browsing-session identifier.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the customer id
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Authenticated caller data extracted from the JWT token
#[derive(Debug, Clone)]
pub struct AuthCustomer {
    pub customer_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Issues a signed token for a customer. Used by the seed tool and tests.
pub fn issue_token(
    customer_id: Uuid,
    name: Option<String>,
    email: Option<String>,
    secret: &str,
    ttl_secs: usize,
) -> Result<String, ServiceError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: customer_id.to_string(),
        name,
        email,
        iat: now,
        exp: now + ttl_secs as i64,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::AuthError(format!("Token creation failed: {}", e)))
}

/// Validates a JWT token and extracts the claims
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ServiceError::AuthError("Token expired".to_string())
        }
        _ => ServiceError::AuthError("Invalid token".to_string()),
    })
}

/// Middleware that decodes a bearer token when present and records the caller
/// identity as a request extension. Unauthenticated requests pass through;
/// routes that need identity enforce it via [`RequireCustomer`].
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .map(str::to_owned);

    if let Some(token) = bearer {
        match decode_token(&token, &state.config.jwt_secret) {
            Ok(claims) => match Uuid::parse_str(&claims.sub) {
                Ok(customer_id) => {
                    request.extensions_mut().insert(AuthCustomer {
                        customer_id,
                        name: claims.name,
                        email: claims.email,
                    });
                }
                Err(_) => warn!("Bearer token subject is not a customer id"),
            },
            Err(e) => warn!("Rejected bearer token: {}", e),
        }
    }

    next.run(request).await
}

/// Extractor requiring an authenticated customer.
pub struct RequireCustomer(pub AuthCustomer);

#[async_trait]
impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthCustomer>()
            .cloned()
            .map(RequireCustomer)
            .ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string()))
    }
}

/// Extractor yielding the caller identity when present, without rejecting
/// unauthenticated requests. Checkout needs this: its precondition order
/// reports an empty cart before a missing login.
pub struct OptionalCustomer(pub Option<AuthCustomer>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalCustomer(
            parts.extensions.get::<AuthCustomer>().cloned(),
        ))
    }
}

/// Extractor for the opaque browsing-session id that owns a cart.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!("{} header is required", SESSION_ID_HEADER))
            })?;

        if !crate::cart::storage::is_valid_session_id(value) {
            return Err(ServiceError::InvalidInput(format!(
                "{} header must be 1-128 characters of [A-Za-z0-9_-]",
                SESSION_ID_HEADER
            )));
        }

        Ok(SessionId(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-unit-test-secret-unit-test-secret-unit-test-secret";

    #[test]
    fn token_round_trip_preserves_subject() {
        let customer_id = Uuid::new_v4();
        let token = issue_token(
            customer_id,
            Some("Ana Silva".into()),
            Some("ana@exemplo.ao".into()),
            SECRET,
            3600,
        )
        .unwrap();

        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, customer_id.to_string());
        assert_eq!(claims.email.as_deref(), Some("ana@exemplo.ao"));
    }

    #[test]
    fn decode_rejects_wrong_secret() {
        let token = issue_token(Uuid::new_v4(), None, None, SECRET, 3600).unwrap();
        let err = decode_token(&token, "another-secret-another-secret-another-secret-another")
            .unwrap_err();
        assert!(matches!(err, ServiceError::AuthError(_)));
    }

    #[test]
    fn decode_rejects_expired_token() {
        let customer_id = Uuid::new_v4();
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: customer_id.to_string(),
            name: None,
            email: None,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = decode_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, ServiceError::AuthError(msg) if msg.contains("expired")));
    }
}
