//! Bearer-token and API-key authentication.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{AuthConfig, AuthMode};
use crate::error::ApiError;
use crate::state::AppState;

/// Claims carried by a signed bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (caller identity)
    pub sub: String,
    /// Expiration, seconds since epoch
    pub exp: i64,
}

/// How a request authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVia {
    Bearer,
    ApiKey,
}

/// The authenticated caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
    pub via: AuthVia,
}

/// Authentication middleware. In `Optional` mode a request without
/// credentials passes anonymously, but a presented credential must still
/// verify.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth = &state.config.auth;
    if auth.mode == AuthMode::Disabled {
        return next.run(request).await;
    }

    match extract_identity(auth, request.headers()) {
        Ok(Some(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(None) => match auth.mode {
            AuthMode::Optional => next.run(request).await,
            _ => ApiError::unauthorized("missing credentials").into_response(),
        },
        Err(err) => err.into_response(),
    }
}

/// Pull an identity out of the request headers, if any credential is
/// present.
pub fn extract_identity(
    auth: &AuthConfig,
    headers: &HeaderMap,
) -> Result<Option<Identity>, ApiError> {
    if let Some(value) = headers.get("Authorization") {
        let raw = value
            .to_str()
            .map_err(|_| ApiError::unauthorized("malformed Authorization header"))?;
        let token = raw
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("expected Bearer authorization"))?;
        let claims = verify_token(auth, token)?;
        return Ok(Some(Identity {
            subject: claims.sub,
            via: AuthVia::Bearer,
        }));
    }

    if let Some(value) = headers.get("X-API-Key") {
        let key = value
            .to_str()
            .map_err(|_| ApiError::unauthorized("malformed API key"))?;
        if !auth.api_keys.contains(key) {
            return Err(ApiError::unauthorized("unknown API key"));
        }
        return Ok(Some(Identity {
            subject: "api-key".to_string(),
            via: AuthVia::ApiKey,
        }));
    }

    Ok(None)
}

fn verify_token(auth: &AuthConfig, token: &str) -> Result<Claims, ApiError> {
    let secret = auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("bearer tokens are not configured"))?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| ApiError::unauthorized(format!("token validation failed: {}", e)))?;

    Ok(data.claims)
}
