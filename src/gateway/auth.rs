//! Caller authentication
//!
//! User routes take an HS256 JWT (`Authorization: Bearer <token>`) whose
//! `sub` is the user id. Operator routes take `X-Internal-Secret`.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::state::AppState;
use super::types::{ApiResponse, error_codes};

pub const INTERNAL_SECRET_HEADER: &str = "X-Internal-Secret";

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id as string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

/// Authenticated caller, injected as a request extension
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: i64,
    pub phone: Option<String>,
}

type Rejection = (StatusCode, Json<ApiResponse<()>>);

fn reject(status: StatusCode, code: i32, msg: &str) -> Rejection {
    (status, Json(ApiResponse::<()>::error(code, msg)))
}

/// Decode and validate a token into the caller it names
pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    let user_id = data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| jsonwebtoken::errors::ErrorKind::InvalidSubject)?;
    Ok(AuthUser {
        user_id,
        phone: data.claims.phone,
    })
}

pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Rejection> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            reject(
                StatusCode::UNAUTHORIZED,
                error_codes::MISSING_AUTH,
                "Missing Authorization header",
            )
        })?;

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Err(reject(
            StatusCode::UNAUTHORIZED,
            error_codes::AUTH_FAILED,
            "Invalid token format",
        ));
    };

    match verify_token(token, &state.jwt_secret) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::debug!(error = %e, "JWT rejected");
            Err(reject(
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "Invalid or expired token",
            ))
        }
    }
}

pub async fn internal_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Rejection> {
    if !internal_secret_matches(request.headers(), &state.internal_secret) {
        tracing::warn!(path = %request.uri().path(), "Operator request rejected");
        return Err(reject(
            StatusCode::FORBIDDEN,
            error_codes::AUTH_FAILED,
            "Missing or invalid X-Internal-Secret",
        ));
    }
    Ok(next.run(request).await)
}

fn internal_secret_matches(headers: &HeaderMap, expected: &str) -> bool {
    !expected.is_empty()
        && headers
            .get(INTERNAL_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(sub: &str, exp_offset: i64, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            phone: Some("254700000000".into()),
            exp: (now + exp_offset) as usize,
            iat: now as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let user = verify_token(&token("42", 3600, "s3cret"), "s3cret").unwrap();
        assert_eq!(user.user_id, 42);
        assert_eq!(user.phone.as_deref(), Some("254700000000"));
    }

    #[test]
    fn test_reject_bad_tokens() {
        assert!(verify_token(&token("42", 3600, "other"), "s3cret").is_err());
        assert!(verify_token(&token("42", -3600, "s3cret"), "s3cret").is_err());
        assert!(verify_token(&token("alice", 3600, "s3cret"), "s3cret").is_err());
        assert!(verify_token("garbage", "s3cret").is_err());
    }

    #[test]
    fn test_internal_secret() {
        let mut headers = HeaderMap::new();
        assert!(!internal_secret_matches(&headers, "ops"));
        headers.insert(INTERNAL_SECRET_HEADER, "ops".parse().unwrap());
        assert!(internal_secret_matches(&headers, "ops"));
        assert!(!internal_secret_matches(&headers, "other"));
        assert!(!internal_secret_matches(&headers, ""));
    }
}
