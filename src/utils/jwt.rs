// src/utils/jwt.rs

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError};

/// Bearer token claims. Tokens are minted by the identity service; this
/// crate only checks the signature and reads the acting user from them.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// User id, as a decimal string.
    pub sub: String,
    /// `user` or `admin`.
    pub role: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: usize,
}

impl Claims {
    /// The acting user, threaded explicitly into every engine call.
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid subject in token".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Checks signature and expiry, returning the claims on success.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Rejects requests without a valid bearer token (401) and stores the
/// verified `Claims` in the request extensions for the write handlers.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&req).ok_or(StatusCode::UNAUTHORIZED)?;
    let claims = verify_jwt(token, &config.jwt_secret).map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Moderation routes only. Runs inside `auth_middleware`; non-admins get 403.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    match req.extensions().get::<Claims>() {
        Some(claims) if claims.is_admin() => Ok(next.run(req).await),
        Some(_) => Err(StatusCode::FORBIDDEN),
        None => Err(StatusCode::UNAUTHORIZED),
    }
}
