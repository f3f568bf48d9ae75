use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Pull the bearer token out of an `Authorization` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_value = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;

    let user = validate_token(&token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

/// Check the shared secret database webhooks and cron triggers send.
/// Comparison goes through an HMAC so it runs in constant time.
pub fn verify_webhook_secret(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    if expected.is_empty() {
        return Err(AppError::Internal("Webhook secret is not configured".to_string()));
    }

    let supplied = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing webhook secret".to_string()))?;

    let digest = |value: &str| {
        let mut mac = Hmac::<Sha256>::new_from_slice(expected.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".to_string()))?;
        mac.update(value.as_bytes());
        Ok::<_, AppError>(mac)
    };

    let expected_tag = digest(expected)?.finalize().into_bytes();
    digest(supplied)?
        .verify_slice(&expected_tag)
        .map_err(|_| AppError::Auth("Invalid webhook secret".to_string()))
}
