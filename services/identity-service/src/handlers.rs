use actix_web::{web, HttpResponse};
use auth_core::{password, Role, TokenIssuer};
use error_types::{AppError, AppResult};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::db;
use crate::models::{LoginRequest, PublicKeyResponse, TokenResponse};

pub struct AuthState {
    pub issuer: Arc<TokenIssuer>,
    pub public_key_pem: String,
}

/// POST /api/v1/auth/login
pub async fn login(
    pool: web::Data<PgPool>,
    state: web::Data<AuthState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = db::find_by_username(&pool, &body.username)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid credentials".to_string()))?;

    let valid = password::verify_password(&body.password, &user.password_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !valid {
        warn!(username = %body.username, "failed login attempt");
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    }

    let role = Role::from_str(&user.role)
        .map_err(|_| AppError::Internal(format!("unknown role in database: {}", user.role)))?;

    let access_token = state
        .issuer
        .issue(user.id, &user.username, role)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(username = %user.username, "user logged in");

    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.issuer.token_ttl_seconds(),
    }))
}

/// GET /api/v1/auth/public-key
///
/// Services fetch this once at bootstrap (or get it via configuration);
/// verification itself never calls back here.
pub async fn public_key(state: web::Data<AuthState>) -> HttpResponse {
    HttpResponse::Ok().json(PublicKeyResponse {
        public_key: state.public_key_pem.clone(),
        algorithm: "RS256".to_string(),
    })
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "identity-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
