use actix_web::{web, HttpRequest, HttpResponse};
use actix_middleware::get_correlation_id;
use error_types::{AppError, AppResult};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreatePrice, LockRequest, UpdatePrice};
use crate::service::PricingService;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn create_price(
    req: HttpRequest,
    service: web::Data<PricingService>,
    body: web::Json<CreatePrice>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let price = service.create(input, get_correlation_id(&req)).await?;
    Ok(HttpResponse::Created().json(price))
}

pub async fn get_price(
    service: web::Data<PricingService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let price = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(price))
}

pub async fn list_prices(
    service: web::Data<PricingService>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let prices = service
        .list(query.limit.clamp(1, 1000), query.skip.max(0))
        .await?;
    Ok(HttpResponse::Ok().json(prices))
}

pub async fn update_price(
    req: HttpRequest,
    service: web::Data<PricingService>,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePrice>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let price = service
        .update(path.into_inner(), input, get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::Ok().json(price))
}

pub async fn delete_price(
    req: HttpRequest,
    service: web::Data<PricingService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    service
        .delete(path.into_inner(), get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn lock_price(
    service: web::Data<PricingService>,
    path: web::Path<Uuid>,
    body: web::Json<LockRequest>,
) -> AppResult<HttpResponse> {
    let price = service.lock(path.into_inner(), body.saga_id).await?;
    Ok(HttpResponse::Ok().json(price))
}

pub async fn unlock_price(
    service: web::Data<PricingService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let price = service.unlock(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(price))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "pricing-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
