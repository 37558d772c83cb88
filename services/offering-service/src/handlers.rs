use actix_web::{web, HttpRequest, HttpResponse};
use actix_middleware::get_correlation_id;
use error_types::{AppError, AppResult};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateOffering, UpdateOffering};
use crate::service::OfferingService;

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

pub async fn create_offering(
    req: HttpRequest,
    service: web::Data<OfferingService>,
    body: web::Json<CreateOffering>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let offering = service.create(input, get_correlation_id(&req)).await?;
    Ok(HttpResponse::Created().json(offering))
}

pub async fn get_offering(
    service: web::Data<OfferingService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let offering = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(offering))
}

pub async fn list_offerings(
    service: web::Data<OfferingService>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let offerings = service
        .list(query.limit.clamp(1, 1000), query.skip.max(0))
        .await?;
    Ok(HttpResponse::Ok().json(offerings))
}

pub async fn update_offering(
    req: HttpRequest,
    service: web::Data<OfferingService>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOffering>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let offering = service
        .update(path.into_inner(), input, get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::Ok().json(offering))
}

pub async fn delete_offering(
    service: web::Data<OfferingService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    service.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn publish_offering(
    req: HttpRequest,
    service: web::Data<OfferingService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let offering = service
        .publish(path.into_inner(), get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::Ok().json(offering))
}

pub async fn retire_offering(
    req: HttpRequest,
    service: web::Data<OfferingService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let offering = service
        .retire(path.into_inner(), get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::Ok().json(offering))
}

pub async fn confirm_offering(
    req: HttpRequest,
    service: web::Data<OfferingService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let offering = service
        .confirm(path.into_inner(), get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::Ok().json(offering))
}

pub async fn fail_offering(
    req: HttpRequest,
    service: web::Data<OfferingService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let offering = service
        .fail(path.into_inner(), get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::Ok().json(offering))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "offering-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
