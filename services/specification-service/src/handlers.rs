use actix_web::{web, HttpRequest, HttpResponse};
use actix_middleware::get_correlation_id;
use error_types::{AppError, AppResult};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateSpecification, UpdateSpecification};
use crate::service::SpecificationService;

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

pub async fn create_specification(
    req: HttpRequest,
    service: web::Data<SpecificationService>,
    body: web::Json<CreateSpecification>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let spec = service.create(input, get_correlation_id(&req)).await?;
    Ok(HttpResponse::Created().json(spec))
}

pub async fn get_specification(
    service: web::Data<SpecificationService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let spec = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(spec))
}

pub async fn list_specifications(
    service: web::Data<SpecificationService>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let specs = service
        .list(query.limit.clamp(1, 1000), query.skip.max(0))
        .await?;
    Ok(HttpResponse::Ok().json(specs))
}

pub async fn update_specification(
    req: HttpRequest,
    service: web::Data<SpecificationService>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateSpecification>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let spec = service
        .update(path.into_inner(), input, get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::Ok().json(spec))
}

pub async fn delete_specification(
    req: HttpRequest,
    service: web::Data<SpecificationService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    service
        .delete(path.into_inner(), get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "specification-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
