use actix_web::{web, HttpRequest, HttpResponse};
use actix_middleware::get_correlation_id;
use error_types::{AppError, AppResult};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateCharacteristic, UpdateCharacteristic};
use crate::service::CharacteristicService;

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

pub async fn create_characteristic(
    req: HttpRequest,
    service: web::Data<CharacteristicService>,
    body: web::Json<CreateCharacteristic>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let characteristic = service.create(input, get_correlation_id(&req)).await?;
    Ok(HttpResponse::Created().json(characteristic))
}

pub async fn get_characteristic(
    service: web::Data<CharacteristicService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let characteristic = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(characteristic))
}

pub async fn list_characteristics(
    service: web::Data<CharacteristicService>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let characteristics = service
        .list(query.limit.clamp(1, 1000), query.skip.max(0))
        .await?;
    Ok(HttpResponse::Ok().json(characteristics))
}

pub async fn update_characteristic(
    req: HttpRequest,
    service: web::Data<CharacteristicService>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCharacteristic>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let characteristic = service
        .update(path.into_inner(), input, get_correlation_id(&req))
        .await?;
    Ok(HttpResponse::Ok().json(characteristic))
}

pub async fn delete_characteristic(
    req: HttpRequest,
    service: web::Data<CharacteristicService>,
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
        "service": "characteristic-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
