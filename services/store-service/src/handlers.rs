use actix_web::{web, HttpResponse};
use error_types::{AppError, AppResult};
use serde::Deserialize;
use uuid::Uuid;

use crate::service::ProjectionService;

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

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub async fn get_offering(
    service: web::Data<ProjectionService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let document = service.get_offering(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(document))
}

pub async fn list_offerings(
    service: web::Data<ProjectionService>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let documents = service
        .list_offerings(query.limit.clamp(1, 1000), query.skip.max(0))
        .await?;
    Ok(HttpResponse::Ok().json(documents))
}

pub async fn search_offerings(
    service: web::Data<ProjectionService>,
    query: web::Query<SearchQuery>,
) -> AppResult<HttpResponse> {
    let hits = service.search(&query.q, query.limit).await?;
    Ok(HttpResponse::Ok().json(hits))
}

/// Operational endpoint; also driven by the create-store-entry saga task.
pub async fn sync_offering(
    service: web::Data<ProjectionService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    service
        .sync_offering(path.into_inner())
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_offering(
    service: web::Data<ProjectionService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    service.remove_offering(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "store-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
