use std::collections::BTreeMap;
use std::time::Duration;

use actix_web::{web, HttpResponse};

use crate::proxy::GatewayState;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "api-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Ping every upstream's health endpoint and report breaker states.
pub async fn health_dependencies(state: web::Data<GatewayState>) -> HttpResponse {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap_or_default();

    let mut dependencies = BTreeMap::new();
    for route in state.routes.iter() {
        let status = match client.get(format!("{}/health", route.upstream)).send().await {
            Ok(response) if response.status().is_success() => "healthy",
            Ok(_) => "unhealthy",
            Err(_) => "unreachable",
        };
        dependencies.insert(route.name.clone(), status);
    }

    let breakers: BTreeMap<String, &'static str> = state
        .breakers
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().state().as_str()))
        .collect();

    let all_healthy = dependencies.values().all(|s| *s == "healthy");

    HttpResponse::Ok().json(serde_json::json!({
        "status": if all_healthy { "healthy" } else { "degraded" },
        "dependencies": dependencies,
        "circuit_breakers": breakers,
    }))
}
