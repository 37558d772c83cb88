use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_middleware::CorrelationIdMiddleware;
use actix_web::{web, App, HttpServer};
use api_gateway::proxy::{self, GatewayState};
use api_gateway::routes::RouteTable;
use api_gateway::{handlers, Config};
use dashmap::DashMap;
use resilience::{CircuitBreaker, CircuitBreakerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| {
        tracing::error!("configuration loading failed: {e}");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    tracing::info!("starting api-gateway v{}", env!("CARGO_PKG_VERSION"));

    // One breaker per upstream, shared across all requests.
    let breakers = DashMap::new();
    for route in &config.routes {
        breakers.insert(
            route.name.clone(),
            Arc::new(CircuitBreaker::new(
                route.name.clone(),
                CircuitBreakerConfig {
                    fail_max: config.breaker.fail_max,
                    reset_timeout: config.breaker.reset_timeout,
                },
            )),
        );
        tracing::info!(
            upstream = %route.name,
            prefix = %route.prefix,
            "route registered"
        );
    }

    let client = reqwest::Client::builder()
        .connect_timeout(config.timeouts.connect)
        .timeout(config.timeouts.read)
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let state = web::Data::new(GatewayState {
        client,
        routes: RouteTable::new(config.routes.clone()),
        breakers,
    });

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("starting HTTP server at {bind_address}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .wrap(CorrelationIdMiddleware)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/health", web::get().to(handlers::health))
            .route(
                "/health/dependencies",
                web::get().to(handlers::health_dependencies),
            )
            .default_service(web::route().to(proxy::proxy))
    })
    .bind(&bind_address)?
    .run()
    .await
}
