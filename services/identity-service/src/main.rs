use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_middleware::CorrelationIdMiddleware;
use actix_web::{web, App, HttpServer};
use auth_core::{password, TokenIssuer};
use identity_service::handlers::{self, AuthState};
use identity_service::Config;
use sqlx::postgres::PgPoolOptions;
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

    tracing::info!("starting identity-service v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    seed_admin_user(&pool).await?;

    let issuer = Arc::new(
        TokenIssuer::from_rsa_pem(&config.jwt.private_key_pem)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?,
    );
    let auth_state = web::Data::new(AuthState {
        issuer,
        public_key_pem: config.jwt.public_key_pem.clone(),
    });

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("starting HTTP server at {bind_address}");

    let pool_data = web::Data::new(pool);
    HttpServer::new(move || {
        App::new()
            .app_data(pool_data.clone())
            .app_data(auth_state.clone())
            .wrap(Cors::permissive())
            .wrap(CorrelationIdMiddleware)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/api/v1/auth")
                    .route("/login", web::post().to(handlers::login))
                    .route("/public-key", web::get().to(handlers::public_key)),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}

/// Make sure the bootstrap admin account exists.
async fn seed_admin_user(pool: &sqlx::PgPool) -> io::Result<()> {
    let admin_password =
        std::env::var("ADMIN_BOOTSTRAP_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    let hash = password::hash_password(&admin_password)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    identity_service::db::ensure_user(pool, "admin", &hash, "ADMIN")
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    tracing::info!("admin user ensured");
    Ok(())
}
