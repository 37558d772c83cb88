use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_middleware::{CorrelationIdMiddleware, JwtAuth, RoleGuard};
use actix_web::{web, App, HttpServer};
use auth_core::TokenVerifier;
use event_bus::{EventBus, EventBusConfig};
use saga_client::ExternalTaskWorker;
use specification_service::consumers::{CharacteristicCacheConsumer, CACHE_SYNC_QUEUE};
use specification_service::saga::{ValidateSpecificationsHandler, VALIDATE_SPECIFICATIONS};
use specification_service::service::SpecificationService;
use specification_service::{handlers, Config};
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transactional_outbox::{DispatcherConfig, OutboxDispatcher, SqlxOutboxRepository};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| {
        tracing::error!("configuration loading failed: {e}");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    tracing::info!(
        "starting specification-service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let verifier = Arc::new(
        TokenVerifier::from_rsa_pem(&config.jwt.public_key_pem)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?,
    );

    let outbox = Arc::new(SqlxOutboxRepository::new(pool.clone()));
    let service = Arc::new(SpecificationService::new(pool.clone(), outbox.clone()));
    let service_data = web::Data::from(service.clone());

    let bus_config = EventBusConfig::new(config.amqp.url.clone())
        .with_exchange(config.amqp.exchange.clone());

    let mut tasks: JoinSet<()> = JoinSet::new();

    // Outbox dispatcher
    let bus = EventBus::connect(bus_config.clone())
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string()))?;
    let dispatcher = OutboxDispatcher::new(outbox, Arc::new(bus), DispatcherConfig::default());
    let dispatcher_pool = pool.clone();
    tasks.spawn(async move {
        dispatcher.run(dispatcher_pool).await;
    });

    // Characteristic cache sync (C8)
    let cache_consumer = CharacteristicCacheConsumer::new(pool.clone());
    let consumer_config = bus_config.clone();
    tasks.spawn(async move {
        event_bus::run_consumer(
            consumer_config,
            CACHE_SYNC_QUEUE.to_string(),
            event_schema::routing_keys::CHARACTERISTICS.to_string(),
            cache_consumer,
        )
        .await;
    });

    // Saga worker: validate-specifications
    let worker = ExternalTaskWorker::new(
        config.workflow.base_url.clone(),
        "specification-worker".to_string(),
    )
    .subscribe(
        VALIDATE_SPECIFICATIONS,
        Arc::new(ValidateSpecificationsHandler::new(service.clone())),
    );
    tasks.spawn(async move {
        worker.run().await;
    });

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("starting HTTP server at {bind_address}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(service_data.clone())
            .wrap(Cors::permissive())
            .wrap(CorrelationIdMiddleware)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/api/v1/specifications")
                    .wrap(JwtAuth::new(verifier.clone()))
                    .service(
                        web::resource("")
                            .route(
                                web::post()
                                    .to(handlers::create_specification)
                                    .wrap(RoleGuard::admin()),
                            )
                            .route(
                                web::get()
                                    .to(handlers::list_specifications)
                                    .wrap(RoleGuard::any_user()),
                            ),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(
                                web::get()
                                    .to(handlers::get_specification)
                                    .wrap(RoleGuard::any_user()),
                            )
                            .route(
                                web::put()
                                    .to(handlers::update_specification)
                                    .wrap(RoleGuard::admin()),
                            )
                            .route(
                                web::delete()
                                    .to(handlers::delete_specification)
                                    .wrap(RoleGuard::admin()),
                            ),
                    ),
            )
    })
    .bind(&bind_address)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
        result = tasks.join_next() => {
            tracing::error!(?result, "background task exited unexpectedly");
        }
    }

    server_handle.stop(true).await;
    tasks.shutdown().await;
    let _ = server_task.await;

    tracing::info!("specification-service shut down");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    }
}
