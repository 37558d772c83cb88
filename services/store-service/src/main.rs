use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_middleware::CorrelationIdMiddleware;
use actix_web::{web, App, HttpServer};
use event_bus::EventBusConfig;
use idempotent_consumer::ProcessedEventLedger;
use saga_client::ExternalTaskWorker;
use sqlx::postgres::PgPoolOptions;
use store_service::composer::Composer;
use store_service::consumers::{queue_for, ProjectionHandler};
use store_service::es::EsClient;
use store_service::saga::{
    CreateStoreEntryHandler, DeleteStoreEntryHandler, CREATE_STORE_ENTRY, DELETE_STORE_ENTRY,
};
use store_service::service::ProjectionService;
use store_service::{handlers, Config};
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LEDGER_RETENTION: Duration = Duration::from_secs(7 * 86_400);
const LEDGER_CLEANUP_INTERVAL: Duration = Duration::from_secs(3_600);

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

    tracing::info!("starting store-service v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let es = EsClient::new(&config.elasticsearch.url, &config.elasticsearch.index)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string()))?;
    tracing::info!("search index ready");

    let composer = Composer::new(config.upstreams.clone(), config.identity.clone());
    let service = Arc::new(ProjectionService::new(pool.clone(), composer, es));
    let ledger = ProcessedEventLedger::new(pool.clone(), LEDGER_RETENTION);

    let mut tasks: JoinSet<()> = JoinSet::new();

    // One durable queue per routing key; each consumer feeds the projector.
    let bus_config = EventBusConfig::new(config.amqp.url.clone())
        .with_exchange(config.amqp.exchange.clone());
    for routing_key in event_schema::routing_keys::ALL {
        let handler = ProjectionHandler::new(service.clone(), ledger.clone());
        let consumer_config = bus_config.clone();
        tasks.spawn(async move {
            event_bus::run_consumer(
                consumer_config,
                queue_for(routing_key),
                routing_key.to_string(),
                handler,
            )
            .await;
        });
    }

    // Ledger retention
    let cleanup_ledger = ledger.clone();
    tasks.spawn(async move {
        cleanup_ledger.run_cleanup(LEDGER_CLEANUP_INTERVAL).await;
    });

    // Saga workers: create-store-entry / delete-store-entry
    let worker = ExternalTaskWorker::new(
        config.workflow.base_url.clone(),
        "store-worker".to_string(),
    )
    .subscribe(
        CREATE_STORE_ENTRY,
        Arc::new(CreateStoreEntryHandler::new(service.clone())),
    )
    .subscribe(
        DELETE_STORE_ENTRY,
        Arc::new(DeleteStoreEntryHandler::new(service.clone())),
    );
    tasks.spawn(async move {
        worker.run().await;
    });

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("starting HTTP server at {bind_address}");

    let service_data = web::Data::from(service.clone());
    let server = HttpServer::new(move || {
        App::new()
            .app_data(service_data.clone())
            .wrap(Cors::permissive())
            .wrap(CorrelationIdMiddleware)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/api/v1/store")
                    .route("/offerings", web::get().to(handlers::list_offerings))
                    .route("/offerings/{id}", web::get().to(handlers::get_offering))
                    .route(
                        "/offerings/{id}",
                        web::delete().to(handlers::delete_offering),
                    )
                    .route("/search", web::get().to(handlers::search_offerings))
                    .route("/sync/{id}", web::post().to(handlers::sync_offering)),
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

    tracing::info!("store-service shut down");
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
