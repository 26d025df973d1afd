use dotenvy::dotenv;
use feed_api::{AppState, create_app};
use feed_core::{
    EventPublisher, EventSourcingHandler, EventStore, EventStoreRepository,
    adapters::{
        in_memory_event_bus::InMemoryEventBus, in_memory_repository::InMemoryEventRepository,
        postgres_repository::PostgresEventRepository, rabbitmq_event_bus::RabbitMqEventBus,
    },
    domain::post::PostAggregate,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

// Runs the event-store migrations using sqlx migrate
async fn run_migrations(
    pool: &sqlx::PgPool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Applying database migrations...");
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new("./migrations")).await?;
    migrator.run(pool).await?;
    info!("Migrations applied successfully.");
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize tracing (logging)
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting Feed API v{}...", env!("CARGO_PKG_VERSION"));
    // Load environment (.env) if present
    dotenv().ok();

    // --- Configuration ---
    let topic = std::env::var("EVENT_TOPIC").unwrap_or_else(|_| "social-feed-events".to_string());
    let exchange_name =
        std::env::var("RABBITMQ_EXCHANGE_NAME").unwrap_or_else(|_| "feed_exchange".to_string());

    // --- Event store repository: Postgres when configured, in-memory otherwise ---
    let mut pg_pool = None;
    let repository: Arc<dyn EventStoreRepository> = match std::env::var("DATABASE_URL") {
        Ok(url) => match PgPoolOptions::new().max_connections(5).connect(&url).await {
            Ok(pool) => {
                info!("Connected to Postgres event store");
                if let Err(e) = run_migrations(&pool).await {
                    error!("Database migration failed: {}", e);
                    return;
                }
                pg_pool = Some(pool.clone());
                Arc::new(PostgresEventRepository::new(pool))
            }
            Err(e) => {
                error!("Failed to connect to Postgres: {}", e);
                return;
            }
        },
        Err(_) => {
            warn!("DATABASE_URL not set; using in-memory event store (non-durable)");
            Arc::new(InMemoryEventRepository::default())
        }
    };

    // --- Notification channel: RabbitMQ when configured, in-memory otherwise ---
    let producer: Arc<dyn EventPublisher> = match std::env::var("RABBITMQ_URL") {
        Ok(url) => match RabbitMqEventBus::new(&url, &exchange_name).await {
            Ok(bus) => {
                info!("Connected to RabbitMQ for event publishing");
                Arc::new(bus)
            }
            Err(e) => {
                error!("Failed to connect to RabbitMQ: {}", e);
                return;
            }
        },
        Err(_) => {
            warn!("RABBITMQ_URL not set; using in-memory event bus");
            Arc::new(InMemoryEventBus::default())
        }
    };

    let event_store = EventStore::<PostAggregate>::new(repository, producer, topic);
    let post_handler = Arc::new(EventSourcingHandler::new(event_store));

    let app_state = AppState {
        post_handler,
        pg_pool,
    };
    let app = create_app(app_state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .expect("invalid BIND_ADDR");
    let listener = TcpListener::bind(addr).await.expect("failed to bind");
    info!("Feed API listening on {}", addr);
    axum::serve(listener, app).await.expect("server error");
}
