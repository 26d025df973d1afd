use dotenvy::dotenv;
use feed_core::EventRecord;
use feed_core::adapters::rabbitmq_event_bus::RabbitMqEventBus;
use futures_util::StreamExt;
use lapin::{
    Channel, Consumer,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
};
use sqlx::postgres::PgPoolOptions;
use std::env;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

mod handler;
mod models;
mod repositories;

use handler::ProjectionEventHandler;

mod migrations {
    refinery::embed_migrations!("./migrations");
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Migrations run over a dedicated tokio_postgres client, separate from the
// sqlx pool the handlers use.
async fn run_migrations(db_url: &str) -> Result<(), BoxError> {
    let config: tokio_postgres::Config = db_url.parse()?;
    let (mut client, connection) = config.connect(tokio_postgres::NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("PostgreSQL connection error (migrations): {}", e);
        }
    });

    info!("Applying read model migrations...");
    let report = migrations::migrations::runner()
        .run_async(&mut client)
        .await?;

    if report.applied_migrations().is_empty() {
        info!("No new migrations to apply.");
    } else {
        info!(
            "Applied {} migrations: {:?}",
            report.applied_migrations().len(),
            report
                .applied_migrations()
                .iter()
                .map(|m| m.name())
                .collect::<Vec<_>>()
        );
    }
    Ok(())
}

async fn setup_consumer(
    channel: Channel,
    exchange: &str,
    queue_name: &str,
    routing_key: &str,
    consumer_tag: &str,
) -> Result<Consumer, lapin::Error> {
    channel
        .queue_declare(
            queue_name,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            queue_name,
            exchange,
            routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;
    info!(
        "Queue '{}' bound to exchange '{}' with key '{}'.",
        queue_name, exchange, routing_key
    );

    channel
        .basic_consume(
            queue_name,
            consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(
        "Starting Projection Worker v{}...",
        env!("CARGO_PKG_VERSION")
    );

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let rabbitmq_url = env::var("RABBITMQ_URL").expect("RABBITMQ_URL must be set");
    let exchange_name =
        env::var("RABBITMQ_EXCHANGE_NAME").unwrap_or_else(|_| "feed_exchange".to_string());
    // The binding key matches the topic the event store publishes with.
    let event_topic = env::var("EVENT_TOPIC").unwrap_or_else(|_| "social-feed-events".to_string());
    let queue_name = "projection_worker_post_queue";

    if let Err(e) = run_migrations(&database_url).await {
        error!("Database migration failed: {}", e);
        return Err(e);
    }

    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    info!("Database connection pool established.");

    let bus = RabbitMqEventBus::new(&rabbitmq_url, &exchange_name).await?;

    let mut consumer: Consumer = setup_consumer(
        bus.create_subscriber_channel().await?,
        &exchange_name,
        queue_name,
        &event_topic,
        "post_projection_consumer",
    )
    .await?;

    let handler = ProjectionEventHandler::new(db_pool);
    info!("Projection Worker started successfully. Listening for events...");

    while let Some(delivery_result) = consumer.next().await {
        let delivery = match delivery_result {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("Error receiving delivery: {}", e);
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        let record: EventRecord = match serde_json::from_slice(&delivery.data) {
            Ok(record) => record,
            Err(e) => {
                // A payload that cannot be decoded never will be; drop it.
                error!("Undecodable event payload, NACKing without requeue: {}", e);
                if let Err(nack_err) = delivery
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    })
                    .await
                {
                    error!("Failed to NACK undecodable message: {}", nack_err);
                }
                continue;
            }
        };

        match handler.handle_record(&record).await {
            Ok(()) => {
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    error!("Failed to ACK event: {}", e);
                }
            }
            Err(e) => {
                error!("Error projecting event: {}. NACKing...", e);
                // Nack without requeueing to avoid poison messages.
                if let Err(nack_err) = delivery
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    })
                    .await
                {
                    error!("Failed to NACK event: {}", nack_err);
                }
            }
        }
    }

    warn!("Consumer stream ended, shutting down.");
    Ok(())
}
