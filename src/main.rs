// region:    --- Imports
use auction_ledger::app::{self, AppState};
use auction_ledger::config::Config;
use auction_ledger::database::DatabaseManager;
use auction_ledger::feed::AuctionFeed;
use auction_ledger::ledger::BidLedger;
use auction_ledger::message_broker::KafkaManager;
use auction_ledger::notification::{NotificationDispatcher, NotificationFeed};
use auction_ledger::publisher::EventPublisher;
use auction_ledger::scheduler::AuctionScheduler;
use auction_ledger::store::memory::{InMemoryAuctionStore, InMemoryNotificationStore};
use auction_ledger::store::postgres::{PostgresAuctionStore, PostgresNotificationStore};
use auction_ledger::store::{AuctionStore, NotificationStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .without_time()
        .with_target(false)
        .init();

    let feed = Arc::new(AuctionFeed::new(config.feed_capacity));

    // stores
    let auction_store: Arc<dyn AuctionStore>;
    let notification_store: Arc<dyn NotificationStore>;
    match &config.database_url {
        Some(database_url) => {
            let db_manager = Arc::new(
                DatabaseManager::new(database_url, config.database_max_connections).await?,
            );
            if let Err(e) = db_manager.initialize_database().await {
                error!("{:<12} --> database initialization failed: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> database ready", "Main");
            auction_store = Arc::new(PostgresAuctionStore::new(Arc::clone(&db_manager)));
            notification_store = Arc::new(PostgresNotificationStore::new(db_manager));
        }
        None => {
            warn!(
                "{:<12} --> DATABASE_URL not set, state is kept in memory only",
                "Main"
            );
            auction_store = Arc::new(InMemoryAuctionStore::new());
            notification_store = Arc::new(InMemoryNotificationStore::new());
        }
    }

    // event publishing: through Kafka when configured, otherwise straight to the local feed
    let publisher: Arc<dyn EventPublisher> = match &config.kafka_brokers {
        Some(brokers) => {
            let kafka_manager =
                KafkaManager::new(brokers, &config.kafka_group_id, &config.kafka_topic)?;
            kafka_manager.create_topic(&config.kafka_topic, 5, 1).await?;

            let consumer = kafka_manager.get_consumer();
            let relay_feed = Arc::clone(&feed);
            tokio::spawn(async move {
                consumer.relay_into(relay_feed).await;
            });
            info!("{:<12} --> Kafka relay started", "Main");

            let producer: Arc<dyn EventPublisher> = kafka_manager.get_producer();
            producer
        }
        None => {
            let local: Arc<dyn EventPublisher> = feed.clone();
            local
        }
    };

    let ledger = Arc::new(BidLedger::new(auction_store, publisher));

    let live_notifications = Arc::new(NotificationFeed::new(config.feed_capacity));
    if config.notifications_enabled {
        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&notification_store),
            feed.subscribe_all(),
            Arc::clone(&live_notifications),
        );
        tokio::spawn(dispatcher.run());
    }

    AuctionScheduler::new(Arc::clone(&ledger), config.scheduler_interval).start();

    let state = AppState {
        ledger,
        feed,
        notifications: notification_store,
        live_notifications,
    };

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    if let Err(err) = axum::serve(listener, app::router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("{:<12} --> signal handler failed: {}", "Main", e);
    }
    info!("{:<12} --> shutting down", "Main");
}
// endregion: --- Main
