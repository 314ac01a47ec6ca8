//! Kafka transport for ledger events. The producer is the ledger's publisher;
//! every instance runs a consumer that relays the topic into its local feed.
// region:    --- Imports
use crate::auction::events::LedgerEvent;
use crate::feed::AuctionFeed;
use crate::publisher::{EventPublisher, PublishError};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Kafka Producer
#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
    topic: String,
}

impl KafkaProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            // per-key order survives producer retries
            .set("enable.idempotence", "true")
            .create()?;

        Ok(KafkaProducer {
            producer: Arc::new(producer),
            topic: topic.to_string(),
        })
    }

    /// Sends one message
    pub async fn send_message(&self, key: &str, value: &str) -> Result<(), PublishError> {
        debug!(
            "{:<12} --> Kafka send: topic={}, key={}",
            "Producer", self.topic, key
        );
        let record = FutureRecord::to(&self.topic).key(key).payload(value);

        self.producer
            .send(record, Duration::from_secs(0))
            .await
            .map_err(|(e, _)| PublishError::Broker(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl EventPublisher for KafkaProducer {
    /// Keyed by auction id so one auction's events share a partition and keep
    /// their order.
    async fn publish(&self, event: &LedgerEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        self.send_message(&event.auction_id().to_string(), &payload)
            .await
    }
}
// endregion: --- Kafka Producer

// region:    --- Kafka Consumer
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
    topic: String,
}

impl KafkaConsumer {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            // live fan-out only; history is served by the state read
            .set("auto.offset.reset", "latest")
            .set("session.timeout.ms", "6000")
            .set("fetch.max.bytes", "5242880")
            .set("allow.auto.create.topics", "true")
            .create()?;

        Ok(KafkaConsumer {
            consumer: Arc::new(consumer),
            topic: topic.to_string(),
        })
    }

    /// Consumes ledger events forever, handing each decoded one to `handler`.
    pub async fn consume_events<F>(&self, handler: F) -> Result<(), KafkaError>
    where
        F: Fn(LedgerEvent) + Send + 'static,
    {
        info!(
            "{:<12} --> Kafka consume start: topic={}",
            "Consumer", self.topic
        );
        self.consumer.subscribe(&[self.topic.as_str()])?;

        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    debug!(
                        "{:<12} --> received: partition={}, offset={}",
                        "Consumer",
                        message.partition(),
                        message.offset()
                    );

                    match message.payload() {
                        Some(payload) => match serde_json::from_slice::<LedgerEvent>(payload) {
                            Ok(event) => handler(event),
                            Err(e) => error!("{:<12} --> deserialize error: {:?}", "Consumer", e),
                        },
                        None => warn!("{:<12} --> empty payload", "Consumer"),
                    }
                }
                Err(e) => error!("{:<12} --> receive error: {:?}", "Consumer", e),
            }
        }
    }

    /// Relays the topic into `feed` until the consumer fails.
    pub async fn relay_into(&self, feed: Arc<AuctionFeed>) {
        if let Err(e) = self
            .consume_events(move |event| {
                feed.deliver(event);
            })
            .await
        {
            error!("{:<12} --> relay stopped: {:?}", "Consumer", e);
        }
    }
}
// endregion: --- Kafka Consumer

// region:    --- Kafka Manager
pub struct KafkaManager {
    producer: Arc<KafkaProducer>,
    consumer: Arc<KafkaConsumer>,
    brokers: String,
}

impl KafkaManager {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, KafkaError> {
        Ok(KafkaManager {
            producer: Arc::new(KafkaProducer::new(brokers, topic)?),
            consumer: Arc::new(KafkaConsumer::new(brokers, group_id, topic)?),
            brokers: brokers.to_string(),
        })
    }

    pub fn get_producer(&self) -> Arc<KafkaProducer> {
        Arc::clone(&self.producer)
    }

    pub fn get_consumer(&self) -> Arc<KafkaConsumer> {
        Arc::clone(&self.consumer)
    }

    /// Creates the topic; an existing topic is not an error.
    pub async fn create_topic(
        &self,
        topic_name: &str,
        num_partitions: i32,
        replication_factor: i32,
    ) -> Result<(), KafkaError> {
        info!("{:<12} --> create topic: {}", "Manager", topic_name);

        let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()?;

        let new_topic = NewTopic::new(
            topic_name,
            num_partitions,
            TopicReplication::Fixed(replication_factor),
        );

        let results = admin_client
            .create_topics(&[new_topic], &AdminOptions::new())
            .await?;
        for result in results {
            match result {
                Ok(name) => info!("{:<12} --> topic created: {}", "Manager", name),
                Err((name, code)) => warn!("{:<12} --> topic {}: {:?}", "Manager", name, code),
            }
        }
        Ok(())
    }
}
// endregion: --- Kafka Manager
