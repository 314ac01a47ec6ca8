use crate::auction::events::LedgerEvent;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("broker error: {0}")]
    Broker(String),
}

/// Outbound side of the ledger. Called exactly once per committed mutation,
/// after the commit is durable.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &LedgerEvent) -> Result<(), PublishError>;
}
