//! Record stores behind the ledger.
//! The auction row is the unit of serialization: every mutation is applied
//! only if the auction still has the version the caller validated against.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionFilter, AuctionState, CloseOutcome, NewAuction};
use crate::bidding::model::{Bid, NewBid};
use crate::notification::model::{NewNotification, Notification};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;
pub mod postgres;
mod queries;

// endregion: --- Imports

// region:    --- Store Error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("auction {0} not found")]
    NotFound(i64),

    #[error("notification {0} not found")]
    NotificationNotFound(i64),

    #[error("auction {0} was modified concurrently")]
    Conflict(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}
// endregion: --- Store Error

// region:    --- Store Traits
#[async_trait]
pub trait AuctionStore: Send + Sync {
    async fn create_auction(
        &self,
        new: NewAuction,
        created_at: DateTime<Utc>,
    ) -> Result<Auction, StoreError>;

    async fn get_auction(&self, auction_id: i64) -> Result<Auction, StoreError>;

    /// Newest first.
    async fn list_auctions(&self, filter: &AuctionFilter) -> Result<Vec<Auction>, StoreError>;

    /// Auction and its bids (newest first) read from one snapshot.
    async fn get_state(&self, auction_id: i64) -> Result<AuctionState, StoreError>;

    async fn latest_bid(&self, auction_id: i64) -> Result<Option<Bid>, StoreError>;

    /// Appends `bid` and moves the current price to its value, provided the
    /// auction is still at `expected_version`, active, and before its end date
    /// at `bid.created_at`. Otherwise `StoreError::Conflict`.
    async fn commit_bid(
        &self,
        expected_version: i64,
        bid: NewBid,
    ) -> Result<(Auction, Bid), StoreError>;

    /// Moves an active auction at `expected_version` to a terminal status.
    async fn commit_close(
        &self,
        auction_id: i64,
        expected_version: i64,
        outcome: CloseOutcome,
    ) -> Result<Auction, StoreError>;

    /// Ids of active auctions whose end date is at or before `now`.
    async fn expired_auctions(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Returns `None` when the same notification was already recorded for
    /// this event, so redelivered events do not notify twice.
    async fn insert(&self, new: NewNotification) -> Result<Option<Notification>, StoreError>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>, StoreError>;

    async fn mark_read(&self, notification_id: i64) -> Result<(), StoreError>;
}
// endregion: --- Store Traits
