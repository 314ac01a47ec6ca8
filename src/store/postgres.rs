//! PostgreSQL stores. Bid and close commits are conditional `UPDATE`s on the
//! auction row inside a transaction; the row lock they take serializes
//! concurrent writers and the version predicate rejects stale ones.
// region:    --- Imports
use super::queries;
use super::{AuctionStore, NotificationStore, StoreError};
use crate::auction::model::{
    Auction, AuctionFilter, AuctionState, AuctionStatus, CloseOutcome, NewAuction,
};
use crate::bidding::model::{Bid, NewBid};
use crate::database::DatabaseManager;
use crate::notification::model::{NewNotification, Notification, NotificationKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Rows
#[derive(sqlx::FromRow)]
struct AuctionRow {
    id: i64,
    fish_name: String,
    description: Option<String>,
    image_url: Option<String>,
    starting_price: Decimal,
    current_price: Decimal,
    min_increment: Decimal,
    end_date: DateTime<Utc>,
    seller_id: String,
    status: String,
    winner_id: Option<String>,
    bid_count: i64,
    last_bid_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AuctionRow> for Auction {
    type Error = StoreError;

    fn try_from(row: AuctionRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<AuctionStatus>()
            .map_err(|e| StoreError::Corrupt(format!("auction {}: {e}", row.id)))?;
        Ok(Auction {
            id: row.id,
            fish_name: row.fish_name,
            description: row.description,
            image_url: row.image_url,
            starting_price: row.starting_price,
            current_price: row.current_price,
            min_increment: row.min_increment,
            end_date: row.end_date,
            seller_id: row.seller_id,
            status,
            winner_id: row.winner_id,
            bid_count: row.bid_count,
            last_bid_at: row.last_bid_at,
            version: row.version,
            created_at: row.created_at,
            closed_at: row.closed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    user_id: String,
    kind: String,
    title: String,
    message: String,
    auction_id: Option<i64>,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<NotificationKind>()
            .map_err(|e| StoreError::Corrupt(format!("notification {}: {e}", row.id)))?;
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind,
            title: row.title,
            message: row.message,
            auction_id: row.auction_id,
            read: row.read,
            created_at: row.created_at,
        })
    }
}
// endregion: --- Rows

// region:    --- Auction Store
pub struct PostgresAuctionStore {
    db_manager: Arc<DatabaseManager>,
}

impl PostgresAuctionStore {
    pub fn new(db_manager: Arc<DatabaseManager>) -> Self {
        Self { db_manager }
    }
}

#[async_trait]
impl AuctionStore for PostgresAuctionStore {
    async fn create_auction(
        &self,
        new: NewAuction,
        created_at: DateTime<Utc>,
    ) -> Result<Auction, StoreError> {
        let row = sqlx::query_as::<_, AuctionRow>(queries::INSERT_AUCTION)
            .bind(&new.fish_name)
            .bind(&new.description)
            .bind(&new.image_url)
            .bind(new.starting_price)
            .bind(new.min_increment)
            .bind(new.end_date)
            .bind(&new.seller_id)
            .bind(created_at)
            .fetch_one(&*self.db_manager.pool)
            .await?;
        info!("{:<12} --> auction created id: {}", "Postgres", row.id);
        Auction::try_from(row)
    }

    async fn get_auction(&self, auction_id: i64) -> Result<Auction, StoreError> {
        sqlx::query_as::<_, AuctionRow>(queries::GET_AUCTION)
            .bind(auction_id)
            .fetch_optional(&*self.db_manager.pool)
            .await?
            .ok_or(StoreError::NotFound(auction_id))
            .and_then(Auction::try_from)
    }

    async fn list_auctions(&self, filter: &AuctionFilter) -> Result<Vec<Auction>, StoreError> {
        sqlx::query_as::<_, AuctionRow>(queries::LIST_AUCTIONS)
            .bind(filter.seller_id.as_deref())
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&*self.db_manager.pool)
            .await?
            .into_iter()
            .map(Auction::try_from)
            .collect()
    }

    async fn get_state(&self, auction_id: i64) -> Result<AuctionState, StoreError> {
        self.db_manager
            .transaction(|tx| {
                Box::pin(async move {
                    // both reads must see the same committed bids
                    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
                        .execute(&mut **tx)
                        .await?;

                    let auction = sqlx::query_as::<_, AuctionRow>(queries::GET_AUCTION)
                        .bind(auction_id)
                        .fetch_optional(&mut **tx)
                        .await?
                        .ok_or(StoreError::NotFound(auction_id))
                        .and_then(Auction::try_from)?;

                    let bids = sqlx::query_as::<_, Bid>(queries::GET_BID_HISTORY)
                        .bind(auction_id)
                        .fetch_all(&mut **tx)
                        .await?;

                    Ok::<_, StoreError>(AuctionState::new(auction, bids))
                })
            })
            .await
    }

    async fn latest_bid(&self, auction_id: i64) -> Result<Option<Bid>, StoreError> {
        let bid = sqlx::query_as::<_, Bid>(queries::GET_LATEST_BID)
            .bind(auction_id)
            .fetch_optional(&*self.db_manager.pool)
            .await?;
        Ok(bid)
    }

    async fn commit_bid(
        &self,
        expected_version: i64,
        bid: NewBid,
    ) -> Result<(Auction, Bid), StoreError> {
        self.db_manager
            .transaction(|tx| {
                Box::pin(async move {
                    let row = sqlx::query_as::<_, AuctionRow>(queries::ADVANCE_PRICE)
                        .bind(bid.bid_value)
                        .bind(bid.created_at)
                        .bind(bid.auction_id)
                        .bind(expected_version)
                        .fetch_optional(&mut **tx)
                        .await?;

                    let Some(row) = row else {
                        debug!(
                            "{:<12} --> stale version {} for auction {}",
                            "Postgres", expected_version, bid.auction_id
                        );
                        return Err(StoreError::Conflict(bid.auction_id));
                    };
                    let auction = Auction::try_from(row)?;

                    let recorded = sqlx::query_as::<_, Bid>(queries::INSERT_BID)
                        .bind(bid.auction_id)
                        .bind(&bid.user_id)
                        .bind(&bid.user_name)
                        .bind(bid.bid_value)
                        .bind(auction.bid_count)
                        .bind(bid.created_at)
                        .fetch_one(&mut **tx)
                        .await?;

                    Ok::<_, StoreError>((auction, recorded))
                })
            })
            .await
    }

    async fn commit_close(
        &self,
        auction_id: i64,
        expected_version: i64,
        outcome: CloseOutcome,
    ) -> Result<Auction, StoreError> {
        sqlx::query_as::<_, AuctionRow>(queries::CLOSE_AUCTION)
            .bind(outcome.status.as_str())
            .bind(&outcome.winner_id)
            .bind(outcome.closed_at)
            .bind(auction_id)
            .bind(expected_version)
            .fetch_optional(&*self.db_manager.pool)
            .await?
            .ok_or(StoreError::Conflict(auction_id))
            .and_then(Auction::try_from)
    }

    async fn expired_auctions(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        let ids = sqlx::query_scalar::<_, i64>(queries::GET_EXPIRED_AUCTIONS)
            .bind(now)
            .fetch_all(&*self.db_manager.pool)
            .await?;
        Ok(ids)
    }
}
// endregion: --- Auction Store

// region:    --- Notification Store
pub struct PostgresNotificationStore {
    db_manager: Arc<DatabaseManager>,
}

impl PostgresNotificationStore {
    pub fn new(db_manager: Arc<DatabaseManager>) -> Self {
        Self { db_manager }
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    async fn insert(&self, new: NewNotification) -> Result<Option<Notification>, StoreError> {
        sqlx::query_as::<_, NotificationRow>(queries::INSERT_NOTIFICATION)
            .bind(&new.user_id)
            .bind(new.kind.as_str())
            .bind(&new.title)
            .bind(&new.message)
            .bind(new.auction_id)
            .bind(new.event_version)
            .bind(new.created_at)
            .fetch_optional(&*self.db_manager.pool)
            .await?
            .map(Notification::try_from)
            .transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        sqlx::query_as::<_, NotificationRow>(queries::GET_USER_NOTIFICATIONS)
            .bind(user_id)
            .fetch_all(&*self.db_manager.pool)
            .await?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    async fn mark_read(&self, notification_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(queries::MARK_NOTIFICATION_READ)
            .bind(notification_id)
            .execute(&*self.db_manager.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotificationNotFound(notification_id));
        }
        Ok(())
    }
}
// endregion: --- Notification Store
