//! In-process stores. Used when no database is configured and by the tests.
// region:    --- Imports
use super::{AuctionStore, NotificationStore, StoreError};
use crate::auction::model::{
    Auction, AuctionFilter, AuctionState, AuctionStatus, CloseOutcome, NewAuction,
};
use crate::bidding::model::{Bid, NewBid};
use crate::notification::model::{NewNotification, Notification};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

// endregion: --- Imports

// region:    --- Auction Store
struct AuctionEntry {
    auction: Auction,
    // oldest first
    bids: Vec<Bid>,
}

/// Each auction lives in one `DashMap` entry; holding the entry guard is the
/// per-auction lock that serializes validation of the version and the write.
pub struct InMemoryAuctionStore {
    auctions: DashMap<i64, AuctionEntry>,
    next_auction_id: AtomicI64,
    next_bid_id: AtomicI64,
}

impl Default for InMemoryAuctionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuctionStore {
    pub fn new() -> Self {
        Self {
            auctions: DashMap::new(),
            next_auction_id: AtomicI64::new(1),
            next_bid_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl AuctionStore for InMemoryAuctionStore {
    async fn create_auction(
        &self,
        new: NewAuction,
        created_at: DateTime<Utc>,
    ) -> Result<Auction, StoreError> {
        let id = self.next_auction_id.fetch_add(1, Ordering::SeqCst);
        let auction = Auction {
            id,
            fish_name: new.fish_name,
            description: new.description,
            image_url: new.image_url,
            starting_price: new.starting_price,
            current_price: new.starting_price,
            min_increment: new.min_increment,
            end_date: new.end_date,
            seller_id: new.seller_id,
            status: AuctionStatus::Active,
            winner_id: None,
            bid_count: 0,
            last_bid_at: None,
            version: 0,
            created_at,
            closed_at: None,
        };
        self.auctions.insert(
            id,
            AuctionEntry {
                auction: auction.clone(),
                bids: Vec::new(),
            },
        );
        Ok(auction)
    }

    async fn get_auction(&self, auction_id: i64) -> Result<Auction, StoreError> {
        self.auctions
            .get(&auction_id)
            .map(|entry| entry.auction.clone())
            .ok_or(StoreError::NotFound(auction_id))
    }

    async fn list_auctions(&self, filter: &AuctionFilter) -> Result<Vec<Auction>, StoreError> {
        let mut auctions: Vec<Auction> = self
            .auctions
            .iter()
            .filter(|entry| filter.matches(&entry.auction))
            .map(|entry| entry.auction.clone())
            .collect();
        auctions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(auctions)
    }

    async fn get_state(&self, auction_id: i64) -> Result<AuctionState, StoreError> {
        let entry = self
            .auctions
            .get(&auction_id)
            .ok_or(StoreError::NotFound(auction_id))?;
        let bids = entry.bids.iter().rev().cloned().collect();
        Ok(AuctionState::new(entry.auction.clone(), bids))
    }

    async fn latest_bid(&self, auction_id: i64) -> Result<Option<Bid>, StoreError> {
        let entry = self
            .auctions
            .get(&auction_id)
            .ok_or(StoreError::NotFound(auction_id))?;
        Ok(entry.bids.last().cloned())
    }

    async fn commit_bid(
        &self,
        expected_version: i64,
        bid: NewBid,
    ) -> Result<(Auction, Bid), StoreError> {
        let mut entry = self
            .auctions
            .get_mut(&bid.auction_id)
            .ok_or(StoreError::NotFound(bid.auction_id))?;
        let AuctionEntry { auction, bids } = &mut *entry;

        if auction.version != expected_version || !auction.is_open_at(bid.created_at) {
            return Err(StoreError::Conflict(auction.id));
        }

        auction.current_price = bid.bid_value;
        auction.bid_count += 1;
        auction.last_bid_at = Some(bid.created_at);
        auction.version += 1;

        let recorded = Bid {
            id: self.next_bid_id.fetch_add(1, Ordering::SeqCst),
            auction_id: bid.auction_id,
            user_id: bid.user_id,
            user_name: bid.user_name,
            bid_value: bid.bid_value,
            sequence: auction.bid_count,
            created_at: bid.created_at,
        };
        bids.push(recorded.clone());

        Ok((auction.clone(), recorded))
    }

    async fn commit_close(
        &self,
        auction_id: i64,
        expected_version: i64,
        outcome: CloseOutcome,
    ) -> Result<Auction, StoreError> {
        let mut entry = self
            .auctions
            .get_mut(&auction_id)
            .ok_or(StoreError::NotFound(auction_id))?;
        let auction = &mut entry.auction;

        if auction.version != expected_version || auction.status.is_terminal() {
            return Err(StoreError::Conflict(auction_id));
        }

        auction.status = outcome.status;
        auction.winner_id = outcome.winner_id;
        auction.closed_at = Some(outcome.closed_at);
        auction.version += 1;

        Ok(auction.clone())
    }

    async fn expired_auctions(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        let mut expired: Vec<(DateTime<Utc>, i64)> = self
            .auctions
            .iter()
            .filter(|entry| entry.auction.status == AuctionStatus::Active && entry.auction.end_date <= now)
            .map(|entry| (entry.auction.end_date, entry.auction.id))
            .collect();
        expired.sort();
        Ok(expired.into_iter().map(|(_, id)| id).collect())
    }
}
// endregion: --- Auction Store

// region:    --- Notification Store
#[derive(Default)]
pub struct InMemoryNotificationStore {
    // (source event, stored notification), oldest first
    notifications: RwLock<Vec<(NewNotification, Notification)>>,
    next_id: AtomicI64,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, new: NewNotification) -> Result<Option<Notification>, StoreError> {
        let mut notifications = self.notifications.write().await;
        if notifications.iter().any(|(source, _)| source.same_event(&new)) {
            return Ok(None);
        }

        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: new.user_id.clone(),
            kind: new.kind,
            title: new.title.clone(),
            message: new.message.clone(),
            auction_id: new.auction_id,
            read: false,
            created_at: new.created_at,
        };
        notifications.push((new, notification.clone()));
        Ok(Some(notification))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .rev()
            .filter(|(_, n)| n.user_id == user_id)
            .map(|(_, n)| n.clone())
            .collect())
    }

    async fn mark_read(&self, notification_id: i64) -> Result<(), StoreError> {
        let mut notifications = self.notifications.write().await;
        let (_, notification) = notifications
            .iter_mut()
            .find(|(_, n)| n.id == notification_id)
            .ok_or(StoreError::NotificationNotFound(notification_id))?;
        notification.read = true;
        Ok(())
    }
}
// endregion: --- Notification Store
