//! User notifications derived from ledger events. Never authoritative: a
//! missing notification loses nothing the auction state does not still hold.
// region:    --- Imports
use crate::auction::events::LedgerEvent;
use crate::auction::model::AuctionStatus;
use crate::feed::{FeedError, FeedSubscription};
use crate::store::{NotificationStore, StoreError};
use chrono::{DateTime, Utc};
use model::{NewNotification, Notification, NotificationKind};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub mod model;

// endregion: --- Imports

// region:    --- Derivation
/// Notifications one event produces.
pub fn notifications_for(event: &LedgerEvent, now: DateTime<Utc>) -> Vec<NewNotification> {
    match event {
        LedgerEvent::BidAccepted {
            bid,
            version,
            seller_id,
            fish_name,
            ..
        } => vec![NewNotification {
            user_id: seller_id.clone(),
            kind: NotificationKind::NewBid,
            title: "New bid".to_string(),
            message: format!(
                "{} bid R$ {:.2} on {}",
                bid.user_name, bid.bid_value, fish_name
            ),
            auction_id: Some(bid.auction_id),
            event_version: *version,
            created_at: now,
        }],
        LedgerEvent::AuctionClosed {
            auction_id,
            status,
            final_price,
            winner_id,
            version,
            seller_id,
            fish_name,
        } => {
            let mut out = Vec::with_capacity(2);
            let seller_message = match (status, winner_id) {
                (AuctionStatus::Finished, Some(_)) => {
                    format!("{} sold for R$ {:.2}", fish_name, final_price)
                }
                (AuctionStatus::Finished, None) => format!("{} ended without bids", fish_name),
                _ => format!("{} was cancelled", fish_name),
            };
            if let (AuctionStatus::Finished, Some(winner)) = (status, winner_id) {
                out.push(NewNotification {
                    user_id: winner.clone(),
                    kind: NotificationKind::AuctionWon,
                    title: "Auction won".to_string(),
                    message: format!("You won {} for R$ {:.2}", fish_name, final_price),
                    auction_id: Some(*auction_id),
                    event_version: *version,
                    created_at: now,
                });
            }
            out.push(NewNotification {
                user_id: seller_id.clone(),
                kind: NotificationKind::AuctionEnded,
                title: "Auction ended".to_string(),
                message: seller_message,
                auction_id: Some(*auction_id),
                event_version: *version,
                created_at: now,
            });
            out
        }
    }
}
// endregion: --- Derivation

// region:    --- Live Notifications
/// Fan-out of newly recorded notifications to connected users. Receivers
/// filter by user.
pub struct NotificationFeed {
    sender: broadcast::Sender<Notification>,
}

impl NotificationFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn publish(&self, notification: Notification) {
        // no one connected is fine
        let _ = self.sender.send(notification);
    }
}
// endregion: --- Live Notifications

// region:    --- Dispatcher
/// Background consumer turning feed events into stored notifications and
/// pushing each new one live.
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    subscription: FeedSubscription,
    live: Arc<NotificationFeed>,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        subscription: FeedSubscription,
        live: Arc<NotificationFeed>,
    ) -> Self {
        Self {
            store,
            subscription,
            live,
        }
    }

    pub async fn run(mut self) {
        info!("{:<12} --> dispatcher started", "Notify");
        loop {
            match self.subscription.recv().await {
                Ok(event) => match handle_event(self.store.as_ref(), &event).await {
                    Ok(recorded) => {
                        for notification in recorded {
                            self.live.publish(notification);
                        }
                    }
                    Err(e) => error!(
                        "{:<12} --> {} auction: {} not recorded: {}",
                        "Notify",
                        event.kind(),
                        event.auction_id(),
                        e
                    ),
                },
                Err(e @ (FeedError::Lagged(_) | FeedError::Gap { .. })) => {
                    warn!("{:<12} --> events skipped: {}", "Notify", e);
                }
                Err(FeedError::Closed) => break,
            }
        }
        info!("{:<12} --> dispatcher stopped", "Notify");
    }
}

/// Records the notifications for `event`. Returns the ones that were new.
pub async fn handle_event(
    store: &dyn NotificationStore,
    event: &LedgerEvent,
) -> Result<Vec<Notification>, StoreError> {
    let mut recorded = Vec::new();
    for new in notifications_for(event, Utc::now()) {
        match store.insert(new).await? {
            Some(notification) => {
                debug!(
                    "{:<12} --> {} for {}",
                    "Notify", notification.kind, notification.user_id
                );
                recorded.push(notification);
            }
            None => debug!("{:<12} --> duplicate event ignored", "Notify"),
        }
    }
    Ok(recorded)
}
// endregion: --- Dispatcher
