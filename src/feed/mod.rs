//! Per-auction fan-out of committed ledger events to live observers.
// region:    --- Imports
use crate::auction::events::LedgerEvent;
use crate::publisher::{EventPublisher, PublishError};
use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

// endregion: --- Imports

// region:    --- Auction Feed
struct FeedChannel {
    // dropped once the auction's terminal event went out
    sender: Option<broadcast::Sender<LedgerEvent>>,
    last_version: i64,
}

/// One broadcast channel per auction plus a global one for background
/// consumers. Delivery is monotonic per auction: an event whose version is
/// not newer than the last delivered one is dropped. The global channel gets
/// every event, late ones included.
pub struct AuctionFeed {
    channels: DashMap<i64, FeedChannel>,
    all: broadcast::Sender<LedgerEvent>,
    capacity: usize,
}

impl AuctionFeed {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (all, _) = broadcast::channel(capacity);
        Self {
            channels: DashMap::new(),
            all,
            capacity,
        }
    }

    /// Observes one auction from now on. A closed auction's subscription
    /// reports `Closed` straight away.
    pub fn subscribe(&self, auction_id: i64) -> FeedSubscription {
        let channel = self
            .channels
            .entry(auction_id)
            .or_insert_with(|| self.new_channel());
        let receiver = match &channel.sender {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        };
        FeedSubscription {
            receiver,
            auction_id: Some(auction_id),
            last_version: None,
        }
    }

    /// Observes every auction from now on.
    pub fn subscribe_all(&self) -> FeedSubscription {
        FeedSubscription {
            receiver: self.all.subscribe(),
            auction_id: None,
            last_version: None,
        }
    }

    /// Fans `event` out. Returns false when it was stale or a duplicate for
    /// the auction's observers.
    pub fn deliver(&self, event: LedgerEvent) -> bool {
        let auction_id = event.auction_id();
        let version = event.version();

        // no receivers is fine
        let _ = self.all.send(event.clone());

        // the entry guard serializes deliveries for this auction
        let mut channel = self
            .channels
            .entry(auction_id)
            .or_insert_with(|| self.new_channel());
        if version <= channel.last_version {
            debug!(
                "{:<12} --> dropped stale event auction: {} version: {} (last {})",
                "Feed", auction_id, version, channel.last_version
            );
            return false;
        }
        channel.last_version = version;

        let terminal = event.is_terminal();
        if let Some(sender) = &channel.sender {
            let _ = sender.send(event);
        }
        if terminal {
            // receivers drain what is buffered, then see the channel closed
            channel.sender = None;
        }
        true
    }

    /// Last version delivered for the auction, 0 if none.
    pub fn last_version(&self, auction_id: i64) -> i64 {
        self.channels
            .get(&auction_id)
            .map_or(0, |channel| channel.last_version)
    }

    pub fn observer_count(&self, auction_id: i64) -> usize {
        self.channels
            .get(&auction_id)
            .and_then(|channel| channel.sender.as_ref().map(|s| s.receiver_count()))
            .unwrap_or(0)
    }

    fn new_channel(&self) -> FeedChannel {
        let (sender, _) = broadcast::channel(self.capacity);
        FeedChannel {
            sender: Some(sender),
            last_version: 0,
        }
    }
}

#[async_trait]
impl EventPublisher for AuctionFeed {
    async fn publish(&self, event: &LedgerEvent) -> Result<(), PublishError> {
        self.deliver(event.clone());
        Ok(())
    }
}
// endregion: --- Auction Feed

// region:    --- Subscription
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Events were skipped; re-read the auction state, then `resume_after`.
    #[error("subscriber lagged behind by {0} events")]
    Lagged(u64),

    /// An event between the last seen version and `received` never arrived;
    /// re-read the auction state, then `resume_after`.
    #[error("missed events: expected version {expected}, received {received}")]
    Gap { expected: i64, received: i64 },

    #[error("feed closed")]
    Closed,
}

pub struct FeedSubscription {
    receiver: broadcast::Receiver<LedgerEvent>,
    // None for the global subscription
    auction_id: Option<i64>,
    // None until the first event or snapshot
    last_version: Option<i64>,
}

impl FeedSubscription {
    /// Next event newer than anything this subscriber has seen. On a
    /// single-auction subscription a skipped version is reported as `Gap`.
    pub async fn recv(&mut self) -> Result<LedgerEvent, FeedError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.auction_id.is_none() {
                        return Ok(event);
                    }
                    let version = event.version();
                    match self.last_version {
                        Some(last) if version <= last => continue,
                        Some(last) if version > last + 1 => {
                            self.last_version = Some(version);
                            return Err(FeedError::Gap {
                                expected: last + 1,
                                received: version,
                            });
                        }
                        _ => {
                            self.last_version = Some(version);
                            return Ok(event);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Err(FeedError::Lagged(skipped))
                }
                Err(broadcast::error::RecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }

    /// Skips events already covered by a state snapshot at `version`.
    pub fn resume_after(&mut self, version: i64) {
        if self.last_version.map_or(true, |last| version > last) {
            self.last_version = Some(version);
        }
    }
}
// endregion: --- Subscription
