//! Auction expiry scheduler
//! Closes active auctions once their end date passes. Bids are already refused
//! after the end date; this makes the finished status and the winner durable.
// region:    --- Imports
use crate::ledger::BidLedger;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

// endregion: --- Imports

// region:    --- Auction Scheduler
pub struct AuctionScheduler {
    ledger: Arc<BidLedger>,
    period: Duration,
}

impl AuctionScheduler {
    pub fn new(ledger: Arc<BidLedger>, period: Duration) -> Self {
        Self { ledger, period }
    }

    /// Spawns the ticking loop.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval(self.period);
            loop {
                interval.tick().await;
                self.run_once().await;
            }
        })
    }

    /// One pass over expired auctions.
    pub async fn run_once(&self) -> usize {
        match self.ledger.close_expired(Utc::now()).await {
            Ok(closed) => {
                for auction in &closed {
                    info!(
                        "{:<12} --> auction {} expired, winner: {:?}",
                        "Scheduler", auction.id, auction.winner_id
                    );
                }
                debug!("{:<12} --> {} auctions closed", "Scheduler", closed.len());
                closed.len()
            }
            Err(e) => {
                error!("{:<12} --> expiry pass failed: {}", "Scheduler", e);
                0
            }
        }
    }
}
// endregion: --- Auction Scheduler
