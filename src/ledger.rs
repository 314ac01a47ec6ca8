//! The auction bid ledger. Commands live next to their domain
//! (`bidding::commands`, `auction::commands`); this file holds the shared
//! state, the read side and event emission.
// region:    --- Imports
use crate::auction::events::LedgerEvent;
use crate::auction::model::{Auction, AuctionFilter, AuctionState};
use crate::error::Result;
use crate::publisher::EventPublisher;
use crate::store::AuctionStore;
use std::sync::Arc;
use tracing::{error, info};

// endregion: --- Imports

/// A commit that lost against a concurrent writer is retried once with fresh
/// state, then surfaced as `Conflict`.
pub const MAX_COMMIT_ATTEMPTS: u32 = 2;

pub struct BidLedger {
    pub(crate) store: Arc<dyn AuctionStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl BidLedger {
    pub fn new(store: Arc<dyn AuctionStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Current price and full bid history, newest first, from one snapshot.
    pub async fn get_current_state(&self, auction_id: i64) -> Result<AuctionState> {
        info!("{:<12} --> auction state id: {}", "Query", auction_id);
        Ok(self.store.get_state(auction_id).await?)
    }

    pub async fn get_auction(&self, auction_id: i64) -> Result<Auction> {
        Ok(self.store.get_auction(auction_id).await?)
    }

    pub async fn list_auctions(&self, filter: &AuctionFilter) -> Result<Vec<Auction>> {
        info!("{:<12} --> list auctions {:?}", "Query", filter);
        Ok(self.store.list_auctions(filter).await?)
    }

    /// Publishes a committed event. The commit already happened, so a failed
    /// publish is logged and observers catch up by re-reading state.
    pub(crate) async fn emit(&self, event: LedgerEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            error!(
                "{:<12} --> {} publish failed auction: {} version: {}: {}",
                "Ledger",
                event.kind(),
                event.auction_id(),
                event.version(),
                e
            );
        }
    }
}
