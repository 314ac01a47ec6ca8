//! Auction lifecycle commands: creation, closing, cancellation.
//! Close and cancel commit against the same auction version as bids do, so a
//! bid validated before a close can not commit after it.
// region:    --- Imports
use crate::auction::events::LedgerEvent;
use crate::auction::model::{Auction, AuctionDuration, AuctionStatus, CloseOutcome, NewAuction};
use crate::error::{LedgerError, Result};
use crate::ledger::{BidLedger, MAX_COMMIT_ATTEMPTS};
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Commands
/// Auction creation request. `end_date` wins over `duration` when both are given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuctionCommand {
    pub fish_name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub starting_price: Decimal,
    pub min_increment: Decimal,
    pub end_date: Option<DateTime<Utc>>,
    pub duration: Option<AuctionDuration>,
    pub seller_id: String,
}

impl CreateAuctionCommand {
    pub fn into_new_auction(self, now: DateTime<Utc>) -> Result<NewAuction> {
        let end_date = match (self.end_date, self.duration) {
            (Some(end_date), _) => end_date,
            (None, Some(duration)) => now + duration.as_duration(),
            (None, None) => {
                return Err(LedgerError::InvalidAuction(
                    "either end_date or duration is required".to_string(),
                ))
            }
        };
        let new = NewAuction {
            fish_name: self.fish_name,
            description: self.description,
            image_url: self.image_url,
            starting_price: self.starting_price,
            min_increment: self.min_increment,
            end_date,
            seller_id: self.seller_id,
        };
        new.validate(now).map_err(LedgerError::InvalidAuction)?;
        Ok(new)
    }
}

impl BidLedger {
    /// 1. Create an auction
    pub async fn create_auction(&self, cmd: CreateAuctionCommand) -> Result<Auction> {
        let now = Utc::now();
        let new = cmd.into_new_auction(now)?;
        let auction = self.store.create_auction(new, now).await?;
        info!(
            "{:<12} --> auction {} created, ends {}",
            "Command", auction.id, auction.end_date
        );
        Ok(auction)
    }

    /// 2. Close: finished, winner is the highest bidder if any
    pub async fn close_auction(&self, auction_id: i64) -> Result<Auction> {
        self.finalize(auction_id, AuctionStatus::Finished).await
    }

    /// 3. Cancel: no winner
    pub async fn cancel_auction(&self, auction_id: i64) -> Result<Auction> {
        self.finalize(auction_id, AuctionStatus::Cancelled).await
    }

    /// Closes every active auction whose end date passed. Auctions closed
    /// concurrently by someone else are skipped.
    pub async fn close_expired(&self, now: DateTime<Utc>) -> Result<Vec<Auction>> {
        let expired = self.store.expired_auctions(now).await?;
        let mut closed = Vec::with_capacity(expired.len());
        for auction_id in expired {
            match self.close_auction(auction_id).await {
                Ok(auction) => closed.push(auction),
                Err(LedgerError::AuctionClosed { .. }) => {}
                Err(LedgerError::Unavailable(e)) => return Err(LedgerError::Unavailable(e)),
                Err(e) => warn!(
                    "{:<12} --> could not close expired auction {}: {}",
                    "Command", auction_id, e
                ),
            }
        }
        Ok(closed)
    }

    async fn finalize(&self, auction_id: i64, status: AuctionStatus) -> Result<Auction> {
        info!(
            "{:<12} --> {} request auction: {}",
            "Command", status, auction_id
        );

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let auction = self.store.get_auction(auction_id).await?;
            if auction.status.is_terminal() {
                return Err(LedgerError::AuctionClosed {
                    auction_id,
                    status: auction.status,
                });
            }

            // bids strictly increase, so the latest one is the highest
            let winner_id = match status {
                AuctionStatus::Finished => self
                    .store
                    .latest_bid(auction_id)
                    .await?
                    .map(|bid| bid.user_id),
                _ => None,
            };
            let outcome = CloseOutcome {
                status,
                winner_id,
                closed_at: Utc::now(),
            };

            match self
                .store
                .commit_close(auction_id, auction.version, outcome)
                .await
            {
                Ok(auction) => {
                    info!(
                        "{:<12} --> auction {} {} at {} winner: {:?}",
                        "Command", auction.id, auction.status, auction.current_price, auction.winner_id
                    );
                    self.emit(LedgerEvent::auction_closed(&auction)).await;
                    return Ok(auction);
                }
                Err(StoreError::Conflict(_)) => {
                    warn!(
                        "{:<12} --> version conflict closing auction {}, attempt {}/{}",
                        "Command", auction_id, attempt, MAX_COMMIT_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::Conflict(auction_id))
    }
}

// endregion: --- Commands
