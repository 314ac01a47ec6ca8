//! Bid commands
//! Validation runs against one auction version and the commit only succeeds
//! if that version is still current, so two bids priced off the same stale
//! current price can never both be accepted.
// region:    --- Imports
use crate::auction::events::LedgerEvent;
use crate::auction::model::{is_currency_amount, MAX_PRICE};
use crate::bidding::model::{Bid, NewBid};
use crate::error::{LedgerError, Result};
use crate::ledger::{BidLedger, MAX_COMMIT_ATTEMPTS};
use crate::store::StoreError;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Commands
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubmitBidCommand {
    pub auction_id: i64,
    pub bidder_id: String,
    pub bidder_name: String,
    pub amount: Decimal,
}

impl BidLedger {
    /// 1. Submit a bid
    pub async fn submit_bid(&self, cmd: SubmitBidCommand) -> Result<Bid> {
        info!("{:<12} --> bid request: {:?}", "Command", cmd);

        if cmd.bidder_id.trim().is_empty() || cmd.bidder_name.trim().is_empty() {
            return Err(LedgerError::InvalidBid(
                "bidder id and name are required".to_string(),
            ));
        }

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let auction = self.store.get_auction(cmd.auction_id).await?;
            let now = Utc::now();

            if !auction.is_open_at(now) {
                return Err(LedgerError::AuctionClosed {
                    auction_id: auction.id,
                    status: auction.effective_status(now),
                });
            }

            let Some(minimum) = auction.minimum_bid() else {
                return Err(LedgerError::InvalidBid(format!(
                    "auction {} can not take a higher bid",
                    auction.id
                )));
            };
            if cmd.amount < minimum {
                return Err(LedgerError::BidTooLow { minimum });
            }

            if cmd.amount > MAX_PRICE {
                return Err(LedgerError::InvalidBid(format!(
                    "amount must not exceed {MAX_PRICE}"
                )));
            }

            if !is_currency_amount(cmd.amount) {
                return Err(LedgerError::InvalidBid(format!(
                    "amount {} has more than two decimal places",
                    cmd.amount
                )));
            }

            let new_bid = NewBid {
                auction_id: auction.id,
                user_id: cmd.bidder_id.clone(),
                user_name: cmd.bidder_name.clone(),
                bid_value: cmd.amount,
                created_at: auction.next_bid_time(now),
            };

            match self.store.commit_bid(auction.version, new_bid).await {
                Ok((auction, bid)) => {
                    info!(
                        "{:<12} --> bid accepted auction: {} sequence: {} price: {}",
                        "Command", auction.id, bid.sequence, auction.current_price
                    );
                    self.emit(LedgerEvent::bid_accepted(&auction, &bid)).await;
                    return Ok(bid);
                }
                Err(StoreError::Conflict(_)) => {
                    warn!(
                        "{:<12} --> version conflict on auction {}, attempt {}/{}",
                        "Command", cmd.auction_id, attempt, MAX_COMMIT_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::Conflict(cmd.auction_id))
    }
}

// endregion: --- Commands
