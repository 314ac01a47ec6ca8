use crate::auction::model::{Auction, AuctionStatus};
use crate::bidding::model::Bid;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fact emitted once per committed auction mutation. `version` is the
/// auction version after the commit and orders all events of one auction.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // accepted bid
    BidAccepted {
        bid: Bid,
        current_price: Decimal,
        version: i64,
        seller_id: String,
        fish_name: String,
    },
    // finished or cancelled
    AuctionClosed {
        auction_id: i64,
        status: AuctionStatus,
        final_price: Decimal,
        winner_id: Option<String>,
        version: i64,
        seller_id: String,
        fish_name: String,
    },
}

impl LedgerEvent {
    pub fn bid_accepted(auction: &Auction, bid: &Bid) -> Self {
        LedgerEvent::BidAccepted {
            bid: bid.clone(),
            current_price: auction.current_price,
            version: auction.version,
            seller_id: auction.seller_id.clone(),
            fish_name: auction.fish_name.clone(),
        }
    }

    pub fn auction_closed(auction: &Auction) -> Self {
        LedgerEvent::AuctionClosed {
            auction_id: auction.id,
            status: auction.status,
            final_price: auction.current_price,
            winner_id: auction.winner_id.clone(),
            version: auction.version,
            seller_id: auction.seller_id.clone(),
            fish_name: auction.fish_name.clone(),
        }
    }

    pub fn auction_id(&self) -> i64 {
        match self {
            LedgerEvent::BidAccepted { bid, .. } => bid.auction_id,
            LedgerEvent::AuctionClosed { auction_id, .. } => *auction_id,
        }
    }

    pub fn version(&self) -> i64 {
        match self {
            LedgerEvent::BidAccepted { version, .. } | LedgerEvent::AuctionClosed { version, .. } => {
                *version
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LedgerEvent::AuctionClosed { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::BidAccepted { .. } => "BidAccepted",
            LedgerEvent::AuctionClosed { .. } => "AuctionClosed",
        }
    }
}
