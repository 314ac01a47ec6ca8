use crate::bidding::model::Bid;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prices are whole cents.
pub const MONEY_SCALE: u32 = 2;

/// Largest price a `NUMERIC(14, 2)` column holds.
pub const MAX_PRICE: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// True when `amount` has no more than two significant decimal places.
pub fn is_currency_amount(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE
}

// region:    --- Auction Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Active,
    Finished,
    Cancelled,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Active => "active",
            AuctionStatus::Finished => "finished",
            AuctionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuctionStatus::Active)
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuctionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AuctionStatus::Active),
            "finished" => Ok(AuctionStatus::Finished),
            "cancelled" => Ok(AuctionStatus::Cancelled),
            other => Err(format!("unknown auction status: {other}")),
        }
    }
}
// endregion: --- Auction Status

// region:    --- Auction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub fish_name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub starting_price: Decimal,
    pub current_price: Decimal,
    pub min_increment: Decimal,
    pub end_date: DateTime<Utc>,
    pub seller_id: String,
    pub status: AuctionStatus,
    pub winner_id: Option<String>,
    pub bid_count: i64,
    pub last_bid_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Auction {
    /// Smallest bid the auction accepts right now. `None` when it would not
    /// fit a price.
    pub fn minimum_bid(&self) -> Option<Decimal> {
        self.current_price
            .checked_add(self.min_increment)
            .filter(|minimum| *minimum <= MAX_PRICE)
    }

    /// Open for bids: active and the end date not reached.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active && now < self.end_date
    }

    /// Status an observer should see at `now`. An active auction past its end
    /// date reads as finished even before the scheduler has closed it.
    pub fn effective_status(&self, now: DateTime<Utc>) -> AuctionStatus {
        if self.status == AuctionStatus::Active && now >= self.end_date {
            AuctionStatus::Finished
        } else {
            self.status
        }
    }

    /// Timestamp for the next bid, never earlier than the previous one.
    pub fn next_bid_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_bid_at {
            Some(last) if last > now => last,
            _ => now,
        }
    }
}
// endregion: --- Auction

// region:    --- New Auction
/// Fixed auction lengths offered to sellers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionDuration {
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "24h")]
    OneDay,
}

impl AuctionDuration {
    pub fn as_duration(&self) -> Duration {
        let hours = match self {
            AuctionDuration::TwoHours => 2,
            AuctionDuration::FourHours => 4,
            AuctionDuration::SixHours => 6,
            AuctionDuration::EightHours => 8,
            AuctionDuration::OneDay => 24,
        };
        Duration::hours(hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuction {
    pub fish_name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub starting_price: Decimal,
    pub min_increment: Decimal,
    pub end_date: DateTime<Utc>,
    pub seller_id: String,
}

impl NewAuction {
    /// Checks creation rules against `now`. Returns the reason on failure.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), String> {
        if self.fish_name.trim().is_empty() {
            return Err("fish_name must not be empty".to_string());
        }
        if self.seller_id.trim().is_empty() {
            return Err("seller_id must not be empty".to_string());
        }
        if self.starting_price.is_sign_negative() {
            return Err("starting_price must not be negative".to_string());
        }
        if self.min_increment <= Decimal::ZERO {
            return Err("min_increment must be positive".to_string());
        }
        if self.starting_price > MAX_PRICE || self.min_increment > MAX_PRICE {
            return Err(format!("prices must not exceed {MAX_PRICE}"));
        }
        if !is_currency_amount(self.starting_price) || !is_currency_amount(self.min_increment) {
            return Err("prices must have at most two decimal places".to_string());
        }
        if self.end_date <= now {
            return Err("end_date must be in the future".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuctionFilter {
    pub seller_id: Option<String>,
    pub status: Option<AuctionStatus>,
}

impl AuctionFilter {
    pub fn matches(&self, auction: &Auction) -> bool {
        self.seller_id
            .as_deref()
            .map_or(true, |seller| auction.seller_id == seller)
            && self.status.map_or(true, |status| auction.status == status)
    }
}
// endregion: --- New Auction

/// Consistent read of one auction: the price and the full ledger, newest bid first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionState {
    pub auction: Auction,
    pub current_price: Decimal,
    pub bids: Vec<Bid>,
}

impl AuctionState {
    pub fn new(auction: Auction, bids: Vec<Bid>) -> Self {
        Self {
            current_price: auction.current_price,
            auction,
            bids,
        }
    }
}

/// Terminal transition requested for an active auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub status: AuctionStatus,
    pub winner_id: Option<String>,
    pub closed_at: DateTime<Utc>,
}
