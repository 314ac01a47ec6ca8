use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Accepted bid. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub user_id: String,
    pub user_name: String,
    pub bid_value: Decimal,
    /// 1-based position in the auction's ledger.
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

// Bid validated against a specific auction version, ready to commit.
#[derive(Debug, Clone)]
pub struct NewBid {
    pub auction_id: i64,
    pub user_id: String,
    pub user_name: String,
    pub bid_value: Decimal,
    pub created_at: DateTime<Utc>,
}
