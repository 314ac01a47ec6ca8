use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewBid,
    AuctionWon,
    AuctionEnded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewBid => "new_bid",
            NotificationKind::AuctionWon => "auction_won",
            NotificationKind::AuctionEnded => "auction_ended",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_bid" => Ok(NotificationKind::NewBid),
            "auction_won" => Ok(NotificationKind::AuctionWon),
            "auction_ended" => Ok(NotificationKind::AuctionEnded),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub auction_id: Option<i64>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub auction_id: Option<i64>,
    /// Version of the ledger event this was derived from. Together with user,
    /// kind and auction it identifies a notification.
    pub event_version: i64,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    pub fn same_event(&self, other: &NewNotification) -> bool {
        self.user_id == other.user_id
            && self.kind == other.kind
            && self.auction_id == other.auction_id
            && self.event_version == other.event_version
    }
}
