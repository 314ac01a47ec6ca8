// region:    --- Imports
use crate::auction::model::AuctionStatus;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::error;

// endregion: --- Imports

// region:    --- Ledger Error
/// Failures returned by ledger operations. Everything except `Unavailable`
/// and `Internal` is meant to be re-presented to the bidder as is.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("auction {0} not found")]
    NotFound(i64),

    #[error("auction {auction_id} is closed ({status})")]
    AuctionClosed {
        auction_id: i64,
        status: AuctionStatus,
    },

    #[error("bid too low, minimum bid is now {minimum:.2}")]
    BidTooLow { minimum: Decimal },

    #[error("auction {0} changed concurrently, re-read the current price and retry")]
    Conflict(i64),

    #[error("invalid bid: {0}")]
    InvalidBid(String),

    #[error("invalid auction: {0}")]
    InvalidAuction(String),

    #[error("notification {0} not found")]
    NotificationNotFound(i64),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) | LedgerError::NotificationNotFound(_) => "NOT_FOUND",
            LedgerError::AuctionClosed { .. } => "AUCTION_CLOSED",
            LedgerError::BidTooLow { .. } => "BID_TOO_LOW",
            LedgerError::Conflict(_) => "CONFLICT",
            LedgerError::InvalidBid(_) => "INVALID_BID",
            LedgerError::InvalidAuction(_) => "INVALID_AUCTION",
            LedgerError::Unavailable(_) => "UNAVAILABLE",
            LedgerError::Internal(_) => "INTERNAL",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::NotFound(_) | LedgerError::NotificationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            LedgerError::AuctionClosed { .. } | LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::BidTooLow { .. }
            | LedgerError::InvalidBid(_)
            | LedgerError::InvalidAuction(_) => StatusCode::BAD_REQUEST,
            LedgerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => LedgerError::NotFound(id),
            StoreError::NotificationNotFound(id) => LedgerError::NotificationNotFound(id),
            StoreError::Conflict(id) => LedgerError::Conflict(id),
            StoreError::Database(e) => LedgerError::Unavailable(e.to_string()),
            StoreError::Corrupt(msg) => LedgerError::Internal(msg),
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{:<12} --> {}", "Error", self);
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        match &self {
            LedgerError::BidTooLow { minimum } => {
                body["minimum_bid"] = serde_json::json!(minimum.round_dp(2).to_string());
            }
            LedgerError::AuctionClosed { status, .. } => {
                body["status"] = serde_json::json!(status.as_str());
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
// endregion: --- Ledger Error
