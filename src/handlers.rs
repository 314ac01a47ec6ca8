// region:    --- Imports
use crate::app::AppState;
use crate::auction::commands::CreateAuctionCommand;
use crate::auction::events::LedgerEvent;
use crate::auction::model::{Auction, AuctionFilter, AuctionState};
use crate::bidding::commands::SubmitBidCommand;
use crate::bidding::model::Bid;
use crate::error::LedgerError;
use crate::feed::{FeedError, FeedSubscription};
use crate::notification::model::Notification;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Command Handlers
#[derive(Debug, Deserialize)]
pub struct BidRequest {
    pub bidder_id: String,
    pub bidder_name: String,
    pub amount: Decimal,
}

/// Auction creation
pub async fn handle_create_auction(
    State(state): State<AppState>,
    Json(cmd): Json<CreateAuctionCommand>,
) -> Result<(StatusCode, Json<Auction>), LedgerError> {
    info!("{:<12} --> create auction: {:?}", "Handler", cmd.fish_name);
    let auction = state.ledger.create_auction(cmd).await?;
    Ok((StatusCode::CREATED, Json(auction)))
}

/// Bid submission
pub async fn handle_submit_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(req): Json<BidRequest>,
) -> Result<(StatusCode, Json<Bid>), LedgerError> {
    let cmd = SubmitBidCommand {
        auction_id,
        bidder_id: req.bidder_id,
        bidder_name: req.bidder_name,
        amount: req.amount,
    };
    let bid = state.ledger.submit_bid(cmd).await?;
    Ok((StatusCode::CREATED, Json(bid)))
}

/// Auction close
pub async fn handle_close_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<Json<Auction>, LedgerError> {
    Ok(Json(state.ledger.close_auction(auction_id).await?))
}

/// Auction cancellation
pub async fn handle_cancel_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<Json<Auction>, LedgerError> {
    Ok(Json(state.ledger.cancel_auction(auction_id).await?))
}

/// Notification read
pub async fn handle_mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
) -> Result<StatusCode, LedgerError> {
    state.notifications.mark_read(notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// Current price and bid history
pub async fn handle_get_auction_state(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<Json<AuctionState>, LedgerError> {
    Ok(Json(state.ledger.get_current_state(auction_id).await?))
}

/// Auction listing, filtered by seller and status
pub async fn handle_list_auctions(
    State(state): State<AppState>,
    Query(filter): Query<AuctionFilter>,
) -> Result<Json<Vec<Auction>>, LedgerError> {
    Ok(Json(state.ledger.list_auctions(&filter).await?))
}

/// Notifications for one user, newest first
pub async fn handle_get_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Notification>>, LedgerError> {
    info!("{:<12} --> notifications for {}", "HandlerQuery", user_id);
    Ok(Json(state.notifications.list_for_user(&user_id).await?))
}

// endregion: --- Query Handlers

// region:    --- Live Updates
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LiveMessage {
    Snapshot { state: AuctionState },
    Event { event: LedgerEvent },
}

/// Live auction stream: a state snapshot, then every newer event in order.
/// After a lag or a missed version the snapshot is sent again.
pub async fn handle_live_auction(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Response {
    if let Err(e) = state.ledger.get_auction(auction_id).await {
        return e.into_response();
    }
    ws.on_upgrade(move |socket| stream_auction(socket, state, auction_id))
}

async fn stream_auction(mut socket: WebSocket, state: AppState, auction_id: i64) {
    // subscribe before the snapshot so nothing committed in between is missed
    let mut subscription = state.feed.subscribe(auction_id);
    if send_snapshot(&mut socket, &state, auction_id, &mut subscription)
        .await
        .is_err()
    {
        return;
    }
    info!(
        "{:<12} --> observer joined auction {} ({} watching)",
        "Live",
        auction_id,
        state.feed.observer_count(auction_id)
    );

    loop {
        tokio::select! {
            received = subscription.recv() => match received {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    if send_json(&mut socket, &LiveMessage::Event { event }).await.is_err() || terminal {
                        break;
                    }
                }
                Err(e @ (FeedError::Lagged(_) | FeedError::Gap { .. })) => {
                    warn!("{:<12} --> observer resync on auction {}: {}", "Live", auction_id, e);
                    if send_snapshot(&mut socket, &state, auction_id, &mut subscription).await.is_err() {
                        break;
                    }
                }
                Err(FeedError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    info!("{:<12} --> observer left auction {}", "Live", auction_id);
}

async fn send_snapshot(
    socket: &mut WebSocket,
    state: &AppState,
    auction_id: i64,
    subscription: &mut FeedSubscription,
) -> Result<(), axum::Error> {
    let snapshot = state
        .ledger
        .get_current_state(auction_id)
        .await
        .map_err(axum::Error::new)?;
    subscription.resume_after(snapshot.auction.version);
    send_json(socket, &LiveMessage::Snapshot { state: snapshot }).await
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, message: &T) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(text)).await
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LiveNotificationMessage {
    Snapshot { notifications: Vec<Notification> },
    Notification { notification: Notification },
}

/// Live notifications for one user: the stored list, then every new one.
pub async fn handle_live_notifications(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| stream_notifications(socket, state, user_id))
}

async fn stream_notifications(mut socket: WebSocket, state: AppState, user_id: String) {
    // subscribe before the snapshot so nothing recorded in between is missed
    let mut receiver = state.live_notifications.subscribe();
    let Ok(mut seen) = send_notification_snapshot(&mut socket, &state, &user_id).await else {
        return;
    };
    info!("{:<12} --> {} listening for notifications", "Live", user_id);

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Ok(notification) => {
                    if notification.user_id != user_id || !seen.insert(notification.id) {
                        continue;
                    }
                    let message = LiveNotificationMessage::Notification { notification };
                    if send_json(&mut socket, &message).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("{:<12} --> {} lagged {} notifications", "Live", user_id, skipped);
                    match send_notification_snapshot(&mut socket, &state, &user_id).await {
                        Ok(ids) => seen = ids,
                        Err(_) => break,
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    info!("{:<12} --> {} stopped listening", "Live", user_id);
}

/// Sends the stored notifications and returns their ids.
async fn send_notification_snapshot(
    socket: &mut WebSocket,
    state: &AppState,
    user_id: &str,
) -> Result<HashSet<i64>, axum::Error> {
    let notifications = state
        .notifications
        .list_for_user(user_id)
        .await
        .map_err(axum::Error::new)?;
    let ids = notifications.iter().map(|n| n.id).collect();
    send_json(socket, &LiveNotificationMessage::Snapshot { notifications }).await?;
    Ok(ids)
}
// endregion: --- Live Updates
