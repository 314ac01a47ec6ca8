use crate::feed::AuctionFeed;
use crate::handlers;
use crate::ledger::BidLedger;
use crate::notification::NotificationFeed;
use crate::store::NotificationStore;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<BidLedger>,
    pub feed: Arc<AuctionFeed>,
    pub notifications: Arc<dyn NotificationStore>,
    pub live_notifications: Arc<NotificationFeed>,
}

pub fn router(state: AppState) -> Router {
    // the marketplace front end is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/auctions",
            get(handlers::handle_list_auctions).post(handlers::handle_create_auction),
        )
        .route("/auctions/:id", get(handlers::handle_get_auction_state))
        .route("/auctions/:id/bids", post(handlers::handle_submit_bid))
        .route("/auctions/:id/close", post(handlers::handle_close_auction))
        .route("/auctions/:id/cancel", post(handlers::handle_cancel_auction))
        .route("/auctions/:id/live", get(handlers::handle_live_auction))
        .route(
            "/users/:user_id/notifications",
            get(handlers::handle_get_notifications),
        )
        .route(
            "/users/:user_id/notifications/live",
            get(handlers::handle_live_notifications),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::handle_mark_notification_read),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}
