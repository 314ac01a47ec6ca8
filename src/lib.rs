pub mod app;
pub mod auction;
pub mod bidding;
pub mod config;
pub mod database;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod ledger;
pub mod message_broker;
pub mod notification;
pub mod publisher;
pub mod scheduler;
pub mod store;
