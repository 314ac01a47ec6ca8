use async_trait::async_trait;
use auction_ledger::auction::commands::CreateAuctionCommand;
use auction_ledger::auction::events::LedgerEvent;
use auction_ledger::auction::model::{
    Auction, AuctionDuration, AuctionFilter, AuctionState, AuctionStatus, CloseOutcome, NewAuction,
    MAX_PRICE,
};
use auction_ledger::bidding::commands::SubmitBidCommand;
use auction_ledger::bidding::model::{Bid, NewBid};
use auction_ledger::error::LedgerError;
use auction_ledger::feed::{AuctionFeed, FeedError};
use auction_ledger::ledger::{BidLedger, MAX_COMMIT_ATTEMPTS};
use auction_ledger::notification::model::NotificationKind;
use auction_ledger::notification::{NotificationDispatcher, NotificationFeed};
use auction_ledger::publisher::{EventPublisher, PublishError};
use auction_ledger::scheduler::AuctionScheduler;
use auction_ledger::store::memory::{InMemoryAuctionStore, InMemoryNotificationStore};
use auction_ledger::store::{AuctionStore, NotificationStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Tracing for test output
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

fn setup() -> (Arc<BidLedger>, Arc<AuctionFeed>) {
    init_tracing();
    let feed = Arc::new(AuctionFeed::new(64));
    let ledger = Arc::new(BidLedger::new(
        Arc::new(InMemoryAuctionStore::new()),
        feed.clone(),
    ));
    (ledger, feed)
}

fn auction_command() -> CreateAuctionCommand {
    CreateAuctionCommand {
        fish_name: "Betta Halfmoon".to_string(),
        description: Some("Blue male, 4 months".to_string()),
        image_url: None,
        starting_price: dec!(85.00),
        min_increment: dec!(1.00),
        end_date: None,
        duration: Some(AuctionDuration::TwoHours),
        seller_id: "seller-1".to_string(),
    }
}

async fn create_test_auction(ledger: &BidLedger) -> Auction {
    ledger
        .create_auction(auction_command())
        .await
        .expect("auction creation failed")
}

fn bid(auction_id: i64, bidder: &str, amount: Decimal) -> SubmitBidCommand {
    SubmitBidCommand {
        auction_id,
        bidder_id: bidder.to_string(),
        bidder_name: format!("{bidder} name"),
        amount,
    }
}

// region:    --- Bid Validation
#[tokio::test]
async fn test_bid_below_minimum_reports_minimum() {
    let (ledger, _) = setup();
    let auction = create_test_auction(&ledger).await;

    let err = ledger
        .submit_bid(bid(auction.id, "buyer-1", dec!(85.99)))
        .await
        .unwrap_err();
    match err {
        LedgerError::BidTooLow { minimum } => assert_eq!(minimum, dec!(86.00)),
        other => panic!("expected BidTooLow, got {other:?}"),
    }

    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert_eq!(state.current_price, dec!(85.00));
    assert!(state.bids.is_empty());
}

#[tokio::test]
async fn test_accepted_bid_raises_minimum() {
    let (ledger, _) = setup();
    let auction = create_test_auction(&ledger).await;

    let accepted = ledger
        .submit_bid(bid(auction.id, "buyer-1", dec!(86.00)))
        .await
        .unwrap();
    assert_eq!(accepted.sequence, 1);
    assert_eq!(accepted.bid_value, dec!(86.00));

    let err = ledger
        .submit_bid(bid(auction.id, "buyer-2", dec!(86.00)))
        .await
        .unwrap_err();
    match err {
        LedgerError::BidTooLow { minimum } => assert_eq!(minimum, dec!(87.00)),
        other => panic!("expected BidTooLow, got {other:?}"),
    }

    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert_eq!(state.current_price, dec!(86.00));
    assert_eq!(state.bids, vec![accepted]);
}

#[tokio::test]
async fn test_rejects_fractional_cents_and_missing_bidder() {
    let (ledger, _) = setup();
    let auction = create_test_auction(&ledger).await;

    let err = ledger
        .submit_bid(bid(auction.id, "buyer-1", dec!(86.005)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidBid(_)));

    let mut anonymous = bid(auction.id, "buyer-1", dec!(90));
    anonymous.bidder_id = " ".to_string();
    let err = ledger.submit_bid(anonymous).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_BID");
}

#[tokio::test]
async fn test_unknown_auction_is_not_found() {
    let (ledger, _) = setup();

    let err = ledger
        .submit_bid(bid(404, "buyer-1", dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(404)));

    let err = ledger.get_current_state(404).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_prices_above_the_cap_are_rejected() {
    let (ledger, _) = setup();

    let mut cmd = auction_command();
    cmd.starting_price = Decimal::MAX;
    let err = ledger.create_auction(cmd).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_AUCTION");

    let mut cmd = auction_command();
    cmd.min_increment = MAX_PRICE + dec!(1);
    let err = ledger.create_auction(cmd).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_AUCTION");

    let auction = create_test_auction(&ledger).await;
    let err = ledger
        .submit_bid(bid(auction.id, "buyer-1", MAX_PRICE + dec!(0.01)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidBid(_)));

    let err = ledger
        .submit_bid(bid(auction.id, "buyer-1", Decimal::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidBid(_)));

    let accepted = ledger
        .submit_bid(bid(auction.id, "buyer-1", MAX_PRICE))
        .await
        .unwrap();
    assert_eq!(accepted.bid_value, MAX_PRICE);
}

#[tokio::test]
async fn test_stored_huge_price_does_not_panic() {
    init_tracing();
    let store = Arc::new(InMemoryAuctionStore::new());
    let ledger = BidLedger::new(store.clone(), Arc::new(AuctionFeed::new(8)));
    let now = Utc::now();
    let mut new = ended_auction(now);
    new.end_date = now + Duration::hours(1);
    new.starting_price = Decimal::MAX;
    new.min_increment = dec!(1);
    let auction = store.create_auction(new, now).await.unwrap();

    let err = ledger
        .submit_bid(bid(auction.id, "buyer-1", Decimal::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidBid(_)));
}
// endregion: --- Bid Validation

// region:    --- Ledger State
#[tokio::test]
async fn test_state_lists_bids_newest_first() {
    let (ledger, _) = setup();
    let auction = create_test_auction(&ledger).await;

    for (bidder, amount) in [("a", dec!(86)), ("b", dec!(88.50)), ("a", dec!(90))] {
        ledger
            .submit_bid(bid(auction.id, bidder, amount))
            .await
            .unwrap();
    }

    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert_eq!(state.current_price, dec!(90));
    assert_eq!(state.auction.bid_count, 3);
    let sequences: Vec<i64> = state.bids.iter().map(|b| b.sequence).collect();
    assert_eq!(sequences, vec![3, 2, 1]);
    assert_eq!(state.bids[0].bid_value, state.current_price);
    assert!(state
        .bids
        .windows(2)
        .all(|pair| pair[0].bid_value > pair[1].bid_value && pair[0].created_at >= pair[1].created_at));
}

#[tokio::test]
async fn test_list_auctions_filters_by_seller_and_status() {
    let (ledger, _) = setup();
    let first = create_test_auction(&ledger).await;
    let second = create_test_auction(&ledger).await;
    ledger.cancel_auction(first.id).await.unwrap();

    let active = ledger
        .list_auctions(&AuctionFilter {
            seller_id: Some("seller-1".to_string()),
            status: Some(AuctionStatus::Active),
        })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);

    let other_seller = ledger
        .list_auctions(&AuctionFilter {
            seller_id: Some("seller-2".to_string()),
            status: None,
        })
        .await
        .unwrap();
    assert!(other_seller.is_empty());
}

#[tokio::test]
async fn test_create_requires_end() {
    let (ledger, _) = setup();
    let err = ledger
        .create_auction(CreateAuctionCommand {
            fish_name: "Guppy".to_string(),
            description: None,
            image_url: None,
            starting_price: dec!(10),
            min_increment: dec!(1),
            end_date: None,
            duration: None,
            seller_id: "seller-1".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_AUCTION");
}
// endregion: --- Ledger State

// region:    --- Concurrency
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_equal_bids_accept_one() {
    let (ledger, _) = setup();
    let auction = create_test_auction(&ledger).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let ledger = Arc::clone(&ledger);
        let cmd = bid(auction.id, &format!("buyer-{i}"), dec!(86.00));
        handles.push(tokio::spawn(async move { ledger.submit_bid(cmd).await }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::BidTooLow { minimum }) => assert_eq!(minimum, dec!(87.00)),
            Err(LedgerError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(accepted, 1);

    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert_eq!(state.bids.len(), 1);
    assert_eq!(state.current_price, dec!(86.00));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bids_keep_ledger_increasing() {
    let (ledger, _) = setup();
    let auction = create_test_auction(&ledger).await;

    let mut handles = Vec::new();
    for i in 0..24 {
        let ledger = Arc::clone(&ledger);
        let cmd = bid(auction.id, &format!("buyer-{i}"), dec!(86) + Decimal::from(i));
        handles.push(tokio::spawn(async move { ledger.submit_bid(cmd).await }));
    }

    let mut accepted = Vec::new();
    for handle in handles {
        if let Ok(bid) = handle.await.unwrap() {
            accepted.push(bid);
        }
    }
    assert!(!accepted.is_empty());

    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert_eq!(state.bids.len(), accepted.len());

    let mut ledger_order = state.bids.clone();
    ledger_order.reverse();
    for (index, pair) in ledger_order.windows(2).enumerate() {
        assert_eq!(pair[0].sequence, index as i64 + 1);
        assert!(pair[1].bid_value >= pair[0].bid_value + auction.min_increment);
        assert!(pair[1].created_at >= pair[0].created_at);
    }
    let highest = accepted.iter().map(|b| b.bid_value).max().unwrap();
    assert_eq!(state.current_price, highest);
}
// endregion: --- Concurrency

// region:    --- Closing
#[tokio::test]
async fn test_close_picks_highest_bidder() {
    let (ledger, _) = setup();
    let auction = create_test_auction(&ledger).await;
    ledger
        .submit_bid(bid(auction.id, "alice", dec!(86)))
        .await
        .unwrap();
    ledger
        .submit_bid(bid(auction.id, "bob", dec!(95)))
        .await
        .unwrap();

    let closed = ledger.close_auction(auction.id).await.unwrap();
    assert_eq!(closed.status, AuctionStatus::Finished);
    assert_eq!(closed.winner_id.as_deref(), Some("bob"));
    assert_eq!(closed.current_price, dec!(95));
    assert!(closed.closed_at.is_some());

    let err = ledger
        .submit_bid(bid(auction.id, "alice", dec!(200)))
        .await
        .unwrap_err();
    match err {
        LedgerError::AuctionClosed { status, .. } => assert_eq!(status, AuctionStatus::Finished),
        other => panic!("expected AuctionClosed, got {other:?}"),
    }

    let err = ledger.close_auction(auction.id).await.unwrap_err();
    assert_eq!(err.code(), "AUCTION_CLOSED");
}

#[tokio::test]
async fn test_close_without_bids_has_no_winner() {
    let (ledger, _) = setup();
    let auction = create_test_auction(&ledger).await;

    let closed = ledger.close_auction(auction.id).await.unwrap();
    assert_eq!(closed.status, AuctionStatus::Finished);
    assert!(closed.winner_id.is_none());
    assert_eq!(closed.current_price, dec!(85.00));
}

#[tokio::test]
async fn test_cancelled_auction_refuses_bids() {
    let (ledger, _) = setup();
    let auction = create_test_auction(&ledger).await;
    ledger
        .submit_bid(bid(auction.id, "alice", dec!(86)))
        .await
        .unwrap();

    let cancelled = ledger.cancel_auction(auction.id).await.unwrap();
    assert_eq!(cancelled.status, AuctionStatus::Cancelled);
    assert!(cancelled.winner_id.is_none());

    let err = ledger
        .submit_bid(bid(auction.id, "bob", dec!(100)))
        .await
        .unwrap_err();
    match err {
        LedgerError::AuctionClosed { status, .. } => assert_eq!(status, AuctionStatus::Cancelled),
        other => panic!("expected AuctionClosed, got {other:?}"),
    }

    // history survives the cancellation
    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert_eq!(state.bids.len(), 1);
}

#[tokio::test]
async fn test_bid_past_end_date_is_closed() {
    init_tracing();
    let store = Arc::new(InMemoryAuctionStore::new());
    let ledger = BidLedger::new(store.clone(), Arc::new(AuctionFeed::new(8)));
    let now = Utc::now();
    let auction = store
        .create_auction(ended_auction(now), now - Duration::hours(2))
        .await
        .unwrap();

    let err = ledger
        .submit_bid(bid(auction.id, "late", dec!(500)))
        .await
        .unwrap_err();
    match err {
        LedgerError::AuctionClosed { status, .. } => assert_eq!(status, AuctionStatus::Finished),
        other => panic!("expected AuctionClosed, got {other:?}"),
    }

    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert!(state.bids.is_empty());
}

#[tokio::test]
async fn test_scheduler_closes_expired_auctions() {
    init_tracing();
    let store = Arc::new(InMemoryAuctionStore::new());
    let ledger = Arc::new(BidLedger::new(store.clone(), Arc::new(AuctionFeed::new(8))));
    let now = Utc::now();
    let expired = store
        .create_auction(ended_auction(now), now - Duration::hours(2))
        .await
        .unwrap();
    let running = create_test_auction(&ledger).await;

    let scheduler = AuctionScheduler::new(Arc::clone(&ledger), std::time::Duration::from_secs(1));
    assert_eq!(scheduler.run_once().await, 1);
    assert_eq!(scheduler.run_once().await, 0);

    let expired = ledger.get_auction(expired.id).await.unwrap();
    assert_eq!(expired.status, AuctionStatus::Finished);
    let running = ledger.get_auction(running.id).await.unwrap();
    assert_eq!(running.status, AuctionStatus::Active);
}

fn ended_auction(now: DateTime<Utc>) -> NewAuction {
    NewAuction {
        fish_name: "Neon Tetra".to_string(),
        description: None,
        image_url: None,
        starting_price: dec!(12.00),
        min_increment: dec!(0.50),
        end_date: now - Duration::minutes(1),
        seller_id: "seller-1".to_string(),
    }
}
// endregion: --- Closing

// region:    --- Commit Faults
enum CommitFault {
    /// close the auction, like a close landing between validation and write
    Close,
    /// another bid commits first
    RivalBid,
    Conflict,
    Database,
}

/// Injects `fault` into the next `faults_left` bid commits.
struct FlakyCommitStore {
    inner: InMemoryAuctionStore,
    fault: CommitFault,
    faults_left: AtomicU32,
    commit_attempts: AtomicU32,
}

impl FlakyCommitStore {
    fn new(fault: CommitFault, faults: u32) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryAuctionStore::new(),
            fault,
            faults_left: AtomicU32::new(faults),
            commit_attempts: AtomicU32::new(0),
        })
    }

    fn commit_attempts(&self) -> u32 {
        self.commit_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuctionStore for FlakyCommitStore {
    async fn create_auction(
        &self,
        new: NewAuction,
        created_at: DateTime<Utc>,
    ) -> Result<Auction, StoreError> {
        self.inner.create_auction(new, created_at).await
    }

    async fn get_auction(&self, auction_id: i64) -> Result<Auction, StoreError> {
        self.inner.get_auction(auction_id).await
    }

    async fn list_auctions(&self, filter: &AuctionFilter) -> Result<Vec<Auction>, StoreError> {
        self.inner.list_auctions(filter).await
    }

    async fn get_state(&self, auction_id: i64) -> Result<AuctionState, StoreError> {
        self.inner.get_state(auction_id).await
    }

    async fn latest_bid(&self, auction_id: i64) -> Result<Option<Bid>, StoreError> {
        self.inner.latest_bid(auction_id).await
    }

    async fn commit_bid(
        &self,
        expected_version: i64,
        bid: NewBid,
    ) -> Result<(Auction, Bid), StoreError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let inject = self
            .faults_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject {
            match self.fault {
                CommitFault::Close => {
                    let outcome = CloseOutcome {
                        status: AuctionStatus::Finished,
                        winner_id: None,
                        closed_at: Utc::now(),
                    };
                    self.inner
                        .commit_close(bid.auction_id, expected_version, outcome)
                        .await?;
                }
                CommitFault::RivalBid => {
                    let rival = NewBid {
                        auction_id: bid.auction_id,
                        user_id: "rival".to_string(),
                        user_name: "Rival".to_string(),
                        bid_value: dec!(86),
                        created_at: bid.created_at,
                    };
                    self.inner.commit_bid(expected_version, rival).await?;
                }
                CommitFault::Conflict => return Err(StoreError::Conflict(bid.auction_id)),
                CommitFault::Database => {
                    return Err(StoreError::Database(sqlx::Error::PoolTimedOut))
                }
            }
        }
        self.inner.commit_bid(expected_version, bid).await
    }

    async fn commit_close(
        &self,
        auction_id: i64,
        expected_version: i64,
        outcome: CloseOutcome,
    ) -> Result<Auction, StoreError> {
        self.inner
            .commit_close(auction_id, expected_version, outcome)
            .await
    }

    async fn expired_auctions(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        self.inner.expired_auctions(now).await
    }
}

#[tokio::test]
async fn test_bid_validated_before_close_is_not_accepted() {
    init_tracing();
    let store = FlakyCommitStore::new(CommitFault::Close, 1);
    let ledger = BidLedger::new(store.clone(), Arc::new(AuctionFeed::new(8)));
    let auction = create_test_auction(&ledger).await;

    let err = ledger
        .submit_bid(bid(auction.id, "buyer-1", dec!(86)))
        .await
        .unwrap_err();
    match err {
        LedgerError::AuctionClosed { status, .. } => assert_eq!(status, AuctionStatus::Finished),
        other => panic!("expected AuctionClosed, got {other:?}"),
    }

    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert!(state.bids.is_empty());
    assert_eq!(state.current_price, dec!(85.00));
}

#[tokio::test]
async fn test_lost_commit_is_retried_against_fresh_state() {
    init_tracing();
    let store = FlakyCommitStore::new(CommitFault::RivalBid, 1);
    let ledger = BidLedger::new(store.clone(), Arc::new(AuctionFeed::new(8)));
    let auction = create_test_auction(&ledger).await;

    let accepted = ledger
        .submit_bid(bid(auction.id, "buyer-1", dec!(90)))
        .await
        .unwrap();
    assert_eq!(store.commit_attempts(), 2);
    assert_eq!(accepted.sequence, 2);

    let state = ledger.get_current_state(auction.id).await.unwrap();
    let bidders: Vec<&str> = state.bids.iter().map(|b| b.user_id.as_str()).collect();
    assert_eq!(bidders, vec!["buyer-1", "rival"]);
    assert_eq!(state.current_price, dec!(90));
}

#[tokio::test]
async fn test_retry_revalidates_the_minimum() {
    init_tracing();
    let store = FlakyCommitStore::new(CommitFault::RivalBid, 1);
    let ledger = BidLedger::new(store.clone(), Arc::new(AuctionFeed::new(8)));
    let auction = create_test_auction(&ledger).await;

    // valid against 85.00, too low once the rival's 86.00 is in
    let err = ledger
        .submit_bid(bid(auction.id, "buyer-1", dec!(86.50)))
        .await
        .unwrap_err();
    match err {
        LedgerError::BidTooLow { minimum } => assert_eq!(minimum, dec!(87.00)),
        other => panic!("expected BidTooLow, got {other:?}"),
    }
    // the retry stopped at validation
    assert_eq!(store.commit_attempts(), 1);
}

#[tokio::test]
async fn test_repeated_conflict_gives_up() {
    init_tracing();
    let store = FlakyCommitStore::new(CommitFault::Conflict, u32::MAX);
    let ledger = BidLedger::new(store.clone(), Arc::new(AuctionFeed::new(8)));
    let auction = create_test_auction(&ledger).await;

    let err = ledger
        .submit_bid(bid(auction.id, "buyer-1", dec!(86)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(id) if id == auction.id));
    assert_eq!(store.commit_attempts(), MAX_COMMIT_ATTEMPTS);

    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert!(state.bids.is_empty());
}

#[tokio::test]
async fn test_database_failure_is_not_retried() {
    init_tracing();
    let store = FlakyCommitStore::new(CommitFault::Database, 1);
    let ledger = BidLedger::new(store.clone(), Arc::new(AuctionFeed::new(8)));
    let auction = create_test_auction(&ledger).await;

    let err = ledger
        .submit_bid(bid(auction.id, "buyer-1", dec!(86)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unavailable(_)));
    assert_eq!(err.code(), "UNAVAILABLE");
    assert_eq!(store.commit_attempts(), 1);
}
// endregion: --- Commit Faults

// region:    --- Events
#[tokio::test]
async fn test_commits_emit_ordered_events() {
    let (ledger, feed) = setup();
    let auction = create_test_auction(&ledger).await;
    let mut subscription = feed.subscribe(auction.id);

    ledger
        .submit_bid(bid(auction.id, "alice", dec!(86)))
        .await
        .unwrap();
    ledger
        .submit_bid(bid(auction.id, "bob", dec!(87)))
        .await
        .unwrap();
    ledger.close_auction(auction.id).await.unwrap();

    let first = subscription.recv().await.unwrap();
    let second = subscription.recv().await.unwrap();
    let last = subscription.recv().await.unwrap();
    assert_eq!((first.version(), second.version(), last.version()), (1, 2, 3));
    match second {
        LedgerEvent::BidAccepted {
            bid, current_price, ..
        } => {
            assert_eq!(bid.user_id, "bob");
            assert_eq!(current_price, dec!(87));
        }
        other => panic!("expected BidAccepted, got {other:?}"),
    }
    assert!(last.is_terminal());
    assert_eq!(feed.last_version(auction.id), 3);
}

struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: &LedgerEvent) -> Result<(), PublishError> {
        Err(PublishError::Broker("broker down".to_string()))
    }
}

#[tokio::test]
async fn test_publish_failure_keeps_committed_bid() {
    init_tracing();
    let ledger = BidLedger::new(
        Arc::new(InMemoryAuctionStore::new()),
        Arc::new(FailingPublisher),
    );
    let auction = create_test_auction(&ledger).await;

    let accepted = ledger
        .submit_bid(bid(auction.id, "alice", dec!(86)))
        .await
        .unwrap();

    let state = ledger.get_current_state(auction.id).await.unwrap();
    assert_eq!(state.bids, vec![accepted]);
}
/// Holds back the first bid's event, so the second bid publishes first.
struct SlowFirstPublisher {
    feed: Arc<AuctionFeed>,
}

#[async_trait]
impl EventPublisher for SlowFirstPublisher {
    async fn publish(&self, event: &LedgerEvent) -> Result<(), PublishError> {
        if event.version() == 1 {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
        self.feed.publish(event).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_out_of_order_publish_is_recoverable() {
    init_tracing();
    let feed = Arc::new(AuctionFeed::new(16));
    let notifications: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
    tokio::spawn(
        NotificationDispatcher::new(
            Arc::clone(&notifications),
            feed.subscribe_all(),
            Arc::new(NotificationFeed::new(16)),
        )
        .run(),
    );
    let ledger = Arc::new(BidLedger::new(
        Arc::new(InMemoryAuctionStore::new()),
        Arc::new(SlowFirstPublisher { feed: feed.clone() }),
    ));
    let auction = create_test_auction(&ledger).await;

    let mut observer = feed.subscribe(auction.id);
    let snapshot = ledger.get_current_state(auction.id).await.unwrap();
    observer.resume_after(snapshot.auction.version);

    let first = {
        let ledger = Arc::clone(&ledger);
        let cmd = bid(auction.id, "alice", dec!(86));
        tokio::spawn(async move { ledger.submit_bid(cmd).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    ledger
        .submit_bid(bid(auction.id, "bob", dec!(90)))
        .await
        .unwrap();
    first.await.unwrap().unwrap();

    // the observer learns it missed version 1 and re-reads
    assert_eq!(
        observer.recv().await.unwrap_err(),
        FeedError::Gap {
            expected: 1,
            received: 2
        }
    );
    let snapshot = ledger.get_current_state(auction.id).await.unwrap();
    assert_eq!(snapshot.bids.len(), 2);
    assert_eq!(snapshot.auction.version, 2);

    // the seller hears about both bids
    let mut seller = Vec::new();
    for _ in 0..50 {
        seller = notifications.list_for_user("seller-1").await.unwrap();
        if seller.len() >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(seller.len(), 2);
    assert!(seller.iter().all(|n| n.kind == NotificationKind::NewBid));
}
// endregion: --- Events
