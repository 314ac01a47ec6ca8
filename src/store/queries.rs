/// New auction, priced at its starting price
pub const INSERT_AUCTION: &str = r#"
    INSERT INTO auctions (fish_name, description, image_url, starting_price, current_price,
                          min_increment, end_date, seller_id, status, created_at)
    VALUES ($1, $2, $3, $4, $4, $5, $6, $7, 'active', $8)
    RETURNING *
"#;

/// Single auction
pub const GET_AUCTION: &str = "SELECT * FROM auctions WHERE id = $1";

/// Auctions, optionally filtered by seller and status
pub const LIST_AUCTIONS: &str = r#"
    SELECT *
    FROM auctions
    WHERE ($1::TEXT IS NULL OR seller_id = $1)
      AND ($2::TEXT IS NULL OR status = $2)
    ORDER BY created_at DESC, id DESC
"#;

/// Bid history, newest first
pub const GET_BID_HISTORY: &str = r#"
    SELECT id, auction_id, user_id, user_name, bid_value, sequence, created_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY sequence DESC
"#;

pub const GET_LATEST_BID: &str = r#"
    SELECT id, auction_id, user_id, user_name, bid_value, sequence, created_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY sequence DESC
    LIMIT 1
"#;

/// Conditional price move. No row back means the version moved, the auction
/// closed, or the end date passed.
pub const ADVANCE_PRICE: &str = r#"
    UPDATE auctions
    SET current_price = $1, bid_count = bid_count + 1, last_bid_at = $2, version = version + 1
    WHERE id = $3 AND version = $4 AND status = 'active' AND end_date > $2
    RETURNING *
"#;

pub const INSERT_BID: &str = r#"
    INSERT INTO bids (auction_id, user_id, user_name, bid_value, sequence, created_at)
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING id, auction_id, user_id, user_name, bid_value, sequence, created_at
"#;

pub const CLOSE_AUCTION: &str = r#"
    UPDATE auctions
    SET status = $1, winner_id = $2, closed_at = $3, version = version + 1
    WHERE id = $4 AND version = $5 AND status = 'active'
    RETURNING *
"#;

pub const GET_EXPIRED_AUCTIONS: &str = r#"
    SELECT id FROM auctions
    WHERE status = 'active' AND end_date <= $1
    ORDER BY end_date
"#;

pub const INSERT_NOTIFICATION: &str = r#"
    INSERT INTO notifications (user_id, kind, title, message, auction_id, event_version, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (user_id, kind, auction_id, event_version) DO NOTHING
    RETURNING id, user_id, kind, title, message, auction_id, read, created_at
"#;

pub const GET_USER_NOTIFICATIONS: &str = r#"
    SELECT id, user_id, kind, title, message, auction_id, read, created_at
    FROM notifications
    WHERE user_id = $1
    ORDER BY created_at DESC, id DESC
"#;

pub const MARK_NOTIFICATION_READ: &str = "UPDATE notifications SET read = TRUE WHERE id = $1";
