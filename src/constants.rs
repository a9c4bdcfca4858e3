//! Pipeline tuning constants

/// Weight of a kind-7 reaction in the engagement score
pub const REACTION_WEIGHT: u32 = 1;

/// Weight of a kind-6 repost in the engagement score
pub const REPOST_WEIGHT: u32 = 3;

/// Weight of a kind-9735 zap receipt in the engagement score
pub const ZAP_WEIGHT: u32 = 5;

/// Weight of a reply note in the engagement score
pub const REPLY_WEIGHT: u32 = 2;

/// Flat bonus added when the note's key words show up in trending search
pub const TRENDING_BONUS: u32 = 5;

/// Result ceiling for each engagement sub-query
pub const ENGAGEMENT_QUERY_LIMIT: usize = 100;

/// Result ceiling for the trending search query
pub const TRENDING_SEARCH_LIMIT: usize = 10;

/// Words shorter than this are ignored when building the trending phrase
pub const TRENDING_WORD_MIN_LEN: usize = 5;

/// Number of longest words used as the trending search phrase
pub const TRENDING_WORD_COUNT: usize = 3;

/// Timeout for a single relay query (seconds)
pub const RELAY_TIMEOUT_SECS: u64 = 15;

/// How far back the live scan looks for candidate notes (seconds)
pub const SCAN_LOOKBACK_SECS: i64 = 72 * 3600;

/// Result ceiling for the live scan query
pub const SCAN_LIMIT: usize = 50;

/// Notes younger than this are left to accrue engagement (seconds)
pub const MIN_AGE_SECS: i64 = 6 * 3600;

/// Minimum stripped length for a note to be worth cross-posting
pub const MIN_CONTENT_LENGTH: usize = 30;

/// Stripped length at which an X-only note is promoted to LinkedIn too
pub const LONG_CONTENT_PROMOTION_LEN: usize = 300;

/// Normalized-body prefix length used by the duplicate check
pub const DUP_PREFIX_LEN: usize = 100;

/// How much of the original body is kept in the state file
pub const STORED_CONTENT_PREFIX_LEN: usize = 200;

/// Hard per-post character ceiling on X
pub const TWITTER_CHAR_LIMIT: usize = 280;

/// Every link counts as a fixed t.co token on X regardless of true length
pub const TWITTER_LINK_LEN: usize = 23;

/// Character ceiling for LinkedIn post commentary
pub const LINKEDIN_CHAR_LIMIT: usize = 3000;

/// Maximum hashtags appended per post
pub const MAX_HASHTAGS: usize = 3;

/// Default per-day publish caps
pub const TWITTER_DAILY_CAP: u32 = 5;
pub const LINKEDIN_DAILY_CAP: u32 = 2;

/// Default minimum engagement score per platform
pub const TWITTER_MIN_SCORE: u32 = 10;
pub const LINKEDIN_MIN_SCORE: u32 = 15;

/// Minimum spacing between publishes to the same platform (seconds)
pub const TWITTER_COOLDOWN_SECS: i64 = 30 * 60;
pub const LINKEDIN_COOLDOWN_SECS: i64 = 2 * 3600;

/// Relays queried when none are configured
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.primal.net",
];

/// Search-capable relay used for the trending signal
pub const SEARCH_RELAY: &str = "wss://relay.nostr.band";
