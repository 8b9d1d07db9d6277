//! RSS module for rss2db.
//!
//! Fetching, parsing and storage of feed items.

pub mod fetcher;
pub mod parser;
pub mod repository;
pub mod types;

pub use fetcher::{validate_url, FeedSource, HttpFetcher};
pub use parser::{parse_feed, parse_pub_date, Clock, FeedParser, FixedClock, SystemClock};
pub use repository::{describe_write_error, RssItemRepository, WriteReport};
pub use types::{FeedItem, StoredRssItem};
