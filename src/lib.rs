//! rss2db - RSS feed to database mirror
//!
//! Fetches a single RSS feed, makes sure the `rss_items` table has the
//! expected columns, and replaces its contents with the feed's items.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod rss;

pub use config::Config;
pub use db::{Database, DbPool, ReconcileOutcome, SchemaReconciler};
pub use error::{IngestError, Result};
pub use pipeline::{IngestPipeline, RunSummary};
pub use rss::{FeedItem, FeedParser, FeedSource, HttpFetcher, RssItemRepository};
