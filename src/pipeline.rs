//! One ingestion run: schema check, fetch, parse, store.

use std::fmt;

use tracing::{info, warn};

use crate::config::{DatabaseConfig, FeedConfig};
use crate::db::{Database, ReconcileOutcome, SchemaReconciler};
use crate::rss::{Clock, FeedParser, FeedSource, HttpFetcher, RssItemRepository, SystemClock};
use crate::Result;

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Result of the schema check.
    pub schema: ReconcileOutcome,
    /// Items found in the feed.
    pub items_found: usize,
    /// Items written to the table.
    pub items_stored: usize,
    /// Rows removed before writing. Zero when the write was skipped.
    pub rows_cleared: u64,
}

impl RunSummary {
    /// Whether the stored items were replaced.
    pub fn wrote(&self) -> bool {
        self.items_found > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wrote() {
            write!(
                f,
                "{}; {} item(s) stored, {} old row(s) replaced",
                self.schema, self.items_stored, self.rows_cleared
            )
        } else {
            write!(f, "{}; feed had no items, table left unchanged", self.schema)
        }
    }
}

/// Fetches one feed and mirrors its items into the database.
pub struct IngestPipeline<S, C = SystemClock> {
    source: S,
    parser: FeedParser<C>,
    feed_url: String,
}

impl IngestPipeline<HttpFetcher, SystemClock> {
    /// Pipeline fetching over HTTP with the system clock.
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Ok(Self::new(
            HttpFetcher::new(config)?,
            FeedParser::new(),
            config.url.clone(),
        ))
    }
}

impl<S: FeedSource, C: Clock> IngestPipeline<S, C> {
    /// Create a pipeline from its parts.
    pub fn new(source: S, parser: FeedParser<C>, feed_url: impl Into<String>) -> Self {
        Self {
            source,
            parser,
            feed_url: feed_url.into(),
        }
    }

    /// The feed this pipeline reads.
    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Connect to the database, run once, and close the connection.
    ///
    /// The connection is closed whether or not the run succeeds.
    pub async fn run_once(&self, config: &DatabaseConfig) -> Result<RunSummary> {
        let db = Database::connect(config).await?;
        let result = self.run_with(&db).await;
        db.close().await;
        result
    }

    /// Run once against an open database.
    ///
    /// Steps run in order and the first failure ends the run:
    /// 1. bring `rss_items` to the expected shape
    /// 2. fetch the feed
    /// 3. parse its items
    /// 4. replace the stored items, unless the feed had none
    pub async fn run_with(&self, db: &Database) -> Result<RunSummary> {
        let schema = SchemaReconciler::new(db).reconcile().await?;
        if schema.changed_structure() {
            warn!("Schema check: {}", schema);
        } else {
            info!("Schema check: {}", schema);
        }

        let body = self.source.fetch(&self.feed_url).await?;

        let items = self.parser.parse(&body);
        info!("Found {} item(s) in feed", items.len());

        if items.is_empty() {
            warn!("No items parsed from {}; leaving stored items unchanged", self.feed_url);
            return Ok(RunSummary {
                schema,
                items_found: 0,
                items_stored: 0,
                rows_cleared: 0,
            });
        }

        let report = RssItemRepository::new(db.pool())
            .replace_all(&items)
            .await?;

        Ok(RunSummary {
            schema,
            items_found: items.len(),
            items_stored: report.inserted,
            rows_cleared: report.rows_cleared,
        })
    }
}
