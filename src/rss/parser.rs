//! Tolerant RSS parser.
//!
//! Every `item` element in the document becomes one [`FeedItem`]. Missing
//! child elements yield empty strings and unreadable dates fall back to the
//! clock's current time, so a single bad item never loses the rest. A
//! document that is not well-formed XML produces no items at all.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, warn};

use crate::rss::types::FeedItem;
use crate::{IngestError, Result};

/// Dublin Core namespace, used by WordPress for `dc:creator`.
const DUBLIN_CORE_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Date-time layouts tried after RFC 2822 and RFC 3339, without offset.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%a, %d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%A, %d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M:%S",
    "%B %d, %Y %H:%M:%S",
];

/// Date-time layouts carrying an offset that RFC 2822/3339 do not accept.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
];

/// Date-only layouts, read as midnight.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %b %Y",
    "%a, %d %b %Y",
    "%d %B %Y",
    "%B %d, %Y",
];

/// Source of the current time for date fallbacks.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Parse a publication date.
///
/// The string is read as a wall-clock value. Any offset it carries is
/// discarded and the value is tagged UTC as is, so `10:00 +0200` is stored
/// as `10:00 UTC`. Returns `None` when no known layout matches.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.naive_local().and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local().and_utc());
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.naive_local().and_utc());
        }
    }

    // A trailing "Z", "UTC" or "GMT" says nothing beyond the UTC tag we apply anyway.
    let bare = strip_utc_suffix(raw);
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(bare, format) {
            return Some(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(bare, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

fn strip_utc_suffix(raw: &str) -> &str {
    for suffix in [" UTC", " GMT", "Z"] {
        if let Some(stripped) = raw.strip_suffix(suffix) {
            return stripped.trim_end();
        }
    }
    raw
}

/// RSS document parser with an injectable clock.
#[derive(Debug, Clone, Default)]
pub struct FeedParser<C = SystemClock> {
    clock: C,
}

impl FeedParser<SystemClock> {
    /// Parser using the system clock.
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> FeedParser<C> {
    /// Parser using the given clock for date fallbacks.
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Parse a feed body into items.
    ///
    /// Empty input yields no items. Malformed markup is logged and also
    /// yields no items; it is never returned as an error.
    pub fn parse(&self, body: &str) -> Vec<FeedItem> {
        match self.try_parse(body) {
            Ok(items) => items,
            Err(e) => {
                warn!("Error parsing RSS feed: {}", e);
                Vec::new()
            }
        }
    }

    /// Parse a feed body, reporting malformed markup as [`IngestError::Parse`].
    pub fn try_parse(&self, body: &str) -> Result<Vec<FeedItem>> {
        let body = body.trim_start_matches('\u{feff}');
        if body.trim().is_empty() {
            debug!("Feed body is empty");
            return Ok(Vec::new());
        }

        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(body, options)
            .map_err(|e| IngestError::Parse(e.to_string()))?;

        // One clock reading per document keeps fallback dates consistent.
        let now = self.clock.now();
        let items: Vec<FeedItem> = doc
            .descendants()
            .filter(|node| node.is_element() && node.tag_name().name() == "item")
            .map(|node| item_from_node(node, now))
            .collect();

        debug!("Parsed {} item(s) from feed", items.len());
        Ok(items)
    }
}

fn item_from_node(item: Node<'_, '_>, now: DateTime<Utc>) -> FeedItem {
    let pub_date_raw = child_text(item, "pubDate");
    let pub_date = parse_pub_date(&pub_date_raw).unwrap_or_else(|| {
        if !pub_date_raw.is_empty() {
            debug!("Unreadable pubDate {:?}, using current time", pub_date_raw);
        }
        now
    });

    let mut author = child_text(item, "author");
    if author.is_empty() {
        author = dublin_core_creator(item);
    }

    FeedItem {
        title: child_text(item, "title"),
        description: child_text(item, "description"),
        link: child_text(item, "link"),
        pub_date,
        author,
        category: child_text(item, "category"),
    }
}

/// Text of the first direct child called `name`, or an empty string.
///
/// The child must be un-namespaced or share the item's namespace, so
/// `atom:link` never stands in for `link`.
fn child_text(item: Node<'_, '_>, name: &str) -> String {
    let item_ns = item.tag_name().namespace();
    item.children()
        .find(|child| {
            let tag = child.tag_name();
            child.is_element()
                && tag.name() == name
                && (tag.namespace().is_none() || tag.namespace() == item_ns)
        })
        .map(element_text)
        .unwrap_or_default()
}

fn dublin_core_creator(item: Node<'_, '_>) -> String {
    item.children()
        .find(|child| child.has_tag_name((DUBLIN_CORE_NS, "creator")))
        .map(element_text)
        .unwrap_or_default()
}

/// All text beneath an element, trimmed.
fn element_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse a feed body with the system clock.
pub fn parse_feed(body: &str) -> Vec<FeedItem> {
    FeedParser::new().parse(body)
}
