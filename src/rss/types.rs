//! RSS item types for rss2db.

use chrono::{DateTime, Utc};

/// A feed item parsed from the source document.
///
/// Absent text elements are held as empty strings. `pub_date` is always UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Item title.
    pub title: String,
    /// Item description.
    pub description: String,
    /// Link to the full article.
    pub link: String,
    /// Publication time.
    pub pub_date: DateTime<Utc>,
    /// Author name.
    pub author: String,
    /// First category.
    pub category: String,
}

impl FeedItem {
    /// Create an item with the given title and publication time.
    pub fn new(title: impl Into<String>, pub_date: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            link: String::new(),
            pub_date,
            author: String::new(),
            category: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// A feed item as stored in the `rss_items` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredRssItem {
    /// Row ID assigned by the database.
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub pub_date: DateTime<Utc>,
    pub author: Option<String>,
    pub category: Option<String>,
}

impl StoredRssItem {
    /// Convert back to the in-memory form, mapping NULL text to empty strings.
    pub fn into_feed_item(self) -> FeedItem {
        FeedItem {
            title: self.title,
            description: self.description.unwrap_or_default(),
            link: self.link,
            pub_date: self.pub_date,
            author: self.author.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
        }
    }
}
