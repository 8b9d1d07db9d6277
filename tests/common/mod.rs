//! Test helpers for end-to-end runs.
//!
//! Provides a local feed server whose response can be swapped between runs
//! and a throwaway SQLite database.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tempfile::TempDir;
use tokio::net::TcpListener;

use rss2db::config::{DatabaseConfig, FeedConfig};
use rss2db::{Database, IngestPipeline};

#[derive(Clone)]
struct FeedResponse {
    status: StatusCode,
    body: String,
}

/// HTTP server that serves one feed at `/feed`.
pub struct FeedServer {
    base_url: String,
    response: Arc<Mutex<FeedResponse>>,
}

impl FeedServer {
    /// Start a server on an ephemeral port serving `body`.
    pub async fn start(body: impl Into<String>) -> Self {
        let response = Arc::new(Mutex::new(FeedResponse {
            status: StatusCode::OK,
            body: body.into(),
        }));

        let app = Router::new()
            .route("/feed", get(serve_feed))
            .with_state(Arc::clone(&response));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            response,
        }
    }

    /// URL of the feed.
    pub fn feed_url(&self) -> String {
        format!("{}/feed", self.base_url)
    }

    /// Serve `body` with status 200 from now on.
    pub fn set_body(&self, body: impl Into<String>) {
        let mut response = self.response.lock().unwrap();
        response.status = StatusCode::OK;
        response.body = body.into();
    }

    /// Answer every request with `status` and an empty body.
    pub fn set_status(&self, status: StatusCode) {
        let mut response = self.response.lock().unwrap();
        response.status = status;
        response.body.clear();
    }
}

async fn serve_feed(State(response): State<Arc<Mutex<FeedResponse>>>) -> impl IntoResponse {
    let response = response.lock().unwrap().clone();
    (
        response.status,
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        response.body,
    )
}

/// A SQLite database file inside a temporary directory.
pub struct TestDatabase {
    _dir: TempDir,
    pub config: DatabaseConfig,
}

impl TestDatabase {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("rss2db.db").to_string_lossy().into_owned(),
            ..DatabaseConfig::default()
        };
        Self { _dir: dir, config }
    }

    /// Open a fresh connection to the database.
    pub async fn open(&self) -> Database {
        Database::connect(&self.config).await.unwrap()
    }

    /// Run a SQL statement on a short-lived connection.
    pub async fn execute(&self, sql: &str) {
        let db = self.open().await;
        sqlx::query(sql).execute(db.pool()).await.unwrap();
        db.close().await;
    }
}

/// Pipeline reading from `server` over HTTP.
pub fn http_pipeline(server: &FeedServer) -> IngestPipeline<rss2db::HttpFetcher> {
    let config = FeedConfig {
        url: server.feed_url(),
        ..FeedConfig::default()
    };
    IngestPipeline::from_config(&config).unwrap()
}

/// One `<item>` element. Fields passed as `None` are left out.
pub fn rss_item(
    title: &str,
    link: Option<&str>,
    pub_date: Option<&str>,
    author: Option<&str>,
) -> String {
    let mut xml = format!("<item><title>{}</title>", title);
    xml.push_str(&format!("<description>About {}</description>", title));
    if let Some(link) = link {
        xml.push_str(&format!("<link>{}</link>", link));
    }
    if let Some(pub_date) = pub_date {
        xml.push_str(&format!("<pubDate>{}</pubDate>", pub_date));
    }
    if let Some(author) = author {
        xml.push_str(&format!("<author>{}</author>", author));
    }
    xml.push_str("<category>Crypto</category></item>");
    xml
}

/// A complete RSS 2.0 document wrapping `items`.
pub fn rss_document(items: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com/</link>
    <description>Feed used in tests</description>
    {}
  </channel>
</rss>"#,
        items.join("\n    ")
    )
}
