//! HTTP feed fetcher.
//!
//! Downloads a feed body with connect/read/total timeouts, a redirect cap
//! and a body size limit, then decodes it using the declared charset. No
//! retries are attempted.

use std::future::Future;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::describe_error_chain;
use crate::{IngestError, Result};

/// Something that can produce the raw text of a feed.
///
/// The HTTP implementation is [`HttpFetcher`]; tests substitute canned
/// sources.
pub trait FeedSource {
    /// Fetch the document at `url` and return its body as text.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Feed fetcher backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_feed_size: u64,
}

impl HttpFetcher {
    /// Create a fetcher from the feed settings.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| IngestError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    fn too_large(&self, size: u64) -> IngestError {
        IngestError::Fetch(format!(
            "feed too large: {} bytes (max {} bytes)",
            size, self.max_feed_size
        ))
    }
}

impl FeedSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        validate_url(url)?;
        info!("Fetching feed from {}", url);

        let mut response = self.client.get(url).send().await.map_err(|e| {
            IngestError::Fetch(format!("failed to fetch feed: {}", describe_error_chain(&e)))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Fetch(format!("HTTP error: {}", status)));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(self.too_large(content_length));
            }
        }

        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(charset_param)
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            IngestError::Fetch(format!(
                "failed to read response: {}",
                describe_error_chain(&e)
            ))
        })? {
            if (bytes.len() + chunk.len()) as u64 > self.max_feed_size {
                return Err(self.too_large((bytes.len() + chunk.len()) as u64));
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!("Received {} bytes from {}", bytes.len(), url);
        Ok(decode_body(&bytes, charset.as_deref()))
    }
}

/// Extract the `charset` parameter from a `Content-Type` value.
fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
            .filter(|value| !value.is_empty())
    })
}

/// Decode a response body.
///
/// A byte order mark wins, then the declared charset. Unknown or missing
/// charsets decode as UTF-8. Invalid sequences become U+FFFD.
fn decode_body(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| {
            let encoding = Encoding::for_label(label.as_bytes());
            if encoding.is_none() {
                warn!("Unknown charset {:?}, decoding as UTF-8", label);
            }
            encoding
        })
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!("Feed body is not valid {}; invalid bytes replaced", used.name());
    }
    text.into_owned()
}

/// Check that a feed URL is absolute, uses http or https, and names a host.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| IngestError::Fetch(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(IngestError::Fetch(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    if parsed.host().is_none() {
        return Err(IngestError::Fetch("URL has no host".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0"?><rss version="2.0"><channel><item><title>Hello</title></item></channel></rss>"#;

    async fn spawn_server() -> String {
        let app = Router::new()
            .route(
                "/feed",
                get(|| async { ([(header::CONTENT_TYPE, "application/rss+xml")], SAMPLE_RSS) }),
            )
            .route(
                "/missing",
                get(|| async { (StatusCode::NOT_FOUND, "not found") }),
            )
            .route("/big", get(|| async { "x".repeat(4096) }))
            .route(
                "/bom",
                get(|| async {
                    let mut body = b"\xEF\xBB\xBF".to_vec();
                    body.extend_from_slice(SAMPLE_RSS.as_bytes());
                    body
                }),
            )
            .route(
                "/latin1",
                get(|| async {
                    (
                        [(header::CONTENT_TYPE, "application/rss+xml; charset=iso-8859-1")],
                        b"<rss><channel><item><title>Caf\xE9 news</title></item></channel></rss>"
                            .to_vec(),
                    )
                }),
            )
            .route(
                "/unlabeled",
                get(|| async { b"<rss>caf\xE9</rss>".to_vec() }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FeedConfig::default()).unwrap()
    }

    #[test]
    fn test_validate_url_valid() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/feed").is_ok());
        assert!(validate_url("http://localhost/feed").is_ok());
    }

    #[test]
    fn test_validate_url_invalid_scheme() {
        let result = validate_url("ftp://example.com/feed.xml");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unsupported URL scheme"));
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_validate_url_not_absolute() {
        assert!(matches!(
            validate_url("/feed.xml"),
            Err(IngestError::Fetch(_))
        ));
        assert!(validate_url("not a url").is_err());
    }

    /// Serve `chunks` with chunked transfer encoding and no Content-Length.
    async fn spawn_chunked_server(chunks: Vec<Vec<u8>>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/rss+xml\r\nTransfer-Encoding: chunked\r\n\r\n")
                .await
                .unwrap();
            for chunk in chunks {
                let header = format!("{:x}\r\n", chunk.len());
                if socket.write_all(header.as_bytes()).await.is_err()
                    || socket.write_all(&chunk).await.is_err()
                    || socket.write_all(b"\r\n").await.is_err()
                {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_charset_param() {
        assert_eq!(
            charset_param("application/rss+xml; charset=ISO-8859-1"),
            Some("ISO-8859-1")
        );
        assert_eq!(charset_param("text/xml;Charset=\"utf-8\""), Some("utf-8"));
        assert_eq!(charset_param("text/xml; format=flowed"), None);
        assert_eq!(charset_param("text/xml"), None);
        assert_eq!(charset_param("text/xml; charset="), None);
    }

    #[test]
    fn test_decode_body_uses_declared_charset() {
        assert_eq!(decode_body(b"caf\xE9", Some("iso-8859-1")), "café");
        assert_eq!(decode_body(b"\x82\xa0", Some("Shift_JIS")), "あ");
        assert_eq!(decode_body("café".as_bytes(), Some("utf-8")), "café");
    }

    #[test]
    fn test_decode_body_without_charset() {
        assert_eq!(decode_body(b"\xEF\xBB\xBF<rss/>", None), "<rss/>");
        assert_eq!(decode_body("café".as_bytes(), None), "café");
        assert_eq!(decode_body(b"caf\xE9", None), "caf\u{FFFD}");
        assert_eq!(decode_body(b"caf\xE9", Some("no-such-charset")), "caf\u{FFFD}");
    }

    #[test]
    fn test_decode_body_bom_overrides_declared_charset() {
        assert_eq!(
            decode_body("\u{feff}café".as_bytes(), Some("iso-8859-1")),
            "café"
        );
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let base = spawn_server().await;
        let body = fetcher().fetch(&format!("{}/feed", base)).await.unwrap();
        assert_eq!(body, SAMPLE_RSS);
    }

    #[tokio::test]
    async fn test_fetch_http_error_status() {
        let base = spawn_server().await;
        let err = fetcher()
            .fetch(&format!("{}/missing", base))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Fetch(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let base = spawn_server().await;
        let config = FeedConfig {
            max_feed_size_bytes: 1024,
            ..FeedConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher.fetch(&format!("{}/big", base)).await.unwrap_err();
        assert!(err.to_string().contains("feed too large"));
    }

    #[tokio::test]
    async fn test_fetch_strips_bom() {
        let base = spawn_server().await;
        let body = fetcher().fetch(&format!("{}/bom", base)).await.unwrap();
        assert!(body.starts_with("<?xml"));
    }

    #[tokio::test]
    async fn test_fetch_decodes_declared_latin1() {
        let base = spawn_server().await;
        let body = fetcher().fetch(&format!("{}/latin1", base)).await.unwrap();
        let items = crate::rss::parse_feed(&body);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Café news");
    }

    #[tokio::test]
    async fn test_fetch_unlabeled_body_is_read_as_utf8() {
        let base = spawn_server().await;
        let body = fetcher()
            .fetch(&format!("{}/unlabeled", base))
            .await
            .unwrap();
        assert_eq!(body, "<rss>caf\u{FFFD}</rss>");
    }

    #[tokio::test]
    async fn test_fetch_chunked_body_within_limit() {
        let base =
            spawn_chunked_server(vec![b"<rss><channel>".to_vec(), b"</channel></rss>".to_vec()])
                .await;
        let body = fetcher().fetch(&format!("{}/feed", base)).await.unwrap();
        assert_eq!(body, "<rss><channel></channel></rss>");
    }

    #[tokio::test]
    async fn test_fetch_chunked_body_over_limit_is_rejected() {
        let base = spawn_chunked_server(vec![vec![b'x'; 600]; 4]).await;
        let config = FeedConfig {
            max_feed_size_bytes: 1024,
            ..FeedConfig::default()
        };
        let err = HttpFetcher::new(&config)
            .unwrap()
            .fetch(&format!("{}/feed", base))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Fetch(_)));
        assert!(err.to_string().contains("feed too large"), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher()
            .fetch(&format!("http://{}/feed", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_makes_no_request() {
        let err = fetcher().fetch("gopher://example.com/").await.unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }
}
