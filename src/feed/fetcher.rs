use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::Config;
use crate::error::{AppError, FetchError, Result};
use crate::models::FeedDocument;

use super::rss::parse_document;

/// Retrieves and decodes one feed. Implementations do not retry; a failed
/// feed is simply tried again on its next scheduling turn.
#[async_trait]
pub trait FetchFeed: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<FeedDocument, FetchError>;
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_timeouts(
            config.request_timeout(),
            config.connect_timeout(),
            &config.user_agent,
        )
    }

    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FetchFeed for FeedFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FeedDocument, FetchError> {
        let network = |source| FetchError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(network)?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let bytes = response.bytes().await.map_err(network)?;
        let body = std::str::from_utf8(&bytes).map_err(|e| FetchError::Parse {
            url: url.to_string(),
            reason: format!("body is not UTF-8: {e}"),
        })?;

        let doc = parse_document(body).map_err(|reason| FetchError::Parse {
            url: url.to_string(),
            reason,
        })?;

        tracing::debug!("Fetched {} entries from {}", doc.entries.len(), url);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves `response` verbatim to every connection, after `delay`.
    async fn serve(response: String, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let response = response.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/rss")
    }

    fn http(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/rss+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn fetcher(timeout: Duration) -> FeedFetcher {
        FeedFetcher::with_timeouts(timeout, Duration::from_secs(2), "gator-test").unwrap()
    }

    #[tokio::test]
    async fn fetches_and_parses_a_feed() {
        let body = "<rss><channel><title>T</title><link>https://ex.com</link>\
                    <item><title>A &amp;amp; B</title><link>https://ex.com/1</link></item>\
                    </channel></rss>";
        let url = serve(http("200 OK", body), Duration::ZERO).await;

        let doc = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap();
        assert_eq!(doc.title, "T");
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries[0].title, "A & B");
    }

    #[tokio::test]
    async fn fetches_a_wordpress_style_feed() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:atom="http://www.w3.org/2005/Atom" xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel>
  <title>Boot.dev Blog</title>
  <atom:link href="https://blog.boot.dev/index.xml" rel="self" type="application/rss+xml" />
  <link>https://blog.boot.dev/</link>
  <description>Learn backend development</description>
  <language>en-us</language>
  <image>
    <url>https://blog.boot.dev/logo.png</url>
    <title>Boot.dev Blog</title>
    <link>https://blog.boot.dev/</link>
  </image>
  <item>
    <title>Why Go &#038; Rust?</title>
    <link>https://blog.boot.dev/go-rust/</link>
    <dc:creator><![CDATA[Lane]]></dc:creator>
    <pubDate>2024-03-01T10:00:00Z</pubDate>
    <guid isPermaLink="false">https://blog.boot.dev/?p=42</guid>
    <description><![CDATA[Two languages compared]]></description>
    <content:encoded><![CDATA[<p>Two languages, compared at length.</p>]]></content:encoded>
  </item>
  <item>
    <title>Queues</title>
    <link>https://blog.boot.dev/queues/</link>
    <pubDate>Fri, 01 Mar 2024 10:00:00 +0000</pubDate>
    <content:encoded><![CDATA[<p>FIFO</p>]]></content:encoded>
  </item>
</channel>
</rss>"#;
        let url = serve(http("200 OK", body), Duration::ZERO).await;

        let doc = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap();
        assert_eq!(doc.title, "Boot.dev Blog");
        assert_eq!(doc.link, "https://blog.boot.dev/");
        assert_eq!(doc.entries.len(), 2);
        assert_eq!(doc.entries[0].title, "Why Go & Rust?");
        assert_eq!(doc.entries[0].link, "https://blog.boot.dev/go-rust/");
        assert_eq!(doc.entries[0].description, "Two languages compared");
        assert_eq!(doc.entries[0].guid.as_deref(), Some("https://blog.boot.dev/?p=42"));
        assert_eq!(doc.entries[1].description, "");
        assert_eq!(doc.entries[1].pub_date, "Fri, 01 Mar 2024 10:00:00 +0000");
    }

    #[tokio::test]
    async fn non_success_status_is_a_network_error() {
        let url = serve(http("404 Not Found", "gone"), Duration::ZERO).await;

        let err = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap_err();
        assert!(err.is_network());
        assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 404));
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let url = serve(http("200 OK", "<html>nope</html>"), Duration::ZERO).await;

        let err = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }

    #[tokio::test]
    async fn slow_server_hits_the_request_timeout() {
        let url = serve(http("200 OK", "<rss/>"), Duration::from_secs(5)).await;

        let err = fetcher(Duration::from_millis(200))
            .fetch(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network { ref source, .. } if source.is_timeout()));
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher(Duration::from_secs(2))
            .fetch(&format!("http://{addr}/rss"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
    }
}
