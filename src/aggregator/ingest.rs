use chrono::{DateTime, Utc};

use crate::db::Storage;
use crate::error::{IngestError, StorageError};
use crate::models::{Feed, FeedDocument, NewPost};

/// Parses a `<pubDate>` in RFC 3339 form. Anything else, including the
/// RFC 822 dates many feeds use, yields `None`.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Writes the new entries of a fetched document as posts.
pub struct Ingestor<'a, S: ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> Ingestor<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Stores each entry of `doc` in order and returns how many were new.
    ///
    /// Entries whose URL is already stored for `feed` are skipped. The first
    /// other storage failure stops the run; posts written before it stay.
    pub async fn ingest(
        &self,
        feed: &Feed,
        doc: &FeedDocument,
        now: DateTime<Utc>,
    ) -> Result<usize, IngestError> {
        let mut inserted = 0;

        for entry in &doc.entries {
            let url = entry.post_url(&doc.link);
            let published_at = parse_pub_date(&entry.pub_date);
            if published_at.is_none() && !entry.pub_date.is_empty() {
                tracing::debug!(
                    "Unparseable pubDate {:?} on {}, storing without a date",
                    entry.pub_date,
                    url
                );
            }

            let post = NewPost {
                feed_id: feed.id,
                title: entry.title.clone(),
                url: url.to_string(),
                description: entry.description.clone(),
                published_at,
                created_at: now,
            };

            match self.storage.insert_post_if_absent(post).await {
                Ok(true) => inserted += 1,
                Ok(false) | Err(StorageError::ConstraintViolation(_)) => {
                    tracing::trace!("Post {} already stored for feed {}", url, feed.id);
                }
                Err(source) => {
                    return Err(IngestError::Storage {
                        url: url.to_string(),
                        inserted,
                        source,
                    });
                }
            }
        }

        Ok(inserted)
    }
}
