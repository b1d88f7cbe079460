use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::models::{Feed, NewPost};

use super::Repository;

/// What the aggregator needs from persistence. Every call re-reads current
/// state, so nothing is cached between fetch cycles.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The feed whose turn it is: never-fetched feeds first, then the oldest
    /// `last_fetched_at`, ties broken by id. `NotFound` when there are none.
    async fn next_feed_to_fetch(&self) -> Result<Feed, StorageError>;

    async fn mark_fetched(&self, feed_id: i64, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// `Ok(false)` when (feed_id, url) is already stored.
    async fn insert_post_if_absent(&self, post: NewPost) -> Result<bool, StorageError>;
}

#[async_trait]
impl Storage for Repository {
    async fn next_feed_to_fetch(&self) -> Result<Feed, StorageError> {
        Repository::next_feed_to_fetch(self).await
    }

    async fn mark_fetched(&self, feed_id: i64, at: DateTime<Utc>) -> Result<(), StorageError> {
        Repository::mark_fetched(self, feed_id, at).await
    }

    async fn insert_post_if_absent(&self, post: NewPost) -> Result<bool, StorageError> {
        Repository::insert_post_if_absent(self, post).await
    }
}
