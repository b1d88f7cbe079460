use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::db::Storage;
use crate::error::{AppError, CycleError, StorageError};
use crate::feed::FetchFeed;

use super::{Clock, Ingestor, SystemClock};

/// Outcome of one completed fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub feed_id: i64,
    pub feed_url: String,
    pub entries: usize,
    pub inserted: usize,
}

/// Polls feeds one at a time, oldest-fetched first.
///
/// Cycles never overlap: a slow cycle delays the next tick instead of
/// queueing another one.
pub struct Scheduler<S, F, C = SystemClock> {
    storage: S,
    fetcher: F,
    clock: C,
}

impl<S: Storage, F: FetchFeed> Scheduler<S, F> {
    pub fn new(storage: S, fetcher: F) -> Self {
        Self::with_clock(storage, fetcher, SystemClock)
    }
}

impl<S: Storage, F: FetchFeed, C: Clock> Scheduler<S, F, C> {
    pub fn with_clock(storage: S, fetcher: F, clock: C) -> Self {
        Self {
            storage,
            fetcher,
            clock,
        }
    }

    /// Selects the next feed, marks it fetched, fetches it and stores its
    /// new entries.
    ///
    /// The feed is marked before the network call so that a feed which
    /// always fails still gives way to the others. The price is that a
    /// failed fetch is not retried until its turn comes round again.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let feed = match self.storage.next_feed_to_fetch().await {
            Ok(feed) => feed,
            Err(StorageError::NotFound(_)) => return Err(CycleError::NoFeeds),
            Err(e) => return Err(CycleError::Select(e)),
        };

        self.storage
            .mark_fetched(feed.id, self.clock.now())
            .await
            .map_err(|source| CycleError::MarkFetched {
                url: feed.url.clone(),
                source,
            })?;

        tracing::info!("Fetching feed {} ({}) from {}", feed.id, feed.name, feed.url);
        let doc = self.fetcher.fetch(&feed.url).await?;

        let inserted = Ingestor::new(&self.storage)
            .ingest(&feed, &doc, self.clock.now())
            .await
            .map_err(|source| CycleError::Ingest {
                url: feed.url.clone(),
                source,
            })?;

        Ok(CycleReport {
            feed_id: feed.id,
            feed_url: feed.url,
            entries: doc.entries.len(),
            inserted,
        })
    }

    /// Runs one cycle per tick, the first immediately, until `shutdown`
    /// resolves. Cycle failures are logged and never end the loop.
    ///
    /// `shutdown` is only checked between cycles, so a cycle in progress
    /// always runs to completion or to its own failure.
    pub async fn run<Fut>(&self, interval: Duration, shutdown: Fut) -> Result<usize, AppError>
    where
        Fut: Future<Output = ()>,
    {
        if interval.is_zero() {
            return Err(AppError::Config("interval must be positive".to_string()));
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut cycles = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            match self.run_cycle().await {
                Ok(report) => tracing::info!(
                    "Collected {} new post(s) from {} ({} entries)",
                    report.inserted,
                    report.feed_url,
                    report.entries
                ),
                Err(CycleError::NoFeeds) => {
                    tracing::warn!("No feeds to fetch yet, add one with `gator addfeed`")
                }
                Err(CycleError::Fetch(e)) if e.is_network() => {
                    tracing::warn!("Feed unreachable, will retry on its next turn: {}", e)
                }
                Err(e) => tracing::error!("Fetch cycle failed: {}", e),
            }
            cycles += 1;
        }

        tracing::info!("Aggregator stopped after {} cycle(s)", cycles);
        Ok(cycles)
    }
}
