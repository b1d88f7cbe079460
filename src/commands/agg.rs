use async_trait::async_trait;
use futures::FutureExt;

use crate::aggregator::Scheduler;
use crate::config::parse_interval;
use crate::error::Result;
use crate::feed::FeedFetcher;

use super::{arg, AppState, Handler};

/// `agg <interval>`: polls feeds until Ctrl-C.
pub struct Aggregate;

#[async_trait]
impl Handler for Aggregate {
    async fn handle(&self, state: &mut AppState, args: &[String]) -> Result<()> {
        let interval = parse_interval(arg(args, 0, "agg <interval>, e.g. agg 1m")?)?;
        let fetcher = FeedFetcher::new(&state.config)?;

        println!("Collecting feeds every {interval:?}, press Ctrl-C to stop");
        let shutdown = tokio::signal::ctrl_c().map(|res| {
            if let Err(e) = res {
                tracing::error!("Could not listen for Ctrl-C: {}", e);
            }
        });

        Scheduler::new(state.repository.clone(), fetcher)
            .run(interval, shutdown)
            .await?;
        Ok(())
    }
}
