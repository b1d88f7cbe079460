mod fetcher;
mod rss;

pub use fetcher::{FeedFetcher, FetchFeed};
