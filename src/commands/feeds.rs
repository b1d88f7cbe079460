use async_trait::async_trait;

use crate::error::{AppError, Result, StorageError};
use crate::models::{Feed, NewFeed, Post, User};

use super::{arg, AppState, Handler, UserHandler};

async fn feed_by_url(state: &AppState, url: &str) -> Result<Feed> {
    state
        .repository
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No feed with URL {url}, add it with addfeed")))
}

async fn follow_feed(state: &AppState, user: &User, feed: &Feed) -> Result<()> {
    match state.repository.create_feed_follow(user.id, feed.id).await {
        Ok(follow) => {
            println!("{} now follows {}", follow.user_name, follow.feed_name);
            Ok(())
        }
        Err(StorageError::ConstraintViolation(_)) => Err(AppError::Other(format!(
            "{} already follows {}",
            user.name, feed.name
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Adds a feed to the catalog and follows it.
pub struct AddFeed;

#[async_trait]
impl UserHandler for AddFeed {
    async fn handle(&self, state: &mut AppState, args: &[String], user: User) -> Result<()> {
        const USAGE: &str = "addfeed <name> <url>";
        let name = arg(args, 0, USAGE)?;
        let url = arg(args, 1, USAGE)?;

        let feed = match state
            .repository
            .add_feed(NewFeed {
                name: name.to_string(),
                url: url.to_string(),
                user_id: user.id,
            })
            .await
        {
            Ok(feed) => feed,
            Err(StorageError::ConstraintViolation(_)) => {
                return Err(AppError::Other(format!("A feed with URL {url} already exists")));
            }
            Err(e) => return Err(e.into()),
        };

        println!("Created feed {} ({}) with id {}", feed.name, feed.url, feed.id);
        follow_feed(state, &user, &feed).await
    }
}

pub struct ListFeeds;

#[async_trait]
impl Handler for ListFeeds {
    async fn handle(&self, state: &mut AppState, _args: &[String]) -> Result<()> {
        for feed in state.repository.list_feeds().await? {
            println!("Feed: {}\n   URL: {}\n   Added by: {}", feed.name, feed.url, feed.user_name);
        }
        Ok(())
    }
}

pub struct Follow;

#[async_trait]
impl UserHandler for Follow {
    async fn handle(&self, state: &mut AppState, args: &[String], user: User) -> Result<()> {
        let url = arg(args, 0, "follow <url>")?;
        let feed = feed_by_url(state, url).await?;
        follow_feed(state, &user, &feed).await
    }
}

pub struct Following;

#[async_trait]
impl UserHandler for Following {
    async fn handle(&self, state: &mut AppState, _args: &[String], user: User) -> Result<()> {
        println!("Feeds followed by {}:", user.name);
        for follow in state.repository.feed_follows_for_user(user.id).await? {
            println!("* {} ({})", follow.feed_name, follow.feed_url);
        }
        Ok(())
    }
}

pub struct Unfollow;

#[async_trait]
impl UserHandler for Unfollow {
    async fn handle(&self, state: &mut AppState, args: &[String], user: User) -> Result<()> {
        let url = arg(args, 0, "unfollow <url>")?;
        let feed = feed_by_url(state, url).await?;

        if !state.repository.unfollow(user.id, feed.id).await? {
            return Err(AppError::Other(format!(
                "{} does not follow {}",
                user.name, feed.name
            )));
        }
        println!("Unfollowed {}", feed.name);
        Ok(())
    }
}

/// Shows the newest posts from followed feeds. An unparseable limit falls
/// back to the configured default.
pub struct Browse;

impl Browse {
    async fn posts(&self, state: &AppState, args: &[String], user: &User) -> Result<Vec<Post>> {
        let limit = args
            .first()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(state.config.browse_limit);

        Ok(state.repository.posts_for_user(user.id, limit).await?)
    }
}

#[async_trait]
impl UserHandler for Browse {
    async fn handle(&self, state: &mut AppState, args: &[String], user: User) -> Result<()> {
        for post in self.posts(state, args, &user).await? {
            let published = post
                .published_at
                .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!(
                "{}\n   Published: {}\n   URL: {}\n   {}",
                post.title, published, post.url, post.description
            );
        }
        Ok(())
    }
}
