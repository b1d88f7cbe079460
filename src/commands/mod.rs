//! Command-line verbs and the table that dispatches them.

mod agg;
mod feeds;
mod users;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::User;

pub use agg::Aggregate;
pub use feeds::{AddFeed, Browse, Follow, Following, ListFeeds, Unfollow};
pub use users::{ListUsers, Login, Register, Reset};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Splits `gator <name> [args...]` style arguments, program name excluded.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Option<Self> {
        let mut args = args.into_iter();
        let name = args.next()?;
        Some(Self {
            name,
            args: args.collect(),
        })
    }
}

pub struct AppState {
    pub config: Config,
    pub repository: Repository,
}

impl AppState {
    /// The user named in the config, if it still exists.
    pub async fn current_user(&self) -> Result<User> {
        let name = self
            .config
            .current_user_name
            .as_deref()
            .ok_or(AppError::NotLoggedIn)?;
        self.repository
            .get_user(name)
            .await?
            .ok_or(AppError::NotLoggedIn)
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, state: &mut AppState, args: &[String]) -> Result<()>;
}

/// A handler that acts on behalf of the logged-in user.
#[async_trait]
pub trait UserHandler: Send + Sync {
    async fn handle(&self, state: &mut AppState, args: &[String], user: User) -> Result<()>;
}

pub struct RequireLogin<H> {
    inner: H,
}

#[async_trait]
impl<H: UserHandler> Handler for RequireLogin<H> {
    async fn handle(&self, state: &mut AppState, args: &[String]) -> Result<()> {
        let user = state.current_user().await?;
        self.inner.handle(state, args, user).await
    }
}

/// Wraps `handler` so it only runs with a resolved current user.
pub fn require_login<H: UserHandler>(handler: H) -> RequireLogin<H> {
    RequireLogin { inner: handler }
}

/// Verb table, fixed once built.
pub struct Router {
    handlers: BTreeMap<&'static str, Box<dyn Handler>>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder {
            handlers: BTreeMap::new(),
        }
    }

    pub fn verbs(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    pub async fn run(&self, state: &mut AppState, cmd: &Command) -> Result<()> {
        let handler = self
            .handlers
            .get(cmd.name.as_str())
            .ok_or_else(|| AppError::UnknownCommand(cmd.name.clone()))?;
        tracing::debug!("Running command {} {:?}", cmd.name, cmd.args);
        handler.handle(state, &cmd.args).await
    }
}

impl Default for Router {
    fn default() -> Self {
        Router::builder()
            .route("login", Login)
            .route("register", Register)
            .route("reset", Reset)
            .route("users", ListUsers)
            .route("agg", Aggregate)
            .route("addfeed", require_login(AddFeed))
            .route("feeds", ListFeeds)
            .route("follow", require_login(Follow))
            .route("following", require_login(Following))
            .route("unfollow", require_login(Unfollow))
            .route("browse", require_login(Browse))
            .build()
    }
}

pub struct RouterBuilder {
    handlers: BTreeMap<&'static str, Box<dyn Handler>>,
}

impl RouterBuilder {
    pub fn route<H: Handler + 'static>(mut self, verb: &'static str, handler: H) -> Self {
        self.handlers.insert(verb, Box::new(handler));
        self
    }

    pub fn build(self) -> Router {
        Router {
            handlers: self.handlers,
        }
    }
}

fn arg<'a>(args: &'a [String], idx: usize, usage: &'static str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or(AppError::Usage(usage))
}

#[cfg(test)]
pub(crate) mod test_support {
    use tempfile::TempDir;

    use super::*;

    /// State backed by an in-memory database and a throwaway config file.
    pub async fn state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        config.db_path = ":memory:".to_string();
        let repository = Repository::new(&config.db_path).await.unwrap();
        (AppState { config, repository }, dir)
    }

    pub fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }
}
