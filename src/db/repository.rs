use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{is_unique_violation, StorageError};
use crate::models::{Feed, FeedFollow, FeedWithOwner, NewFeed, NewPost, Post, User};

use super::schema::SCHEMA;

type DbResult<T> = std::result::Result<T, StorageError>;

const FEED_COLUMNS: &str =
    "id, name, url, user_id, last_fetched_at, created_at, updated_at";

#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> DbResult<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // User operations

    pub async fn create_user(&self, name: &str) -> DbResult<User> {
        let name = name.to_string();
        let now = to_db_time(Utc::now());
        let user = self
            .conn
            .call(move |conn| {
                let user = conn.query_row(
                    "INSERT INTO users (name, created_at, updated_at) VALUES (?1, ?2, ?2)
                     RETURNING id, name, created_at, updated_at",
                    params![name, now],
                    user_from_row,
                )?;
                Ok(user)
            })
            .await?;
        Ok(user)
    }

    pub async fn get_user(&self, name: &str) -> DbResult<Option<User>> {
        let name = name.to_string();
        let user = self
            .conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        "SELECT id, name, created_at, updated_at FROM users WHERE name = ?1",
                        params![name],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> DbResult<Vec<String>> {
        let names = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM users ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await?;
        Ok(names)
    }

    /// Removes every user; feeds, follows and posts go with them.
    pub async fn delete_users(&self) -> DbResult<usize> {
        let deleted = self
            .conn
            .call(|conn| Ok(conn.execute("DELETE FROM users", [])?))
            .await?;
        Ok(deleted)
    }

    // Feed operations

    pub async fn add_feed(&self, feed: NewFeed) -> DbResult<Feed> {
        let now = to_db_time(Utc::now());
        let feed = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "INSERT INTO feeds (name, url, user_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     RETURNING {FEED_COLUMNS}"
                );
                let feed = conn.query_row(
                    &sql,
                    params![feed.name, feed.url, feed.user_id, now],
                    feed_from_row,
                )?;
                Ok(feed)
            })
            .await?;
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> DbResult<Option<Feed>> {
        let url = url.to_string();
        let feed = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?1");
                let feed = conn
                    .query_row(&sql, params![url], feed_from_row)
                    .optional()?;
                Ok(feed)
            })
            .await?;
        Ok(feed)
    }

    pub async fn list_feeds(&self) -> DbResult<Vec<FeedWithOwner>> {
        let feeds = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT f.name, f.url, u.name FROM feeds f
                     JOIN users u ON u.id = f.user_id
                     ORDER BY f.name, f.id",
                )?;
                let feeds = stmt
                    .query_map([], |row| {
                        Ok(FeedWithOwner {
                            name: row.get(0)?,
                            url: row.get(1)?,
                            user_name: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    /// The feed with the oldest `last_fetched_at`; never-fetched feeds come
    /// first and ties go to the lowest id.
    pub async fn next_feed_to_fetch(&self) -> DbResult<Feed> {
        let feed = self
            .conn
            .call(|conn| {
                let sql = format!(
                    "SELECT {FEED_COLUMNS} FROM feeds
                     ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
                     LIMIT 1"
                );
                let feed = conn.query_row(&sql, [], feed_from_row).optional()?;
                Ok(feed)
            })
            .await?;
        feed.ok_or_else(|| StorageError::NotFound("feed".to_string()))
    }

    /// Sets `last_fetched_at` to `at` unless it already holds a later time.
    pub async fn mark_fetched(&self, feed_id: i64, at: DateTime<Utc>) -> DbResult<()> {
        let at = to_db_time(at);
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE feeds SET
                         last_fetched_at = CASE
                             WHEN last_fetched_at IS NULL OR last_fetched_at < ?1 THEN ?1
                             ELSE last_fetched_at
                         END,
                         updated_at = ?1
                     WHERE id = ?2",
                    params![at, feed_id],
                )?;
                Ok(changed)
            })
            .await?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("feed {feed_id}")));
        }
        Ok(())
    }

    // Follow operations

    pub async fn create_feed_follow(&self, user_id: i64, feed_id: i64) -> DbResult<FeedFollow> {
        let now = to_db_time(Utc::now());
        let follow = self
            .conn
            .call(move |conn| {
                let id = conn.query_row(
                    "INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)
                     RETURNING id",
                    params![user_id, feed_id, now],
                    |row| row.get::<_, i64>(0),
                )?;
                let follow = conn.query_row(
                    "SELECT ff.id, ff.user_id, ff.feed_id, u.name, f.name, f.url
                     FROM feed_follows ff
                     JOIN users u ON u.id = ff.user_id
                     JOIN feeds f ON f.id = ff.feed_id
                     WHERE ff.id = ?1",
                    params![id],
                    follow_from_row,
                )?;
                Ok(follow)
            })
            .await?;
        Ok(follow)
    }

    pub async fn feed_follows_for_user(&self, user_id: i64) -> DbResult<Vec<FeedFollow>> {
        let follows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT ff.id, ff.user_id, ff.feed_id, u.name, f.name, f.url
                     FROM feed_follows ff
                     JOIN users u ON u.id = ff.user_id
                     JOIN feeds f ON f.id = ff.feed_id
                     WHERE ff.user_id = ?1
                     ORDER BY f.name, f.id",
                )?;
                let follows = stmt
                    .query_map(params![user_id], follow_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(follows)
            })
            .await?;
        Ok(follows)
    }

    /// Returns whether a follow existed.
    pub async fn unfollow(&self, user_id: i64, feed_id: i64) -> DbResult<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM feed_follows WHERE user_id = ?1 AND feed_id = ?2",
                    params![user_id, feed_id],
                )?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted > 0)
    }

    // Post operations

    /// Inserts `post` unless (feed_id, url) is already stored. Returns
    /// whether a row was written.
    pub async fn insert_post_if_absent(&self, post: NewPost) -> DbResult<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let created_at = to_db_time(post.created_at);
                let result = conn.execute(
                    r#"INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"#,
                    params![
                        post.feed_id,
                        post.title,
                        post.url,
                        post.description,
                        post.published_at.map(to_db_time),
                        created_at,
                    ],
                );
                match result {
                    Ok(_) => Ok(true),
                    Err(e) if is_unique_violation(&e) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        Ok(inserted)
    }

    /// Newest posts across the feeds `user_id` follows.
    pub async fn posts_for_user(&self, user_id: i64, limit: u32) -> DbResult<Vec<Post>> {
        let posts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT p.id, p.feed_id, p.title, p.url, p.description,
                              p.published_at, p.created_at, p.updated_at
                       FROM posts p
                       JOIN feed_follows ff ON ff.feed_id = p.feed_id
                       WHERE ff.user_id = ?1
                       ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC, p.id DESC
                       LIMIT ?2"#,
                )?;
                let posts = stmt
                    .query_map(params![user_id, limit], post_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(posts)
            })
            .await?;
        Ok(posts)
    }
}

/// Fixed-width UTC form, so text comparison in SQL matches time order.
fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format, for rows written by hand
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn required_datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp '{raw}'").into(),
        )
    })
}

fn optional_datetime(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| parse_datetime(&s)))
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: required_datetime(row, 2)?,
        updated_at: required_datetime(row, 3)?,
    })
}

fn feed_from_row(row: &Row) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        user_id: row.get(3)?,
        last_fetched_at: optional_datetime(row, 4)?,
        created_at: required_datetime(row, 5)?,
        updated_at: required_datetime(row, 6)?,
    })
}

fn follow_from_row(row: &Row) -> rusqlite::Result<FeedFollow> {
    Ok(FeedFollow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        feed_id: row.get(2)?,
        user_name: row.get(3)?,
        feed_name: row.get(4)?,
        feed_url: row.get(5)?,
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        description: row.get(4)?,
        published_at: optional_datetime(row, 5)?,
        created_at: required_datetime(row, 6)?,
        updated_at: required_datetime(row, 7)?,
    })
}
