mod document;
mod feed;
mod post;
mod user;

pub use document::{FeedDocument, FeedEntry};
pub use feed::{Feed, FeedFollow, FeedWithOwner, NewFeed};
pub use post::{NewPost, Post};
pub use user::User;
