mod repository;
mod schema;
mod storage;

pub use repository::Repository;
pub use storage::Storage;

#[cfg(test)]
pub use storage::testing;
