mod auth;
mod cache;
mod catalog;
pub mod schema;

pub use auth::CLIENT_TOKEN_KEY;
pub use auth::TokenStore;
pub use cache::{Budget, MemoryCache, SharedCache, SqliteCache};
pub use catalog::{Catalog, SqliteCatalog};
