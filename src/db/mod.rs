//! Database layer
//!
//! SQLite storage for the devcamp API:
//! - `Database`: the connection handle, opened at startup and closed at shutdown
//! - `migrations`: embedded schema migrations
//! - `finder`: executes parsed list queries against a collection schema
//! - `error`: unique-index collisions surfaced as `DuplicateRecord`
//! - `repositories`: per-entity data access
//!
//! # Usage
//!
//! ```ignore
//! use devcamp::config::DatabaseConfig;
//! use devcamp::db::{Database, migrations};
//!
//! let db = Database::connect(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&db).await?;
//! db.ping().await?;
//! db.close().await;
//! ```

pub mod error;
pub mod finder;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use error::DuplicateRecord;
pub use finder::{find_page, FoundPage};
pub use pool::{create_test_pool, Database};
