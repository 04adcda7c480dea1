//! # Mynah Store
//!
//! Storage layer for the Mynah feed bridge. Provides a trait-based interface
//! for bridge persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts bridge storage behind the [`Repo`] trait,
//! allowing the rest of the bridge to be storage-agnostic. The primary
//! implementation is [`SqliteRepo`], with [`MemoryRepo`] for testing.
//!
//! ## Key Types
//!
//! - [`Repo`] - The async trait for all storage operations
//! - [`SqliteRepo`] - SQLite-based persistent storage
//! - [`MemoryRepo`] - In-memory storage for tests
//! - [`AccountUpsert`] - Result of the create-account-unless-taken operation
//! - [`InsertResult`] - Result of recording a feed post
//! - [`StoreConfig`] - Database location plus built-in accounts to seed
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mynah_store::{Repo, SqliteRepo, StoreConfig};
//!
//! async fn example() {
//!     // Open (and migrate) the bridge database
//!     let config = StoreConfig::new("mynah.db");
//!     let repo = SqliteRepo::open(&config).unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let repo = SqliteRepo::open_memory(&[]).unwrap();
//!
//!     // Look up a mirrored account
//!     let _account = repo.get_account("blog.example.com").await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Race-free account creation**: duplicate handles are detected through
//!   the unique constraint's error code, never by probing first
//! - **Two content logs**: feed posts are deduplicated per account, the toot
//!   history is append-only
//! - **At-least-once delivery**: queue ids grow monotonically and draining
//!   pages by id cursor, so redelivery after a crash is possible but loss
//!   is not
//! - **Atomic scheduler claim**: claiming a due account reschedules it in
//!   the same statement, so concurrent schedulers never double-claim

pub mod config;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use config::{BootstrapAccount, StoreConfig};
pub use error::{Result, StoreError};
pub use memory::MemoryRepo;
pub use sqlite::SqliteRepo;
pub use traits::{AccountUpsert, InsertResult, Repo, RepoExt};
