//! # Mynah Testkit
//!
//! Testing utilities for the Mynah feed bridge.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Helper structs and canned records for setting up test scenarios
//! - **Generators**: Proptest strategies for property-based testing
//! - **Cross-backend drivers**: Helpers to run the same assertions against the
//!   SQLite and in-memory repos
//!
//! ## Test Fixtures
//!
//! Quickly build realistic records:
//!
//! ```rust
//! use mynah_testkit::fixtures::make_account;
//!
//! let account = make_account("blog.example.com");
//! assert_eq!(account.handle, "blog.example.com");
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use mynah_core::guid_hash;
//! use mynah_testkit::generators::guid;
//!
//! proptest! {
//!     #[test]
//!     fn guid_hash_is_deterministic(guid in guid()) {
//!         prop_assert_eq!(guid_hash(&guid), guid_hash(&guid));
//!     }
//! }
//! ```
//!
//! ## Cross-Backend Tests
//!
//! Both storage backends share one contract, so most tests run against each:
//!
//! ```rust
//! use mynah_store::Repo;
//! use mynah_testkit::both_backends;
//!
//! # async fn example() {
//! for repo in both_backends() {
//!     assert!(!repo.account_exists("nobody").await.unwrap());
//! }
//! # }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{both_backends, init_test_tracing, sample_bootstrap, TestFixture};
