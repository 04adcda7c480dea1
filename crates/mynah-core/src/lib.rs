//! # Mynah Core
//!
//! Pure primitives for the mynah bridge: domain records, identifier
//! generation, and the guid dedup hash.
//!
//! This crate contains no I/O and no SQL. It is plain data plus a little
//! shared-state computation, consumed by the store and by the bridge's
//! outer components.
//!
//! ## Key Types
//!
//! - [`Account`] - A built-in bot account or one mirrored feed
//! - [`FollowerInfo`] - A remote follower of a local account
//! - [`FeedPost`] - One ingested feed entry, the idempotency record
//! - [`QueueItem`] - One pending outbound delivery
//! - [`IdSequence`] - Process-wide unique, strictly increasing status ids

pub mod ids;
pub mod types;

pub use ids::{guid_hash, IdSequence};
pub use types::{Account, FeedPost, FollowerInfo, NewAccount, NewQueueItem, QueueItem, Toot};
