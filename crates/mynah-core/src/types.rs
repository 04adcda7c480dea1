//! Domain records for the mynah bridge.
//!
//! Plain data carriers passed into and returned by the store. All
//! timestamps are Unix milliseconds; status ids are the opaque identifiers
//! issued by [`crate::ids::IdSequence`].

use serde::{Deserialize, Serialize};

/// An account known to the bridge: a built-in bot account or the mirror of
/// one RSS/Atom feed.
///
/// The private key never travels on this struct. Fetch it separately when
/// signing is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned row id.
    pub id: i64,

    /// Creation time, Unix ms.
    pub created_at: i64,

    /// Canonical profile URL.
    pub user_url: String,

    /// Unique handle, e.g. `"blog.example.com"`.
    pub handle: String,

    /// Display name.
    pub name: String,

    /// Profile summary; may contain HTML.
    pub summary: String,

    /// Avatar image URL.
    pub profile_image_url: String,

    /// Human-facing site behind the feed.
    pub site_url: String,

    /// The RSS/Atom document itself.
    pub feed_url: String,

    /// When the source feed last changed, Unix ms. Zero until first poll.
    pub feed_last_updated: i64,

    /// When the source feed should next be polled, Unix ms. Zero until
    /// first poll.
    pub next_check_due: i64,

    /// PEM-encoded public key.
    pub pub_key: String,
}

/// The caller-supplied fields of a new account, before the store assigns
/// an id.
///
/// Scheduling fields start at zero; the feed checker fills them in after
/// the first poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub created_at: i64,
    pub user_url: String,
    pub handle: String,
    pub name: String,
    pub summary: String,
    pub profile_image_url: String,
    pub site_url: String,
    pub feed_url: String,
    pub pub_key: String,
}

/// One remote follower of a local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerInfo {
    /// The follower's profile URL; unique within one account's set.
    pub user_url: String,

    /// The follower's handle on their own server.
    pub handle: String,

    /// The follower's host, e.g. `"mastodon.example"`.
    pub host: String,

    /// Shared inbox URL used to batch deliveries to that host.
    pub shared_inbox: String,
}

/// A locally authored post, as recorded in the append-only history.
///
/// No uniqueness is enforced on this record; the posting path only toots
/// a feed entry once per poll cycle, so dedup lives with [`FeedPost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toot {
    /// Dedup hash of the feed entry this toot was made from.
    pub guid_hash: i64,

    /// Publish time, Unix ms.
    pub tooted_at: i64,

    /// Externally visible status id.
    pub status_id: u64,

    /// Rendered HTML content.
    pub content: String,
}

/// One ingested feed entry. Recording these is what makes re-polling a
/// feed idempotent: (account, guid hash) is unique in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPost {
    /// Dedup hash derived from the entry's guid.
    pub guid_hash: i64,

    /// Publish time claimed by the feed, Unix ms.
    pub post_time: i64,

    /// Entry link.
    pub link: String,

    /// Entry title.
    pub title: String,

    /// Entry description or summary.
    pub description: String,
}

/// One pending outbound delivery, as stored in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Store-assigned id; strictly increasing in insertion order and never
    /// reused, so consumers can resume from the last id they processed.
    pub id: i64,

    /// Handle of the local account the delivery is sent as.
    pub sending_handle: String,

    /// Destination inbox URL.
    pub to_inbox: String,

    /// Publish time of the underlying post, Unix ms.
    pub tooted_at: i64,

    /// Externally visible status id of the underlying post.
    pub status_id: u64,

    /// Rendered content to deliver.
    pub content: String,
}

/// The caller-supplied fields of a queue item, before the store assigns
/// an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQueueItem {
    pub sending_handle: String,
    pub to_inbox: String,
    pub tooted_at: i64,
    pub status_id: u64,
    pub content: String,
}
