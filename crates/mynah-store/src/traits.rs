//! Repo trait: the abstract interface for bridge persistence.
//!
//! The bridge's outer components (feed checker, activity handlers, the
//! delivery worker) stay storage-agnostic through this trait.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use mynah_core::{Account, FeedPost, FollowerInfo, NewAccount, NewQueueItem, QueueItem, Toot};

use crate::error::Result;

/// Result of an insert keyed on a dedup field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Row was inserted.
    Inserted,
    /// An equal dedup key already exists (idempotent - not an error).
    AlreadyExists,
}

impl InsertResult {
    /// True when the insert created a new row.
    pub fn is_new(self) -> bool {
        matches!(self, InsertResult::Inserted)
    }
}

/// Result of the account upsert.
///
/// Either way the caller holds the canonical stored row, so a duplicate
/// insert race is invisible beyond the flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountUpsert {
    /// No account had this handle; a new row was created.
    Inserted(Account),
    /// The handle was already taken; this is the existing row.
    Existing(Account),
}

impl AccountUpsert {
    /// True when the upsert created a new row.
    pub fn is_new(&self) -> bool {
        matches!(self, AccountUpsert::Inserted(_))
    }

    /// The stored account, new or preexisting.
    pub fn account(&self) -> &Account {
        match self {
            AccountUpsert::Inserted(a) | AccountUpsert::Existing(a) => a,
        }
    }

    /// Consume into the stored account.
    pub fn into_account(self) -> Account {
        match self {
            AccountUpsert::Inserted(a) | AccountUpsert::Existing(a) => a,
        }
    }
}

/// The Repo trait: async interface for bridge persistence.
///
/// All storage methods are async; the SQLite backend runs its blocking
/// work on `spawn_blocking` so callers never stall the runtime.
///
/// # Design Notes
///
/// - **Idempotent upserts**: duplicate account handles and duplicate
///   (account, guid hash) feed posts resolve to the existing row instead
///   of failing.
/// - **Absent is not an error**: lookups return `Option`.
/// - **At-most-once claim**: [`claim_account_due`](Repo::claim_account_due)
///   atomically reschedules the account it returns, so concurrent
///   schedulers never pick the same one.
/// - **Cursor drain**: the delivery queue pages by strictly increasing id,
///   letting a consumer resume after a crash.
#[async_trait]
pub trait Repo: Send + Sync {
    /// Next process-wide status id. Strictly increasing, never repeated
    /// within the life of this process.
    fn next_id(&self) -> u64;

    // ─────────────────────────────────────────────────────────────────────────
    // Account Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an account unless its handle is already taken.
    ///
    /// # Returns
    /// - `Inserted(account)` with the assigned id if the handle was free.
    /// - `Existing(account)` with the canonical stored row if not.
    ///
    /// Only a unique violation on the handle is recovered; any other
    /// failure propagates.
    async fn add_account_if_not_exist(
        &self,
        account: &NewAccount,
        priv_key: &str,
    ) -> Result<AccountUpsert>;

    /// Check whether a handle is known.
    async fn account_exists(&self, handle: &str) -> Result<bool>;

    /// Fetch an account by handle.
    async fn get_account(&self, handle: &str) -> Result<Option<Account>>;

    /// Fetch the private key for a handle. `None` when the handle is
    /// unknown; the key string may be empty for accounts this server does
    /// not control.
    async fn get_priv_key(&self, handle: &str) -> Result<Option<String>>;

    /// Unconditionally set the two feed scheduling timestamps.
    async fn update_feed_check_times(
        &self,
        account_id: i64,
        last_updated: i64,
        next_check_due: i64,
    ) -> Result<()>;

    /// When the account's source feed last changed. `None` when the id is
    /// unknown.
    async fn feed_last_updated(&self, account_id: i64) -> Result<Option<i64>>;

    /// Claim one account whose `next_check_due` is strictly earlier than
    /// `due_before`, atomically rescheduling it to `next_check_due`.
    ///
    /// Returns the claimed account with its updated check time, or `None`
    /// when no account is due. Selection among equally due accounts is
    /// arbitrary. Pass a `next_check_due` at or after `due_before`, or the
    /// account stays claimable.
    async fn claim_account_due(
        &self,
        due_before: i64,
        next_check_due: i64,
    ) -> Result<Option<Account>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Follower Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a follower to the account with this handle.
    ///
    /// Unknown handles are [`NoSuchAccount`](crate::StoreError::NoSuchAccount);
    /// re-adding an existing (account, follower URL) pair is a caller
    /// error and surfaces as a database error.
    async fn add_follower(&self, handle: &str, follower: &FollowerInfo) -> Result<()>;

    /// Remove a follower by profile URL. Unknown handles error; removing
    /// an absent follower is a silent no-op.
    async fn remove_follower(&self, handle: &str, follower_user_url: &str) -> Result<()>;

    /// Full follower set for a handle, in storage scan order. Unknown
    /// handles yield an empty list.
    async fn followers(&self, handle: &str) -> Result<Vec<FollowerInfo>>;

    /// Full follower set by account id, in storage scan order.
    async fn followers_by_id(&self, account_id: i64) -> Result<Vec<FollowerInfo>>;

    /// Number of followers for a handle. Unknown handles count zero.
    async fn follower_count(&self, handle: &str) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Content Logs
    // ─────────────────────────────────────────────────────────────────────────

    /// Append one toot to the history. Unconditional; any failure
    /// propagates.
    async fn add_toot(&self, account_id: i64, toot: &Toot) -> Result<()>;

    /// Record one ingested feed entry unless (account, guid hash) is
    /// already present. This is what makes feed re-polling idempotent.
    async fn add_feed_post_if_new(&self, account_id: i64, post: &FeedPost) -> Result<InsertResult>;

    /// Number of toots authored by a handle. Unknown handles count zero.
    async fn toot_count(&self, handle: &str) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Delivery Queue
    // ─────────────────────────────────────────────────────────────────────────

    /// Append one pending delivery; returns the assigned id. Ids are
    /// strictly increasing in insertion order and never reused.
    async fn enqueue_toot(&self, item: &NewQueueItem) -> Result<i64>;

    /// Up to `max_count` queue items with id strictly greater than
    /// `above_id`, ascending by id. A consumer resumes after a crash by
    /// passing the last id it finished.
    async fn drain_queue(&self, above_id: i64, max_count: u32) -> Result<Vec<QueueItem>>;

    /// Delete one queue item after successful delivery. Deleting an
    /// unknown id is a silent no-op.
    async fn delete_queue_item(&self, id: i64) -> Result<()>;
}

/// Extension trait for common repo patterns.
pub trait RepoExt: Repo {
    /// Record a toot in the history and enqueue one delivery per inbox.
    ///
    /// This is the posting path's composition: the toot lands in the
    /// append-only log, then each destination inbox gets a queue item
    /// carrying the same status id and content. Returns the assigned
    /// queue ids.
    fn record_and_enqueue(
        &self,
        account_id: i64,
        sending_handle: &str,
        toot: &Toot,
        inboxes: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<i64>>> + Send;
}

impl<R: Repo + ?Sized> RepoExt for R {
    async fn record_and_enqueue(
        &self,
        account_id: i64,
        sending_handle: &str,
        toot: &Toot,
        inboxes: &[String],
    ) -> Result<Vec<i64>> {
        self.add_toot(account_id, toot).await?;

        let mut queue_ids = Vec::with_capacity(inboxes.len());
        for inbox in inboxes {
            let item = NewQueueItem {
                sending_handle: sending_handle.to_string(),
                to_inbox: inbox.clone(),
                tooted_at: toot.tooted_at,
                status_id: toot.status_id,
                content: toot.content.clone(),
            };
            queue_ids.push(self.enqueue_toot(&item).await?);
        }

        Ok(queue_ids)
    }
}
