//! In-memory implementation of the Repo trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::RwLock;

use async_trait::async_trait;

use mynah_core::{
    Account, FeedPost, FollowerInfo, IdSequence, NewAccount, NewQueueItem, QueueItem, Toot,
};

use crate::error::{Result, StoreError};
use crate::traits::{AccountUpsert, InsertResult, Repo};

/// In-memory repo implementation.
///
/// All data is lost when the repo is dropped. Thread-safe via RwLock.
pub struct MemoryRepo {
    inner: RwLock<MemoryRepoInner>,
    ids: IdSequence,
}

struct MemoryRepoInner {
    /// Accounts indexed by id.
    accounts: HashMap<i64, StoredAccount>,

    /// Handle index: handle -> account id.
    handles: HashMap<String, i64>,

    /// Next account id to assign.
    next_account_id: i64,

    /// Followers per account, in insertion order.
    followers: HashMap<i64, Vec<FollowerInfo>>,

    /// Published toot history per account.
    toots: HashMap<i64, Vec<Toot>>,

    /// Feed posts already recorded, keyed by (account_id, guid_hash).
    seen_posts: HashSet<(i64, i64)>,

    /// Pending deliveries ordered by id.
    queue: BTreeMap<i64, QueueItem>,

    /// Next queue id to assign. Never reused, even after deletes.
    next_queue_id: i64,
}

struct StoredAccount {
    account: Account,
    priv_key: String,
}

impl MemoryRepo {
    /// Create a new empty in-memory repo.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryRepoInner {
                accounts: HashMap::new(),
                handles: HashMap::new(),
                next_account_id: 1,
                followers: HashMap::new(),
                toots: HashMap::new(),
                seen_posts: HashSet::new(),
                queue: BTreeMap::new(),
                next_queue_id: 1,
            }),
            ids: IdSequence::new(),
        }
    }
}

impl Default for MemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepoInner {
    fn account_id(&self, handle: &str) -> Result<i64> {
        self.handles
            .get(handle)
            .copied()
            .ok_or_else(|| StoreError::NoSuchAccount(handle.to_string()))
    }
}

/// Build the same unique-violation error the SQLite backend raises for a
/// duplicate pair, so callers can classify it identically across backends.
/// Only the extended code is contractual; the message differs.
fn unique_violation(message: &str) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
        Some(message.to_string()),
    ))
}

#[async_trait]
impl Repo for MemoryRepo {
    fn next_id(&self) -> u64 {
        self.ids.next()
    }

    async fn add_account_if_not_exist(
        &self,
        account: &NewAccount,
        priv_key: &str,
    ) -> Result<AccountUpsert> {
        let mut inner = self.inner.write().unwrap();

        if let Some(&id) = inner.handles.get(&account.handle) {
            if let Some(stored) = inner.accounts.get(&id) {
                return Ok(AccountUpsert::Existing(stored.account.clone()));
            }
        }

        let id = inner.next_account_id;
        inner.next_account_id += 1;

        let stored = Account {
            id,
            created_at: account.created_at,
            user_url: account.user_url.clone(),
            handle: account.handle.clone(),
            name: account.name.clone(),
            summary: account.summary.clone(),
            profile_image_url: account.profile_image_url.clone(),
            site_url: account.site_url.clone(),
            feed_url: account.feed_url.clone(),
            feed_last_updated: 0,
            next_check_due: 0,
            pub_key: account.pub_key.clone(),
        };
        inner.handles.insert(account.handle.clone(), id);
        inner.accounts.insert(
            id,
            StoredAccount {
                account: stored.clone(),
                priv_key: priv_key.to_string(),
            },
        );

        Ok(AccountUpsert::Inserted(stored))
    }

    async fn account_exists(&self, handle: &str) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner.handles.contains_key(handle))
    }

    async fn get_account(&self, handle: &str) -> Result<Option<Account>> {
        let inner = self.inner.read().unwrap();
        let account = inner
            .handles
            .get(handle)
            .and_then(|id| inner.accounts.get(id))
            .map(|stored| stored.account.clone());
        Ok(account)
    }

    async fn get_priv_key(&self, handle: &str) -> Result<Option<String>> {
        let inner = self.inner.read().unwrap();
        let key = inner
            .handles
            .get(handle)
            .and_then(|id| inner.accounts.get(id))
            .map(|stored| stored.priv_key.clone());
        Ok(key)
    }

    async fn update_feed_check_times(
        &self,
        account_id: i64,
        last_updated: i64,
        next_check_due: i64,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        // An unknown id updates nothing, matching SQL semantics.
        if let Some(stored) = inner.accounts.get_mut(&account_id) {
            stored.account.feed_last_updated = last_updated;
            stored.account.next_check_due = next_check_due;
        }
        Ok(())
    }

    async fn feed_last_updated(&self, account_id: i64) -> Result<Option<i64>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .accounts
            .get(&account_id)
            .map(|stored| stored.account.feed_last_updated))
    }

    async fn claim_account_due(
        &self,
        due_before: i64,
        next_check_due: i64,
    ) -> Result<Option<Account>> {
        // Held for the whole find-and-reschedule, so two concurrent
        // schedulers cannot claim the same account.
        let mut inner = self.inner.write().unwrap();

        let due_id = inner
            .accounts
            .values()
            .find(|stored| stored.account.next_check_due < due_before)
            .map(|stored| stored.account.id);

        if let Some(id) = due_id {
            if let Some(stored) = inner.accounts.get_mut(&id) {
                stored.account.next_check_due = next_check_due;
                return Ok(Some(stored.account.clone()));
            }
        }
        Ok(None)
    }

    async fn add_follower(&self, handle: &str, follower: &FollowerInfo) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let account_id = inner.account_id(handle)?;

        let followers = inner.followers.entry(account_id).or_default();
        if followers.iter().any(|f| f.user_url == follower.user_url) {
            return Err(unique_violation("follower already exists"));
        }
        followers.push(follower.clone());
        Ok(())
    }

    async fn remove_follower(&self, handle: &str, follower_user_url: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let account_id = inner.account_id(handle)?;

        if let Some(followers) = inner.followers.get_mut(&account_id) {
            followers.retain(|f| f.user_url != follower_user_url);
        }
        Ok(())
    }

    async fn followers(&self, handle: &str) -> Result<Vec<FollowerInfo>> {
        let inner = self.inner.read().unwrap();
        // An unknown handle lists nothing, matching the SQL join.
        let followers = inner
            .handles
            .get(handle)
            .and_then(|id| inner.followers.get(id))
            .cloned()
            .unwrap_or_default();
        Ok(followers)
    }

    async fn followers_by_id(&self, account_id: i64) -> Result<Vec<FollowerInfo>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.followers.get(&account_id).cloned().unwrap_or_default())
    }

    async fn follower_count(&self, handle: &str) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        let count = inner
            .handles
            .get(handle)
            .and_then(|id| inner.followers.get(id))
            .map(|followers| followers.len())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn add_toot(&self, account_id: i64, toot: &Toot) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.toots.entry(account_id).or_default().push(toot.clone());
        Ok(())
    }

    async fn add_feed_post_if_new(&self, account_id: i64, post: &FeedPost) -> Result<InsertResult> {
        let mut inner = self.inner.write().unwrap();
        if inner.seen_posts.insert((account_id, post.guid_hash)) {
            Ok(InsertResult::Inserted)
        } else {
            Ok(InsertResult::AlreadyExists)
        }
    }

    async fn toot_count(&self, handle: &str) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        let count = inner
            .handles
            .get(handle)
            .and_then(|id| inner.toots.get(id))
            .map(|toots| toots.len())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn enqueue_toot(&self, item: &NewQueueItem) -> Result<i64> {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_queue_id;
        inner.next_queue_id += 1;

        inner.queue.insert(
            id,
            QueueItem {
                id,
                sending_handle: item.sending_handle.clone(),
                to_inbox: item.to_inbox.clone(),
                tooted_at: item.tooted_at,
                status_id: item.status_id,
                content: item.content.clone(),
            },
        );
        Ok(id)
    }

    async fn drain_queue(&self, above_id: i64, max_count: u32) -> Result<Vec<QueueItem>> {
        let inner = self.inner.read().unwrap();
        let items = inner
            .queue
            .range((Excluded(above_id), Unbounded))
            .take(max_count as usize)
            .map(|(_, item)| item.clone())
            .collect();
        Ok(items)
    }

    async fn delete_queue_item(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.queue.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_account(handle: &str) -> NewAccount {
        NewAccount {
            created_at: 1_700_000_000_000,
            user_url: format!("https://bridge.example/u/{}", handle),
            handle: handle.to_string(),
            feed_url: format!("https://{}/rss", handle),
            pub_key: "PUB".to_string(),
            ..NewAccount::default()
        }
    }

    #[tokio::test]
    async fn test_account_upsert_semantics() {
        let repo = MemoryRepo::new();

        let first = repo
            .add_account_if_not_exist(&make_account("blog.example.com"), "PRIV")
            .await
            .unwrap();
        assert!(first.is_new());

        let second = repo
            .add_account_if_not_exist(&make_account("blog.example.com"), "OTHER")
            .await
            .unwrap();
        assert!(!second.is_new());
        assert_eq!(second.account(), first.account());

        let key = repo.get_priv_key("blog.example.com").await.unwrap();
        assert_eq!(key.as_deref(), Some("PRIV"));
    }

    #[tokio::test]
    async fn test_claim_reschedules_atomically() {
        let repo = MemoryRepo::new();
        let account = repo
            .add_account_if_not_exist(&make_account("blog.example.com"), "")
            .await
            .unwrap()
            .into_account();

        repo.update_feed_check_times(account.id, 10, 100)
            .await
            .unwrap();

        let claimed = repo.claim_account_due(200, 900).await.unwrap().unwrap();
        assert_eq!(claimed.id, account.id);
        assert_eq!(claimed.next_check_due, 900);
        assert!(repo.claim_account_due(200, 900).await.unwrap().is_none());
    }

    /// Add the same follower twice and return the extended error code of
    /// the rejected duplicate.
    async fn duplicate_follower_code(repo: &dyn Repo) -> i32 {
        repo.add_account_if_not_exist(&make_account("blog.example.com"), "")
            .await
            .unwrap();

        let follower = FollowerInfo {
            user_url: "https://remote.example/users/f1".to_string(),
            handle: "f1".to_string(),
            host: "remote.example".to_string(),
            shared_inbox: "https://remote.example/inbox".to_string(),
        };
        repo.add_follower("blog.example.com", &follower)
            .await
            .unwrap();

        let err = repo
            .add_follower("blog.example.com", &follower)
            .await
            .unwrap_err();
        match err {
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => e.extended_code,
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_follower_matches_sqlite_error() {
        let memory = MemoryRepo::new();
        let sqlite = crate::sqlite::SqliteRepo::open_memory(&[]).unwrap();

        let memory_code = duplicate_follower_code(&memory).await;
        let sqlite_code = duplicate_follower_code(&sqlite).await;

        assert_eq!(memory_code, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE);
        assert_eq!(sqlite_code, memory_code);
    }

    #[tokio::test]
    async fn test_queue_ids_survive_deletes() {
        let repo = MemoryRepo::new();

        let a = repo
            .enqueue_toot(&NewQueueItem {
                sending_handle: "blog.example.com".to_string(),
                to_inbox: "https://a/inbox".to_string(),
                tooted_at: 1,
                status_id: 1,
                content: String::new(),
            })
            .await
            .unwrap();
        repo.delete_queue_item(a).await.unwrap();

        let b = repo
            .enqueue_toot(&NewQueueItem {
                sending_handle: "blog.example.com".to_string(),
                to_inbox: "https://b/inbox".to_string(),
                tooted_at: 2,
                status_id: 2,
                content: String::new(),
            })
            .await
            .unwrap();
        assert!(b > a);

        let drained = repo.drain_queue(0, 10).await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, b);
    }
}
