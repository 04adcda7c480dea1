//! SQLite implementation of the Repo trait.
//!
//! This is the primary storage backend for the bridge. It uses rusqlite
//! with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use mynah_core::{
    Account, FeedPost, FollowerInfo, IdSequence, NewAccount, NewQueueItem, QueueItem, Toot,
};

use crate::config::{BootstrapAccount, StoreConfig};
use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AccountUpsert, InsertResult, Repo};

/// SQLite-based repo implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteRepo {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,

    /// Status id sequence, seeded at open.
    ids: IdSequence,
}

impl SqliteRepo {
    /// Open the database named by the config.
    ///
    /// Creates the parent directory and the file as needed, applies
    /// pending migrations, and on a fresh database seeds the configured
    /// built-in accounts.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&config.db_path)?;
        Self::init(conn, &config.bootstrap)
    }

    /// Open an in-memory database.
    ///
    /// Useful for testing; runs the same migration and seeding path.
    pub fn open_memory(bootstrap: &[BootstrapAccount]) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, bootstrap)
    }

    fn init(mut conn: Connection, bootstrap: &[BootstrapAccount]) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        let fresh = migration::current_version(&conn)? == 0;
        migration::migrate(&mut conn)?;

        if fresh {
            seed_bootstrap(&conn, bootstrap)?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ids: IdSequence::new(),
        })
    }

    /// Run a blocking operation against the connection off the runtime.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

/// Seed built-in accounts through the normal upsert path.
fn seed_bootstrap(conn: &Connection, bootstrap: &[BootstrapAccount]) -> Result<()> {
    for entry in bootstrap {
        let account = NewAccount {
            created_at: entry.published,
            user_url: entry.user_url.clone(),
            handle: entry.handle.clone(),
            pub_key: entry.pub_key.clone(),
            ..NewAccount::default()
        };
        let upsert = insert_account_if_not_exist(conn, &account, &entry.priv_key)?;
        if upsert.is_new() {
            tracing::info!("seeded built-in account {}", entry.handle);
        }
    }
    Ok(())
}

/// True when an error is SQLite's unique-constraint violation, identified
/// by the portable extended result code rather than message text.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// privkey is never selected into this struct.
fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get("id")?,
        created_at: row.get("created_at")?,
        user_url: row.get("user_url")?,
        handle: row.get("handle")?,
        name: row.get("name")?,
        summary: row.get("summary")?,
        profile_image_url: row.get("profile_image_url")?,
        site_url: row.get("site_url")?,
        feed_url: row.get("feed_url")?,
        feed_last_updated: row.get("feed_last_updated")?,
        next_check_due: row.get("next_check_due")?,
        pub_key: row.get("pubkey")?,
    })
}

fn row_to_follower(row: &rusqlite::Row<'_>) -> rusqlite::Result<FollowerInfo> {
    Ok(FollowerInfo {
        user_url: row.get("user_url")?,
        handle: row.get("handle")?,
        host: row.get("host")?,
        shared_inbox: row.get("shared_inbox")?,
    })
}

fn row_to_queue_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        id: row.get("id")?,
        sending_handle: row.get("sending_handle")?,
        to_inbox: row.get("to_inbox")?,
        tooted_at: row.get("tooted_at")?,
        status_id: row.get::<_, i64>("status_id")? as u64,
        content: row.get("content")?,
    })
}

fn account_by_handle(conn: &Connection, handle: &str) -> Result<Option<Account>> {
    conn.query_row(
        "SELECT id, created_at, user_url, handle, name, summary, profile_image_url,
                site_url, feed_url, feed_last_updated, next_check_due, pubkey
         FROM accounts WHERE handle = ?1",
        params![handle],
        row_to_account,
    )
    .optional()
    .map_err(StoreError::from)
}

/// Fetch an account that is known to exist; absence surfaces as a
/// database error.
fn stored_account(conn: &Connection, handle: &str) -> Result<Account> {
    conn.query_row(
        "SELECT id, created_at, user_url, handle, name, summary, profile_image_url,
                site_url, feed_url, feed_last_updated, next_check_due, pubkey
         FROM accounts WHERE handle = ?1",
        params![handle],
        row_to_account,
    )
    .map_err(StoreError::from)
}

fn account_id_for_handle(conn: &Connection, handle: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM accounts WHERE handle = ?1",
        params![handle],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::NoSuchAccount(handle.to_string()))
}

/// Insert an account unless the handle is taken.
///
/// A unique violation on the handle is the detection mechanism (not a
/// prior existence check), so concurrent callers race safely: the loser
/// fetches the canonical row the winner wrote. Accounts are never
/// deleted, so the post-violation fetch cannot miss.
fn insert_account_if_not_exist(
    conn: &Connection,
    account: &NewAccount,
    priv_key: &str,
) -> Result<AccountUpsert> {
    let inserted = conn.execute(
        "INSERT INTO accounts (created_at, user_url, handle, name, summary, profile_image_url,
                               site_url, feed_url, pubkey, privkey)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            account.created_at,
            account.user_url,
            account.handle,
            account.name,
            account.summary,
            account.profile_image_url,
            account.site_url,
            account.feed_url,
            account.pub_key,
            priv_key,
        ],
    );

    match inserted {
        Ok(_) => Ok(AccountUpsert::Inserted(stored_account(
            conn,
            &account.handle,
        )?)),
        Err(err) if is_unique_violation(&err) => Ok(AccountUpsert::Existing(stored_account(
            conn,
            &account.handle,
        )?)),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl Repo for SqliteRepo {
    fn next_id(&self) -> u64 {
        self.ids.next()
    }

    async fn add_account_if_not_exist(
        &self,
        account: &NewAccount,
        priv_key: &str,
    ) -> Result<AccountUpsert> {
        let account = account.clone();
        let priv_key = priv_key.to_string();
        self.with_conn(move |conn| insert_account_if_not_exist(conn, &account, &priv_key))
            .await
    }

    async fn account_exists(&self, handle: &str) -> Result<bool> {
        let handle = handle.to_string();
        self.with_conn(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE handle = ?1)",
                params![handle],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn get_account(&self, handle: &str) -> Result<Option<Account>> {
        let handle = handle.to_string();
        self.with_conn(move |conn| account_by_handle(conn, &handle))
            .await
    }

    async fn get_priv_key(&self, handle: &str) -> Result<Option<String>> {
        let handle = handle.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT privkey FROM accounts WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn update_feed_check_times(
        &self,
        account_id: i64,
        last_updated: i64,
        next_check_due: i64,
    ) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE accounts SET feed_last_updated = ?2, next_check_due = ?3 WHERE id = ?1",
                params![account_id, last_updated, next_check_due],
            )?;
            Ok(())
        })
        .await
    }

    async fn feed_last_updated(&self, account_id: i64) -> Result<Option<i64>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT feed_last_updated FROM accounts WHERE id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn claim_account_due(
        &self,
        due_before: i64,
        next_check_due: i64,
    ) -> Result<Option<Account>> {
        self.with_conn(move |conn| {
            // Selection and reschedule in one statement, so a concurrent
            // scheduler cannot claim the same account. RETURNING yields
            // the post-update row.
            conn.query_row(
                "UPDATE accounts
                 SET next_check_due = ?2
                 WHERE id = (SELECT id FROM accounts WHERE next_check_due < ?1 LIMIT 1)
                 RETURNING id, created_at, user_url, handle, name, summary, profile_image_url,
                           site_url, feed_url, feed_last_updated, next_check_due, pubkey",
                params![due_before, next_check_due],
                row_to_account,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn add_follower(&self, handle: &str, follower: &FollowerInfo) -> Result<()> {
        let handle = handle.to_string();
        let follower = follower.clone();
        self.with_conn(move |conn| {
            let account_id = account_id_for_handle(conn, &handle)?;
            conn.execute(
                "INSERT INTO followers (account_id, user_url, handle, host, shared_inbox)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    account_id,
                    follower.user_url,
                    follower.handle,
                    follower.host,
                    follower.shared_inbox,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_follower(&self, handle: &str, follower_user_url: &str) -> Result<()> {
        let handle = handle.to_string();
        let follower_user_url = follower_user_url.to_string();
        self.with_conn(move |conn| {
            let account_id = account_id_for_handle(conn, &handle)?;
            conn.execute(
                "DELETE FROM followers WHERE account_id = ?1 AND user_url = ?2",
                params![account_id, follower_user_url],
            )?;
            Ok(())
        })
        .await
    }

    async fn followers(&self, handle: &str) -> Result<Vec<FollowerInfo>> {
        let handle = handle.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT f.user_url, f.handle, f.host, f.shared_inbox
                 FROM followers f JOIN accounts a ON a.id = f.account_id
                 WHERE a.handle = ?1",
            )?;
            let followers = stmt
                .query_map(params![handle], row_to_follower)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(followers)
        })
        .await
    }

    async fn followers_by_id(&self, account_id: i64) -> Result<Vec<FollowerInfo>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_url, handle, host, shared_inbox
                 FROM followers WHERE account_id = ?1",
            )?;
            let followers = stmt
                .query_map(params![account_id], row_to_follower)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(followers)
        })
        .await
    }

    async fn follower_count(&self, handle: &str) -> Result<u64> {
        let handle = handle.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*)
                 FROM followers f JOIN accounts a ON a.id = f.account_id
                 WHERE a.handle = ?1",
                params![handle],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn add_toot(&self, account_id: i64, toot: &Toot) -> Result<()> {
        let toot = toot.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO toots (account_id, guid_hash, tooted_at, status_id, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    account_id,
                    toot.guid_hash,
                    toot.tooted_at,
                    toot.status_id as i64,
                    toot.content,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn add_feed_post_if_new(&self, account_id: i64, post: &FeedPost) -> Result<InsertResult> {
        let post = post.clone();
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO feed_posts (account_id, guid_hash, post_time, link, title, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(account_id, guid_hash) DO NOTHING",
                params![
                    account_id,
                    post.guid_hash,
                    post.post_time,
                    post.link,
                    post.title,
                    post.description,
                ],
            )?;
            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn toot_count(&self, handle: &str) -> Result<u64> {
        let handle = handle.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*)
                 FROM toots t JOIN accounts a ON a.id = t.account_id
                 WHERE a.handle = ?1",
                params![handle],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn enqueue_toot(&self, item: &NewQueueItem) -> Result<i64> {
        let item = item.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO toot_queue (sending_handle, to_inbox, tooted_at, status_id, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    item.sending_handle,
                    item.to_inbox,
                    item.tooted_at,
                    item.status_id as i64,
                    item.content,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn drain_queue(&self, above_id: i64, max_count: u32) -> Result<Vec<QueueItem>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sending_handle, to_inbox, tooted_at, status_id, content
                 FROM toot_queue WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
            )?;
            let items = stmt
                .query_map(params![above_id, max_count], row_to_queue_item)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(items)
        })
        .await
    }

    async fn delete_queue_item(&self, id: i64) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM toot_queue WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_account(handle: &str) -> NewAccount {
        NewAccount {
            created_at: 1_700_000_000_000,
            user_url: format!("https://bridge.example/u/{}", handle),
            handle: handle.to_string(),
            name: format!("Mirror of {}", handle),
            summary: String::new(),
            profile_image_url: String::new(),
            site_url: format!("https://{}", handle),
            feed_url: format!("https://{}/rss", handle),
            pub_key: "PUB".to_string(),
        }
    }

    fn test_follower(n: u32) -> FollowerInfo {
        FollowerInfo {
            user_url: format!("https://remote.example/users/f{}", n),
            handle: format!("f{}", n),
            host: "remote.example".to_string(),
            shared_inbox: "https://remote.example/inbox".to_string(),
        }
    }

    fn test_queue_item(inbox: &str) -> NewQueueItem {
        NewQueueItem {
            sending_handle: "blog.example.com".to_string(),
            to_inbox: inbox.to_string(),
            tooted_at: 1_700_000_000_000,
            status_id: 42,
            content: "<p>hello</p>".to_string(),
        }
    }

    fn open_test_repo() -> SqliteRepo {
        SqliteRepo::open_memory(&[]).unwrap()
    }

    #[tokio::test]
    async fn test_add_account_and_get() {
        let repo = open_test_repo();

        let upsert = repo
            .add_account_if_not_exist(&test_account("blog.example.com"), "PRIV")
            .await
            .unwrap();
        assert!(upsert.is_new());
        let stored = upsert.into_account();
        assert!(stored.id > 0);
        assert_eq!(stored.handle, "blog.example.com");
        assert_eq!(stored.feed_last_updated, 0);
        assert_eq!(stored.next_check_due, 0);

        let fetched = repo.get_account("blog.example.com").await.unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert!(repo.account_exists("blog.example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_account_returns_existing() {
        let repo = open_test_repo();

        let first = repo
            .add_account_if_not_exist(&test_account("blog.example.com"), "PRIV")
            .await
            .unwrap();
        assert!(first.is_new());

        // Different attributes, same handle: the original row wins.
        let mut retry = test_account("blog.example.com");
        retry.name = "Someone else".to_string();
        let second = repo.add_account_if_not_exist(&retry, "OTHER").await.unwrap();

        assert!(!second.is_new());
        assert_eq!(second.account(), first.account());

        // And the stored private key is still the first one.
        let key = repo.get_priv_key("blog.example.com").await.unwrap();
        assert_eq!(key.as_deref(), Some("PRIV"));
    }

    #[tokio::test]
    async fn test_absent_lookups_are_none() {
        let repo = open_test_repo();

        assert!(!repo.account_exists("nobody").await.unwrap());
        assert!(repo.get_account("nobody").await.unwrap().is_none());
        assert!(repo.get_priv_key("nobody").await.unwrap().is_none());
        assert!(repo.feed_last_updated(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_feed_check_times() {
        let repo = open_test_repo();
        let account = repo
            .add_account_if_not_exist(&test_account("blog.example.com"), "")
            .await
            .unwrap()
            .into_account();

        repo.update_feed_check_times(account.id, 1111, 2222)
            .await
            .unwrap();

        let fetched = repo.get_account("blog.example.com").await.unwrap().unwrap();
        assert_eq!(fetched.feed_last_updated, 1111);
        assert_eq!(fetched.next_check_due, 2222);
        assert_eq!(repo.feed_last_updated(account.id).await.unwrap(), Some(1111));
    }

    #[tokio::test]
    async fn test_claim_account_due() {
        let repo = open_test_repo();
        let account = repo
            .add_account_if_not_exist(&test_account("blog.example.com"), "")
            .await
            .unwrap()
            .into_account();

        // Nothing is due before time 0.
        assert!(repo.claim_account_due(0, 500).await.unwrap().is_none());

        repo.update_feed_check_times(account.id, 10, 100)
            .await
            .unwrap();

        // Due at t=200; the claim reschedules to 900.
        let claimed = repo.claim_account_due(200, 900).await.unwrap().unwrap();
        assert_eq!(claimed.id, account.id);
        assert_eq!(claimed.next_check_due, 900);

        // The same instant cannot claim it twice.
        assert!(repo.claim_account_due(200, 900).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_followers_roundtrip() {
        let repo = open_test_repo();
        repo.add_account_if_not_exist(&test_account("blog.example.com"), "")
            .await
            .unwrap();

        repo.add_follower("blog.example.com", &test_follower(1))
            .await
            .unwrap();
        repo.add_follower("blog.example.com", &test_follower(2))
            .await
            .unwrap();

        let listed = repo.followers("blog.example.com").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(repo.follower_count("blog.example.com").await.unwrap(), 2);

        let account = repo.get_account("blog.example.com").await.unwrap().unwrap();
        let by_id = repo.followers_by_id(account.id).await.unwrap();
        assert_eq!(by_id.len(), 2);

        repo.remove_follower("blog.example.com", &test_follower(1).user_url)
            .await
            .unwrap();
        assert_eq!(repo.follower_count("blog.example.com").await.unwrap(), 1);

        // Removing an absent follower is a silent no-op.
        repo.remove_follower("blog.example.com", "https://remote.example/users/gone")
            .await
            .unwrap();
        assert_eq!(repo.follower_count("blog.example.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_follower_ops_unknown_handle() {
        let repo = open_test_repo();

        let err = repo
            .add_follower("nobody", &test_follower(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoSuchAccount(h) if h == "nobody"));

        let err = repo
            .remove_follower("nobody", "https://remote.example/users/f1")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoSuchAccount(_)));

        // Listing and counting through an unknown handle yield empties.
        assert!(repo.followers("nobody").await.unwrap().is_empty());
        assert_eq!(repo.follower_count("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_follower_is_error() {
        let repo = open_test_repo();
        repo.add_account_if_not_exist(&test_account("blog.example.com"), "")
            .await
            .unwrap();

        repo.add_follower("blog.example.com", &test_follower(1))
            .await
            .unwrap();
        let err = repo
            .add_follower("blog.example.com", &test_follower(1))
            .await
            .unwrap_err();
        match err {
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                assert_eq!(e.extended_code, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_feed_post_dedup() {
        let repo = open_test_repo();
        let account = repo
            .add_account_if_not_exist(&test_account("blog.example.com"), "")
            .await
            .unwrap()
            .into_account();

        let post = FeedPost {
            guid_hash: mynah_core::guid_hash("https://blog.example.com/posts/1"),
            post_time: 1_700_000_000_000,
            link: "https://blog.example.com/posts/1".to_string(),
            title: "First".to_string(),
            description: String::new(),
        };

        let first = repo.add_feed_post_if_new(account.id, &post).await.unwrap();
        assert!(first.is_new());

        let second = repo.add_feed_post_if_new(account.id, &post).await.unwrap();
        assert_eq!(second, InsertResult::AlreadyExists);

        // Same guid under another account is a distinct pair.
        let other = repo
            .add_account_if_not_exist(&test_account("other.example.com"), "")
            .await
            .unwrap()
            .into_account();
        let third = repo.add_feed_post_if_new(other.id, &post).await.unwrap();
        assert!(third.is_new());
    }

    #[tokio::test]
    async fn test_toot_history_and_count() {
        let repo = open_test_repo();
        let account = repo
            .add_account_if_not_exist(&test_account("blog.example.com"), "")
            .await
            .unwrap()
            .into_account();

        for n in 0..3 {
            let toot = Toot {
                guid_hash: n,
                tooted_at: 1_700_000_000_000 + n,
                status_id: repo.next_id(),
                content: format!("<p>post {}</p>", n),
            };
            repo.add_toot(account.id, &toot).await.unwrap();
        }

        assert_eq!(repo.toot_count("blog.example.com").await.unwrap(), 3);
        assert_eq!(repo.toot_count("nobody").await.unwrap(), 0);

        // Identical toots may be appended; this log does not dedup.
        let again = Toot {
            guid_hash: 0,
            tooted_at: 1_700_000_000_000,
            status_id: 1,
            content: "<p>post 0</p>".to_string(),
        };
        repo.add_toot(account.id, &again).await.unwrap();
        repo.add_toot(account.id, &again).await.unwrap();
        assert_eq!(repo.toot_count("blog.example.com").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_queue_drain_pagination() {
        let repo = open_test_repo();

        let mut ids = Vec::new();
        for n in 0..8 {
            let id = repo
                .enqueue_toot(&test_queue_item(&format!("https://host{}/inbox", n)))
                .await
                .unwrap();
            ids.push(id);
        }
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let first_page = repo.drain_queue(0, 3).await.unwrap();
        assert_eq!(
            first_page.iter().map(|i| i.id).collect::<Vec<_>>(),
            &ids[..3]
        );

        let rest = repo
            .drain_queue(first_page.last().unwrap().id, 10)
            .await
            .unwrap();
        assert_eq!(rest.iter().map(|i| i.id).collect::<Vec<_>>(), &ids[3..]);
    }

    #[tokio::test]
    async fn test_queue_delete() {
        let repo = open_test_repo();
        let a = repo.enqueue_toot(&test_queue_item("https://a/inbox")).await.unwrap();
        let b = repo.enqueue_toot(&test_queue_item("https://b/inbox")).await.unwrap();

        repo.delete_queue_item(a).await.unwrap();
        let remaining = repo.drain_queue(0, 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);

        // Deleting an unknown id is a silent no-op.
        repo.delete_queue_item(9999).await.unwrap();
        assert_eq!(repo.drain_queue(0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_queue_ids_not_reused_after_delete() {
        let repo = open_test_repo();
        let a = repo.enqueue_toot(&test_queue_item("https://a/inbox")).await.unwrap();
        repo.delete_queue_item(a).await.unwrap();

        let b = repo.enqueue_toot(&test_queue_item("https://b/inbox")).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_open_seeds_bootstrap_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("mynah.db")).with_bootstrap(
            BootstrapAccount {
                handle: "birb".to_string(),
                user_url: "https://bridge.example/u/birb".to_string(),
                published: 1_700_000_000_000,
                pub_key: "PUB".to_string(),
                priv_key: "PRIV".to_string(),
            },
        );

        {
            let repo = SqliteRepo::open(&config).unwrap();
            let account = repo.get_account("birb").await.unwrap().unwrap();
            assert_eq!(account.user_url, "https://bridge.example/u/birb");
            assert_eq!(repo.get_priv_key("birb").await.unwrap().as_deref(), Some("PRIV"));

            // Leave a marker row behind.
            repo.update_feed_check_times(account.id, 7, 8).await.unwrap();
        }

        // Reopening migrates nothing and reseeds nothing.
        let repo = SqliteRepo::open(&config).unwrap();
        let account = repo.get_account("birb").await.unwrap().unwrap();
        assert_eq!(account.feed_last_updated, 7);
        assert_eq!(account.next_check_due, 8);
    }

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("nested/deeper/mynah.db"));

        let repo = SqliteRepo::open(&config).unwrap();
        assert!(!repo.account_exists("anyone").await.unwrap());
        assert!(dir.path().join("nested/deeper/mynah.db").exists());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_drain_cursor_walk_reconstructs_queue(count in 1usize..40, step in 1u32..7) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let repo = open_test_repo();

                let mut expected = Vec::new();
                for n in 0..count {
                    let id = repo
                        .enqueue_toot(&test_queue_item(&format!("https://host{}/inbox", n)))
                        .await
                        .unwrap();
                    expected.push(id);
                }

                let mut walked = Vec::new();
                let mut cursor = 0;
                loop {
                    let page = repo.drain_queue(cursor, step).await.unwrap();
                    if page.is_empty() {
                        break;
                    }
                    cursor = page.last().unwrap().id;
                    walked.extend(page.into_iter().map(|item| item.id));
                }

                assert_eq!(walked, expected);
            });
        }
    }
}
