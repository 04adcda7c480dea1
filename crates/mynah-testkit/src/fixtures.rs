//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use mynah_core::{guid_hash, Account, FeedPost, FollowerInfo, NewAccount, NewQueueItem, Toot};
use mynah_store::{BootstrapAccount, MemoryRepo, Repo, SqliteRepo};

/// A test fixture around an in-memory repo.
pub struct TestFixture {
    pub repo: MemoryRepo,
}

impl TestFixture {
    /// Create a new fixture with an empty repo.
    pub fn new() -> Self {
        Self {
            repo: MemoryRepo::new(),
        }
    }

    /// Insert a mirrored account with canned attributes for the handle.
    pub async fn add_account(&self, handle: &str) -> Account {
        self.repo
            .add_account_if_not_exist(&make_account(handle), "PRIV")
            .await
            .expect("add account")
            .into_account()
    }

    /// Insert the nth canned follower for the handle.
    pub async fn add_follower(&self, handle: &str, n: u32) -> FollowerInfo {
        let follower = make_follower(n);
        self.repo
            .add_follower(handle, &follower)
            .await
            .expect("add follower");
        follower
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// One repo per backend, for tests that must hold on both.
pub fn both_backends() -> Vec<Box<dyn Repo>> {
    vec![
        Box::new(MemoryRepo::new()),
        Box::new(SqliteRepo::open_memory(&[]).expect("open in-memory sqlite")),
    ]
}

/// The built-in bridge account seeded into fresh databases.
pub fn sample_bootstrap() -> BootstrapAccount {
    BootstrapAccount {
        handle: "birb".to_string(),
        user_url: "https://bridge.example/u/birb".to_string(),
        published: 1_700_000_000_000,
        pub_key: "BOOT-PUB".to_string(),
        priv_key: "BOOT-PRIV".to_string(),
    }
}

/// A mirrored account for the given feed host.
pub fn make_account(handle: &str) -> NewAccount {
    NewAccount {
        created_at: now_millis(),
        user_url: format!("https://bridge.example/u/{}", handle),
        handle: handle.to_string(),
        name: format!("Mirror of {}", handle),
        summary: format!("Posts from https://{}", handle),
        profile_image_url: String::new(),
        site_url: format!("https://{}", handle),
        feed_url: format!("https://{}/rss", handle),
        pub_key: "PUB".to_string(),
    }
}

/// The nth canned remote follower.
pub fn make_follower(n: u32) -> FollowerInfo {
    FollowerInfo {
        user_url: format!("https://remote.example/users/f{}", n),
        handle: format!("f{}", n),
        host: "remote.example".to_string(),
        shared_inbox: "https://remote.example/inbox".to_string(),
    }
}

/// A feed post keyed by its guid.
pub fn make_feed_post(guid: &str) -> FeedPost {
    FeedPost {
        guid_hash: guid_hash(guid),
        post_time: now_millis(),
        link: guid.to_string(),
        title: format!("Post {}", guid),
        description: String::new(),
    }
}

/// A toot announcing the given guid.
pub fn make_toot(guid: &str, status_id: u64) -> Toot {
    Toot {
        guid_hash: guid_hash(guid),
        tooted_at: now_millis(),
        status_id,
        content: format!("<p>New post: {}</p>", guid),
    }
}

/// A pending delivery to the given inbox.
pub fn make_queue_item(to_inbox: &str, status_id: u64) -> NewQueueItem {
    NewQueueItem {
        sending_handle: "blog.example.com".to_string(),
        to_inbox: to_inbox.to_string(),
        tooted_at: now_millis(),
        status_id,
        content: "<p>hello</p>".to_string(),
    }
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_seeds_accounts() {
        let fixture = TestFixture::new();
        let account = fixture.add_account("blog.example.com").await;

        assert_eq!(account.handle, "blog.example.com");
        let fetched = fixture
            .repo
            .get_account("blog.example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, account);

        fixture.add_follower("blog.example.com", 1).await;
        assert_eq!(
            fixture.repo.follower_count("blog.example.com").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_both_backends_are_usable() {
        for repo in both_backends() {
            let upsert = repo
                .add_account_if_not_exist(&make_account("blog.example.com"), "")
                .await
                .unwrap();
            assert!(upsert.is_new());
            assert!(repo.account_exists("blog.example.com").await.unwrap());
        }
    }

    #[test]
    fn test_builders_vary_by_input() {
        assert_ne!(make_follower(1).user_url, make_follower(2).user_url);
        assert_eq!(
            make_feed_post("https://a/posts/1").guid_hash,
            make_toot("https://a/posts/1", 7).guid_hash
        );
    }
}
