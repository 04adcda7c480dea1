//! Proptest generators for property-based testing.

use proptest::prelude::*;

use mynah_core::{guid_hash, FeedPost, FollowerInfo, NewAccount, NewQueueItem};

/// Generate a feed-host style handle.
pub fn handle() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}\\.[a-z]{2,5}".prop_map(String::from)
}

/// Generate a post guid (usually the item's URL).
pub fn guid() -> impl Strategy<Value = String> {
    "https://[a-z]{1,10}\\.[a-z]{2,4}/posts/[0-9]{1,6}".prop_map(String::from)
}

/// Generate a millisecond timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Generate a new mirrored account for a random handle.
pub fn new_account() -> impl Strategy<Value = NewAccount> {
    (handle(), timestamp()).prop_map(|(handle, created_at)| NewAccount {
        created_at,
        user_url: format!("https://bridge.example/u/{}", handle),
        name: format!("Mirror of {}", handle),
        summary: String::new(),
        profile_image_url: String::new(),
        site_url: format!("https://{}", handle),
        feed_url: format!("https://{}/rss", handle),
        pub_key: "PUB".to_string(),
        handle,
    })
}

/// Generate a remote follower.
pub fn follower_info() -> impl Strategy<Value = FollowerInfo> {
    ("[a-z][a-z0-9]{0,11}", "[a-z][a-z0-9-]{0,15}\\.[a-z]{2,5}").prop_map(|(user, host)| {
        FollowerInfo {
            user_url: format!("https://{}/users/{}", host, user),
            handle: user,
            shared_inbox: format!("https://{}/inbox", host),
            host,
        }
    })
}

/// Generate a feed post with a guid-derived hash.
pub fn feed_post() -> impl Strategy<Value = FeedPost> {
    (guid(), timestamp()).prop_map(|(guid, post_time)| FeedPost {
        guid_hash: guid_hash(&guid),
        post_time,
        title: format!("Post at {}", guid),
        description: String::new(),
        link: guid,
    })
}

/// Generate a pending delivery.
pub fn queue_item() -> impl Strategy<Value = NewQueueItem> {
    (handle(), "[a-z]{1,10}", timestamp(), any::<u64>()).prop_map(
        |(handle, host, tooted_at, status_id)| NewQueueItem {
            sending_handle: handle,
            to_inbox: format!("https://{}.example/inbox", host),
            tooted_at,
            status_id,
            content: "<p>hello</p>".to_string(),
        },
    )
}
