//! Store configuration and the built-in account bootstrap descriptor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for opening the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite database file. The parent directory is created
    /// on open if missing.
    pub db_path: PathBuf,

    /// Built-in accounts seeded the first time the database is created.
    #[serde(default)]
    pub bootstrap: Vec<BootstrapAccount>,
}

impl StoreConfig {
    /// Config with a database path and no built-in accounts.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            bootstrap: Vec::new(),
        }
    }

    /// Add a built-in account to seed on first run.
    pub fn with_bootstrap(mut self, account: BootstrapAccount) -> Self {
        self.bootstrap.push(account);
        self
    }
}

/// Descriptor for one built-in account, supplied by the embedding
/// application. The profile URL arrives pre-built because URL templating
/// lives outside this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapAccount {
    /// Unique handle of the account.
    pub handle: String,

    /// Canonical profile URL.
    pub user_url: String,

    /// Publish timestamp of the account, Unix ms.
    pub published: i64,

    /// PEM-encoded public key.
    pub pub_key: String,

    /// PEM-encoded private key; this server signs as these accounts.
    pub priv_key: String,
}
