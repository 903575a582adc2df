//! Application state shared by CLI commands.

use anyhow::{Context, Result};

use chainweave_infra::sqlite::{DatabasePool, SqliteMemoryStore, default_database_url};

/// Initialized services for a CLI invocation.
pub struct AppState {
    pub store: SqliteMemoryStore,
}

impl AppState {
    /// Open the database (creating it and its parent directory when
    /// missing) and build the store.
    pub async fn init(db_url: Option<String>) -> Result<Self> {
        let db_url = db_url.unwrap_or_else(default_database_url);

        // sqlite creates the file but not the directory
        if let Some(path) = db_url.strip_prefix("sqlite://") {
            if let Some(parent) = std::path::Path::new(path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create data dir {}", parent.display()))?;
            }
        }

        let pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("failed to open database at {db_url}"))?;

        Ok(Self {
            store: SqliteMemoryStore::new(pool),
        })
    }
}
