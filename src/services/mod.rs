pub mod backend;
pub mod remote;
pub mod storage;

use std::sync::Arc;

use tracing::{info, warn};

pub use backend::{Change, LedgerBackend, StorageMode};
pub use remote::SqlBackend;
pub use storage::{BlobBackend, BlobStore};

use crate::{
    config::AppConfig,
    db::{init_pool, migrate},
    error::AppError,
};

/// Chooses the storage backend once at startup. A configured but unreachable
/// database degrades to the local blob store instead of failing.
pub async fn select_backend(config: &AppConfig) -> Result<Arc<dyn LedgerBackend>, AppError> {
    if let Some(url) = config.database_url.as_deref() {
        match connect_remote(url).await {
            Ok(backend) => {
                info!("using remote store");
                return Ok(Arc::new(backend));
            }
            Err(err) => warn!("remote store unavailable, falling back to local storage: {err}"),
        }
    } else {
        info!("DATABASE_URL not set, using local storage");
    }

    let store = BlobStore::new(config.data_root.clone());
    store.ensure_structure().await?;
    Ok(Arc::new(BlobBackend::new(store)))
}

async fn connect_remote(url: &str) -> Result<SqlBackend, AppError> {
    let pool = init_pool(url).await?;
    migrate(&pool).await?;
    Ok(SqlBackend::new(pool))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use tempfile::TempDir;

    fn config(root: &TempDir, database_url: Option<String>) -> AppConfig {
        AppConfig {
            database_url,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_root: root.path().join("data"),
            cookie_secret: "test-secret".into(),
        }
    }

    #[tokio::test]
    async fn no_database_means_local_mode() {
        let root = TempDir::new().unwrap();
        let backend = select_backend(&config(&root, None)).await.unwrap();
        assert_eq!(backend.mode(), StorageMode::Local);
        assert!(root.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn reachable_database_means_remote_mode() {
        let root = TempDir::new().unwrap();
        let url = format!("sqlite://{}", root.path().join("fleet.sqlite").display());
        let backend = select_backend(&config(&root, Some(url))).await.unwrap();
        assert_eq!(backend.mode(), StorageMode::Remote);
    }

    #[tokio::test]
    async fn unreachable_database_degrades_to_local() {
        let root = TempDir::new().unwrap();
        let url = format!(
            "sqlite://{}",
            root.path().join("missing-dir").join("fleet.sqlite").display()
        );
        let backend = select_backend(&config(&root, Some(url))).await.unwrap();
        assert_eq!(backend.mode(), StorageMode::Local);
    }
}
