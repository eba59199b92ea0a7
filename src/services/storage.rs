use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tracing::{debug, error};

use super::backend::{Change, LedgerBackend, StorageMode};
use crate::{error::AppError, ledger::Snapshot, models::Settlement};

pub const DRIVERS_KEY: &str = "drive_pay_drivers";
pub const ROUTES_KEY: &str = "drive_pay_routes";
pub const TRIPS_KEY: &str = "drive_pay_trips";
pub const SETTLEMENTS_KEY: &str = "drive_pay_settlements";

/// String-keyed blob store, one file per key under `root`.
#[derive(Clone)]
pub struct BlobStore {
    root: Arc<PathBuf>,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root()).await?;
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root().join(format!("{key}.json"))
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).await?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(raw))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.ensure_structure().await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Fallback backend: every change rewrites the collections it touches.
#[derive(Clone)]
pub struct BlobBackend {
    store: BlobStore,
}

impl BlobBackend {
    pub fn new(store: BlobStore) -> Self {
        Self { store }
    }

    async fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, AppError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_collection<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), AppError> {
        let data = serde_json::to_string_pretty(items)?;
        self.store.set(key, &data).await
    }

    /// Settlements are written before trips, so flipped flags never outlive
    /// their record. A failed trips write takes the new record back out.
    async fn write_settlement(&self, settlement: &Settlement, next: &Snapshot) -> Result<(), AppError> {
        self.write_collection(SETTLEMENTS_KEY, &next.settlements).await?;
        let Err(err) = self.write_collection(TRIPS_KEY, &next.trips).await else {
            return Ok(());
        };

        let previous: Vec<&Settlement> = next
            .settlements
            .iter()
            .filter(|recorded| recorded.id != settlement.id)
            .collect();
        if let Err(rollback) = self.write_collection(SETTLEMENTS_KEY, &previous).await {
            error!(
                settlement = %settlement.id,
                "trips write failed and settlement could not be withdrawn: {rollback}"
            );
        }
        Err(err)
    }
}

#[async_trait]
impl LedgerBackend for BlobBackend {
    fn mode(&self) -> StorageMode {
        StorageMode::Local
    }

    async fn load(&self) -> Result<Snapshot, AppError> {
        Ok(Snapshot {
            drivers: self.read_collection(DRIVERS_KEY).await?,
            routes: self.read_collection(ROUTES_KEY).await?,
            trips: self.read_collection(TRIPS_KEY).await?,
            settlements: self.read_collection(SETTLEMENTS_KEY).await?,
        })
    }

    async fn persist(&self, change: &Change, next: &Snapshot) -> Result<(), AppError> {
        debug!(root = %self.store.root().display(), ?change, "mirroring ledger to blob store");
        match change {
            Change::AddDriver(_) | Change::RemoveDriver(_) => {
                self.write_collection(DRIVERS_KEY, &next.drivers).await
            }
            Change::AddRoute(_) | Change::RemoveRoute(_) => {
                self.write_collection(ROUTES_KEY, &next.routes).await
            }
            Change::LogTrip(_) => self.write_collection(TRIPS_KEY, &next.trips).await,
            Change::Settle(settlement) => self.write_settlement(settlement, next).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::Ledger,
        models::{Cadence, Driver, NewDriver, NewRoute, NewTrip, PaymentPreference},
    };
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_keys_read_as_none() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        assert_eq!(store.get(DRIVERS_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        store.set("k", "[1,2]").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("[1,2]"));
    }

    #[tokio::test]
    async fn snapshot_survives_reload() {
        let dir = TempDir::new().unwrap();
        let backend = BlobBackend::new(BlobStore::new(dir.path().to_path_buf()));
        let driver = Driver {
            id: "d1".into(),
            name: "Ravi".into(),
            vehicle_id: "KA-01".into(),
            preference: PaymentPreference::AllBatta,
        };
        let next = Snapshot {
            drivers: vec![driver.clone()],
            ..Snapshot::default()
        };
        backend
            .persist(&Change::AddDriver(driver), &next)
            .await
            .unwrap();

        let reloaded = BlobBackend::new(BlobStore::new(dir.path().to_path_buf()))
            .load()
            .await
            .unwrap();
        assert_eq!(reloaded, next);
    }

    async fn open_ledger(root: &Path) -> Ledger {
        let backend = BlobBackend::new(BlobStore::new(root.to_path_buf()));
        Ledger::open(Arc::new(backend)).await.unwrap()
    }

    #[tokio::test]
    async fn failed_trips_write_withdraws_settlement() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_ledger(dir.path()).await;
        let driver = ledger
            .add_driver(NewDriver::parse("Ravi", "KA-01", PaymentPreference::Split).unwrap())
            .await
            .unwrap();
        let route = ledger
            .add_route(NewRoute::parse("Pune", "Mumbai", "100", "300").unwrap())
            .await
            .unwrap();
        ledger
            .log_trip(NewTrip::parse(&driver.id, &route.id).unwrap())
            .await
            .unwrap();

        // A directory in the way of the temp file makes the trips write fail.
        fs::create_dir_all(dir.path().join(format!("{TRIPS_KEY}.json.tmp")))
            .await
            .unwrap();
        assert!(ledger.settle(&driver.id, Cadence::Weekly).await.is_err());
        assert!(ledger.snapshot().settlements.is_empty());

        let reopened = open_ledger(dir.path()).await;
        assert!(reopened.snapshot().settlements.is_empty());
        assert!(!reopened.snapshot().trips[0].settled_weekly);
        assert_eq!(reopened.pending_for(&driver.id).unwrap().weekly, dec!(100));
    }

    #[tokio::test]
    async fn corrupt_blob_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf());
        store.set(TRIPS_KEY, "{not json").await.unwrap();
        let backend = BlobBackend::new(store);
        assert!(matches!(
            backend.load().await,
            Err(AppError::Serialization(_))
        ));
    }
}
