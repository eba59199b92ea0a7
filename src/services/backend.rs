use std::fmt;

use async_trait::async_trait;

use crate::{
    error::AppError,
    ledger::Snapshot,
    models::{Driver, Route, Settlement, Trip},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Every mutation is written to the SQL backend.
    Remote,
    /// Collections are mirrored to local JSON blobs.
    Local,
}

impl StorageMode {
    pub fn label(&self) -> &'static str {
        match self {
            StorageMode::Remote => "Cloud synchronized",
            StorageMode::Local => "Local storage mode",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One mutation of the ledger, as handed to the backend.
#[derive(Debug, Clone)]
pub enum Change {
    AddDriver(Driver),
    RemoveDriver(String),
    AddRoute(Route),
    RemoveRoute(String),
    LogTrip(Trip),
    /// Append the settlement and flip the cadence flag on every trip it lists.
    Settle(Settlement),
}

/// Durable home of the ledger. Picked once at startup.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    fn mode(&self) -> StorageMode;

    async fn load(&self) -> Result<Snapshot, AppError>;

    /// Makes `change` durable. `next` is the snapshot with the change already
    /// applied; the ledger only adopts it when this returns `Ok`.
    async fn persist(&self, change: &Change, next: &Snapshot) -> Result<(), AppError>;
}
