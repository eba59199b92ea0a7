//! The single owner of fleet state. Every mutation goes through a command on
//! [`Ledger`], is made durable by the injected backend, and only then becomes
//! visible in the in-memory snapshot.

use std::{collections::HashSet, sync::Arc};

use tracing::{error, info, warn};

use crate::{
    engine::{self, Pending},
    error::AppError,
    models::{
        timestamp_now, Cadence, Driver, NewDriver, NewRoute, NewTrip, Route, Settlement, Trip,
    },
    services::{Change, LedgerBackend, StorageMode},
};

/// All four collections. Trips and settlements are kept newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub drivers: Vec<Driver>,
    pub routes: Vec<Route>,
    pub trips: Vec<Trip>,
    pub settlements: Vec<Settlement>,
}

impl Snapshot {
    pub fn driver(&self, id: &str) -> Option<&Driver> {
        self.drivers.iter().find(|driver| driver.id == id)
    }

    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.id == id)
    }

    pub fn pending_for(&self, driver: &Driver) -> Pending {
        engine::compute_pending(driver, &self.trips, &self.routes)
    }

    fn apply(&mut self, change: &Change) {
        match change {
            Change::AddDriver(driver) => self.drivers.push(driver.clone()),
            Change::RemoveDriver(id) => self.drivers.retain(|driver| &driver.id != id),
            Change::AddRoute(route) => self.routes.push(route.clone()),
            Change::RemoveRoute(id) => self.routes.retain(|route| &route.id != id),
            Change::LogTrip(trip) => self.trips.insert(0, trip.clone()),
            Change::Settle(settlement) => {
                let covered: HashSet<&str> =
                    settlement.trip_ids.iter().map(String::as_str).collect();
                for trip in &mut self.trips {
                    if covered.contains(trip.id.as_str()) {
                        trip.mark_settled(settlement.cadence);
                    }
                }
                self.settlements.insert(0, settlement.clone());
            }
        }
    }
}

pub struct Ledger {
    snapshot: Snapshot,
    backend: Arc<dyn LedgerBackend>,
}

impl Ledger {
    pub async fn open(backend: Arc<dyn LedgerBackend>) -> Result<Self, AppError> {
        let snapshot = backend.load().await?;
        info!(
            mode = %backend.mode(),
            drivers = snapshot.drivers.len(),
            routes = snapshot.routes.len(),
            trips = snapshot.trips.len(),
            settlements = snapshot.settlements.len(),
            "ledger loaded"
        );
        Ok(Self { snapshot, backend })
    }

    pub fn mode(&self) -> StorageMode {
        self.backend.mode()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn pending_for(&self, driver_id: &str) -> Option<Pending> {
        self.snapshot
            .driver(driver_id)
            .map(|driver| self.snapshot.pending_for(driver))
    }

    /// Applies `change` to a copy, persists it, and adopts the copy only when
    /// the backend accepted the write.
    async fn commit(&mut self, change: Change) -> Result<(), AppError> {
        let mut next = self.snapshot.clone();
        next.apply(&change);
        if let Err(err) = self.backend.persist(&change, &next).await {
            error!(?change, "storage write failed, ledger left unchanged: {err}");
            return Err(err);
        }
        self.snapshot = next;
        Ok(())
    }

    pub async fn add_driver(&mut self, new: NewDriver) -> Result<Driver, AppError> {
        let driver = new.into_driver();
        self.commit(Change::AddDriver(driver.clone())).await?;
        info!(driver = %driver.id, name = %driver.name, "driver registered");
        Ok(driver)
    }

    /// Trips and settlements of the driver stay where they are.
    pub async fn remove_driver(&mut self, id: &str) -> Result<Driver, AppError> {
        let driver = self.snapshot.driver(id).cloned().ok_or(AppError::NotFound)?;
        let pending = self.snapshot.pending_for(&driver);
        if !pending.is_zero() {
            warn!(
                driver = %driver.id,
                weekly = %pending.weekly,
                monthly = %pending.monthly,
                "removing driver with unsettled trips"
            );
        }
        self.commit(Change::RemoveDriver(driver.id.clone())).await?;
        info!(driver = %driver.id, "driver removed");
        Ok(driver)
    }

    pub async fn add_route(&mut self, new: NewRoute) -> Result<Route, AppError> {
        let route = new.into_route();
        self.commit(Change::AddRoute(route.clone())).await?;
        info!(route = %route.id, label = %route.label(), "route added");
        Ok(route)
    }

    /// Trips on the route stop contributing to pending amounts.
    pub async fn remove_route(&mut self, id: &str) -> Result<Route, AppError> {
        let route = self.snapshot.route(id).cloned().ok_or(AppError::NotFound)?;
        let unsettled = self
            .snapshot
            .trips
            .iter()
            .filter(|trip| trip.route_id == route.id)
            .filter(|trip| !trip.settled_weekly || !trip.settled_monthly)
            .count();
        if unsettled > 0 {
            warn!(route = %route.id, unsettled, "removing route referenced by unsettled trips");
        }
        self.commit(Change::RemoveRoute(route.id.clone())).await?;
        info!(route = %route.id, "route removed");
        Ok(route)
    }

    pub async fn log_trip(&mut self, new: NewTrip) -> Result<Trip, AppError> {
        let driver = self
            .snapshot
            .driver(&new.driver_id)
            .cloned()
            .ok_or(AppError::NotFound)?;
        if self.snapshot.route(&new.route_id).is_none() {
            return Err(AppError::NotFound);
        }
        let trip = new.into_trip(&driver, timestamp_now());
        self.commit(Change::LogTrip(trip.clone())).await?;
        info!(trip = %trip.id, driver = %trip.driver_id, route = %trip.route_id, "trip logged");
        Ok(trip)
    }

    /// Settles everything the driver is owed for `cadence`. Returns `None`
    /// and writes nothing when the pending amount is zero.
    pub async fn settle(
        &mut self,
        driver_id: &str,
        cadence: Cadence,
    ) -> Result<Option<Settlement>, AppError> {
        let driver = self.snapshot.driver(driver_id).ok_or(AppError::NotFound)?;
        let Some(settlement) = engine::plan_settlement(
            driver,
            &self.snapshot.trips,
            &self.snapshot.routes,
            cadence,
            timestamp_now(),
        ) else {
            info!(driver = %driver_id, %cadence, "nothing pending, settlement skipped");
            return Ok(None);
        };

        self.commit(Change::Settle(settlement.clone())).await?;
        info!(
            settlement = %settlement.id,
            driver = %driver_id,
            %cadence,
            amount = %settlement.amount,
            trips = settlement.trip_ids.len(),
            "settlement recorded"
        );
        Ok(Some(settlement))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::PaymentPreference;

    /// In-memory backend that can be told to reject writes.
    #[derive(Default)]
    struct MemoryBackend {
        stored: Mutex<Snapshot>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl LedgerBackend for MemoryBackend {
        fn mode(&self) -> StorageMode {
            StorageMode::Local
        }

        async fn load(&self) -> Result<Snapshot, AppError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn persist(&self, _change: &Change, next: &Snapshot) -> Result<(), AppError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Other(anyhow::anyhow!("backend offline")));
            }
            *self.stored.lock().unwrap() = next.clone();
            Ok(())
        }
    }

    async fn ledger() -> (Ledger, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::default());
        let ledger = Ledger::open(backend.clone()).await.unwrap();
        (ledger, backend)
    }

    async fn driver(ledger: &mut Ledger, preference: PaymentPreference) -> Driver {
        ledger
            .add_driver(NewDriver::parse("Ravi", "V1", preference).unwrap())
            .await
            .unwrap()
    }

    async fn route(ledger: &mut Ledger, batta: &str, salary: &str) -> Route {
        ledger
            .add_route(NewRoute::parse("A", "B", batta, salary).unwrap())
            .await
            .unwrap()
    }

    async fn trip(ledger: &mut Ledger, driver: &Driver, route: &Route) -> Trip {
        ledger
            .log_trip(NewTrip::parse(&driver.id, &route.id).unwrap())
            .await
            .unwrap()
    }

    fn settled_total(ledger: &Ledger, driver: &Driver) -> Decimal {
        ledger
            .snapshot()
            .settlements
            .iter()
            .filter(|s| s.driver_id == driver.id)
            .map(|s| s.amount)
            .sum()
    }

    #[tokio::test]
    async fn split_driver_weekly_settlement() {
        let (mut ledger, _) = ledger().await;
        let d = driver(&mut ledger, PaymentPreference::Split).await;
        let r = route(&mut ledger, "100", "300").await;
        let t = trip(&mut ledger, &d, &r).await;
        assert_eq!(t.vehicle_id, "V1");

        assert_eq!(
            ledger.pending_for(&d.id),
            Some(Pending { weekly: dec!(100), monthly: dec!(300) })
        );

        let settlement = ledger.settle(&d.id, Cadence::Weekly).await.unwrap().unwrap();
        assert_eq!(settlement.amount, dec!(100));
        assert_eq!(settlement.trip_ids, vec![t.id.clone()]);

        let stored = &ledger.snapshot().trips[0];
        assert!(stored.settled_weekly);
        assert!(!stored.settled_monthly);
        assert_eq!(
            ledger.pending_for(&d.id),
            Some(Pending { weekly: Decimal::ZERO, monthly: dec!(300) })
        );
    }

    #[tokio::test]
    async fn zero_pending_settle_is_a_no_op() {
        let (mut ledger, _) = ledger().await;
        let d = driver(&mut ledger, PaymentPreference::AllBatta).await;
        let r = route(&mut ledger, "50", "150").await;
        trip(&mut ledger, &d, &r).await;
        trip(&mut ledger, &d, &r).await;
        assert_eq!(ledger.pending_for(&d.id).unwrap().weekly, dec!(400));

        let before = ledger.snapshot().clone();
        assert!(ledger.settle(&d.id, Cadence::Monthly).await.unwrap().is_none());
        assert_eq!(ledger.snapshot(), &before);
    }

    #[tokio::test]
    async fn settling_unknown_driver_is_not_found() {
        let (mut ledger, _) = ledger().await;
        assert!(matches!(
            ledger.settle("nobody", Cadence::Weekly).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let (mut ledger, backend) = ledger().await;
        let d = driver(&mut ledger, PaymentPreference::Split).await;
        let r = route(&mut ledger, "10", "20").await;
        trip(&mut ledger, &d, &r).await;

        backend.fail.store(true, Ordering::SeqCst);
        let before = ledger.snapshot().clone();

        assert!(ledger.settle(&d.id, Cadence::Weekly).await.is_err());
        assert!(ledger
            .add_driver(NewDriver::parse("Asha", "V2", PaymentPreference::Split).unwrap())
            .await
            .is_err());
        assert!(ledger.remove_route(&r.id).await.is_err());
        assert_eq!(ledger.snapshot(), &before);

        backend.fail.store(false, Ordering::SeqCst);
        assert!(ledger.settle(&d.id, Cadence::Weekly).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleted_route_contributes_nothing() {
        let (mut ledger, _) = ledger().await;
        let d = driver(&mut ledger, PaymentPreference::Split).await;
        let kept = route(&mut ledger, "10", "20").await;
        let dropped = route(&mut ledger, "100", "300").await;
        trip(&mut ledger, &d, &kept).await;
        trip(&mut ledger, &d, &dropped).await;

        ledger.remove_route(&dropped.id).await.unwrap();
        assert_eq!(
            ledger.pending_for(&d.id),
            Some(Pending { weekly: dec!(10), monthly: dec!(20) })
        );

        let settlement = ledger.settle(&d.id, Cadence::Weekly).await.unwrap().unwrap();
        assert_eq!(settlement.amount, dec!(10));
        assert_eq!(settlement.trip_ids.len(), 2);
    }

    #[tokio::test]
    async fn logging_against_unknown_records_fails() {
        let (mut ledger, _) = ledger().await;
        let d = driver(&mut ledger, PaymentPreference::Split).await;
        let result = ledger.log_trip(NewTrip::parse(&d.id, "missing").unwrap()).await;
        assert!(matches!(result, Err(AppError::NotFound)));
        assert!(ledger.snapshot().trips.is_empty());
    }

    #[tokio::test]
    async fn removing_driver_keeps_history() {
        let (mut ledger, _) = ledger().await;
        let d = driver(&mut ledger, PaymentPreference::AllSalary).await;
        let r = route(&mut ledger, "5", "5").await;
        trip(&mut ledger, &d, &r).await;
        ledger.settle(&d.id, Cadence::Monthly).await.unwrap();

        ledger.remove_driver(&d.id).await.unwrap();
        assert!(ledger.pending_for(&d.id).is_none());
        assert_eq!(ledger.snapshot().trips.len(), 1);
        assert_eq!(ledger.snapshot().settlements.len(), 1);
        assert!(matches!(ledger.remove_driver(&d.id).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn settling_conserves_value() {
        for preference in PaymentPreference::ALL {
            let (mut ledger, _) = ledger().await;
            let d = driver(&mut ledger, preference).await;
            let r1 = route(&mut ledger, "100", "300").await;
            let r2 = route(&mut ledger, "12.50", "7.25").await;

            trip(&mut ledger, &d, &r1).await;
            trip(&mut ledger, &d, &r2).await;
            ledger.settle(&d.id, Cadence::Weekly).await.unwrap();
            trip(&mut ledger, &d, &r2).await;
            ledger.settle(&d.id, Cadence::Monthly).await.unwrap();
            trip(&mut ledger, &d, &r1).await;

            let snapshot = ledger.snapshot();
            let pending = ledger.pending_for(&d.id).unwrap();
            let accrued = engine::accrued_total(&d, &snapshot.trips, &snapshot.routes);
            assert_eq!(
                settled_total(&ledger, &d) + pending.weekly + pending.monthly,
                accrued,
                "{preference:?}"
            );
        }
    }

    #[tokio::test]
    async fn reopening_reads_back_persisted_state() {
        let (mut ledger, backend) = ledger().await;
        let d = driver(&mut ledger, PaymentPreference::Split).await;
        let r = route(&mut ledger, "1", "2").await;
        trip(&mut ledger, &d, &r).await;
        ledger.settle(&d.id, Cadence::Monthly).await.unwrap();

        let reopened = Ledger::open(backend).await.unwrap();
        assert_eq!(reopened.snapshot(), ledger.snapshot());
    }
}
