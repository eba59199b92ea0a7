use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use tracing::debug;

use super::backend::{Change, LedgerBackend, StorageMode};
use crate::{
    db::DbPool,
    error::AppError,
    ledger::Snapshot,
    models::{Cadence, Driver, PaymentPreference, Route, Settlement, Trip},
};

/// Remote tabular backend over the `drivers`, `routes`, `trips` and
/// `settlements` tables.
#[derive(Clone)]
pub struct SqlBackend {
    db: DbPool,
}

impl SqlBackend {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    async fn insert_driver(&self, driver: &Driver) -> Result<(), AppError> {
        sqlx::query("INSERT INTO drivers (id, name, vehicle_id, preference) VALUES (?1, ?2, ?3, ?4)")
            .bind(&driver.id)
            .bind(&driver.name)
            .bind(&driver.vehicle_id)
            .bind(driver.preference.as_str())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_route(&self, route: &Route) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO routes (id, origin, destination, batta_rate, salary_rate)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
        )
        .bind(&route.id)
        .bind(&route.from)
        .bind(&route.to)
        .bind(route.batta_rate.to_string())
        .bind(route.salary_rate.to_string())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO trips (id, driver_id, route_id, timestamp, vehicle_id, settled_weekly, settled_monthly)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        )
        .bind(&trip.id)
        .bind(&trip.driver_id)
        .bind(&trip.route_id)
        .bind(trip.timestamp)
        .bind(&trip.vehicle_id)
        .bind(trip.settled_weekly)
        .bind(trip.settled_monthly)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {table} WHERE id = ?1");
        sqlx::query(&sql)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Settlement insert and flag update share one transaction, settlement
    /// first.
    async fn record_settlement(&self, settlement: &Settlement) -> Result<(), AppError> {
        let trip_ids = serde_json::to_string(&settlement.trip_ids)?;
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"INSERT INTO settlements (id, driver_id, cadence, amount, timestamp, trip_ids)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )
        .bind(&settlement.id)
        .bind(&settlement.driver_id)
        .bind(settlement.cadence.as_str())
        .bind(settlement.amount.to_string())
        .bind(settlement.timestamp)
        .bind(trip_ids)
        .execute(&mut *tx)
        .await?;

        if !settlement.trip_ids.is_empty() {
            let column = match settlement.cadence {
                Cadence::Weekly => "settled_weekly",
                Cadence::Monthly => "settled_monthly",
            };
            let mut update =
                QueryBuilder::<Sqlite>::new(format!("UPDATE trips SET {column} = 1 WHERE id IN ("));
            let mut ids = update.separated(", ");
            for id in &settlement.trip_ids {
                ids.push_bind(id);
            }
            ids.push_unseparated(")");
            update.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerBackend for SqlBackend {
    fn mode(&self) -> StorageMode {
        StorageMode::Remote
    }

    async fn load(&self) -> Result<Snapshot, AppError> {
        let drivers = sqlx::query(
            "SELECT id, name, vehicle_id, preference FROM drivers ORDER BY rowid",
        )
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(driver_from_row)
        .collect::<Result<_, _>>()?;
        let routes = sqlx::query(
            "SELECT id, origin, destination, batta_rate, salary_rate FROM routes ORDER BY rowid",
        )
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(route_from_row)
        .collect::<Result<_, _>>()?;
        let trips = sqlx::query(
            r#"SELECT id, driver_id, route_id, timestamp, vehicle_id, settled_weekly, settled_monthly
               FROM trips ORDER BY timestamp DESC, rowid DESC"#,
        )
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(trip_from_row)
        .collect::<Result<_, _>>()?;
        let settlements = sqlx::query(
            r#"SELECT id, driver_id, cadence, amount, timestamp, trip_ids
               FROM settlements ORDER BY timestamp DESC, rowid DESC"#,
        )
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(settlement_from_row)
        .collect::<Result<_, _>>()?;

        Ok(Snapshot {
            drivers,
            routes,
            trips,
            settlements,
        })
    }

    async fn persist(&self, change: &Change, _next: &Snapshot) -> Result<(), AppError> {
        debug!(?change, "writing change to remote store");
        match change {
            Change::AddDriver(driver) => self.insert_driver(driver).await,
            Change::RemoveDriver(id) => self.delete_by_id("drivers", id).await,
            Change::AddRoute(route) => self.insert_route(route).await,
            Change::RemoveRoute(id) => self.delete_by_id("routes", id).await,
            Change::LogTrip(trip) => self.insert_trip(trip).await,
            Change::Settle(settlement) => self.record_settlement(settlement).await,
        }
    }
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, AppError> {
    let raw: String = row.try_get(column)?;
    Ok(Decimal::from_str(&raw)?)
}

fn driver_from_row(row: &SqliteRow) -> Result<Driver, AppError> {
    let preference: String = row.try_get("preference")?;
    Ok(Driver {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        vehicle_id: row.try_get("vehicle_id")?,
        preference: PaymentPreference::from_str(&preference)
            .map_err(|err| AppError::Other(err.into()))?,
    })
}

fn route_from_row(row: &SqliteRow) -> Result<Route, AppError> {
    Ok(Route {
        id: row.try_get("id")?,
        from: row.try_get("origin")?,
        to: row.try_get("destination")?,
        batta_rate: decimal_column(row, "batta_rate")?,
        salary_rate: decimal_column(row, "salary_rate")?,
    })
}

fn trip_from_row(row: &SqliteRow) -> Result<Trip, AppError> {
    Ok(Trip {
        id: row.try_get("id")?,
        driver_id: row.try_get("driver_id")?,
        route_id: row.try_get("route_id")?,
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        vehicle_id: row.try_get("vehicle_id")?,
        settled_weekly: row.try_get("settled_weekly")?,
        settled_monthly: row.try_get("settled_monthly")?,
    })
}

fn settlement_from_row(row: &SqliteRow) -> Result<Settlement, AppError> {
    let cadence: String = row.try_get("cadence")?;
    let trip_ids: String = row.try_get("trip_ids")?;
    Ok(Settlement {
        id: row.try_get("id")?,
        driver_id: row.try_get("driver_id")?,
        cadence: Cadence::from_str(&cadence).map_err(|err| AppError::Other(err.into()))?,
        amount: decimal_column(row, "amount")?,
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        trip_ids: serde_json::from_str(&trip_ids)?,
    })
}
