//! Pending-payment computation and settlement planning.
//!
//! Everything here is a pure function of the records handed in. Trips whose
//! route no longer exists contribute nothing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    ledger::Snapshot,
    models::{Cadence, Driver, PaymentPreference, Route, Settlement, Trip},
};

/// Amounts owed to one driver that no settlement covers yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pending {
    pub weekly: Decimal,
    pub monthly: Decimal,
}

impl Pending {
    pub fn for_cadence(&self, cadence: Cadence) -> Decimal {
        match cadence {
            Cadence::Weekly => self.weekly,
            Cadence::Monthly => self.monthly,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.weekly.is_zero() && self.monthly.is_zero()
    }
}

/// What a single trip on `route` is worth in the `cadence` bucket.
pub fn trip_share(preference: PaymentPreference, route: &Route, cadence: Cadence) -> Decimal {
    match (preference, cadence) {
        (PaymentPreference::AllBatta, Cadence::Weekly)
        | (PaymentPreference::AllSalary, Cadence::Monthly) => route.total_rate(),
        (PaymentPreference::Split, Cadence::Weekly) => route.batta_rate,
        (PaymentPreference::Split, Cadence::Monthly) => route.salary_rate,
        (PaymentPreference::AllBatta, Cadence::Monthly)
        | (PaymentPreference::AllSalary, Cadence::Weekly) => Decimal::ZERO,
    }
}

fn route_index(routes: &[Route]) -> HashMap<&str, &Route> {
    routes.iter().map(|route| (route.id.as_str(), route)).collect()
}

fn driver_trips<'a>(driver: &'a Driver, trips: &'a [Trip]) -> impl Iterator<Item = &'a Trip> {
    trips.iter().filter(move |trip| trip.driver_id == driver.id)
}

pub fn compute_pending(driver: &Driver, trips: &[Trip], routes: &[Route]) -> Pending {
    let routes = route_index(routes);
    let mut pending = Pending::default();

    for trip in driver_trips(driver, trips) {
        let Some(route) = routes.get(trip.route_id.as_str()) else {
            continue;
        };
        if !trip.settled_weekly {
            pending.weekly += trip_share(driver.preference, route, Cadence::Weekly);
        }
        if !trip.settled_monthly {
            pending.monthly += trip_share(driver.preference, route, Cadence::Monthly);
        }
    }

    pending
}

/// Value accrued by every logged trip of the driver, settled or not.
pub fn accrued_total(driver: &Driver, trips: &[Trip], routes: &[Route]) -> Decimal {
    let routes = route_index(routes);
    driver_trips(driver, trips)
        .filter_map(|trip| routes.get(trip.route_id.as_str()))
        .map(|route| {
            trip_share(driver.preference, route, Cadence::Weekly)
                + trip_share(driver.preference, route, Cadence::Monthly)
        })
        .sum()
}

/// Builds the settlement that would clear the driver's `cadence` bucket, or
/// `None` when nothing is owed. The returned trip ids are exactly the trips
/// whose flag has to flip.
pub fn plan_settlement(
    driver: &Driver,
    trips: &[Trip],
    routes: &[Route],
    cadence: Cadence,
    now: DateTime<Utc>,
) -> Option<Settlement> {
    let amount = compute_pending(driver, trips, routes).for_cadence(cadence);
    if amount.is_zero() {
        return None;
    }

    let trip_ids = driver_trips(driver, trips)
        .filter(|trip| !trip.is_settled(cadence))
        .map(|trip| trip.id.clone())
        .collect();

    Some(Settlement::new(
        driver.id.clone(),
        cadence,
        amount,
        now,
        trip_ids,
    ))
}

#[derive(Debug, Clone)]
pub struct OutstandingDriver {
    pub driver: Driver,
    pub pending: Pending,
}

/// Fleet-wide totals for the overview page.
#[derive(Debug, Clone, Default)]
pub struct FleetSummary {
    pub disbursed: Decimal,
    pub pending_weekly: Decimal,
    pub pending_monthly: Decimal,
    /// Drivers with something owed in at least one bucket.
    pub outstanding: Vec<OutstandingDriver>,
}

pub fn fleet_summary(snapshot: &Snapshot) -> FleetSummary {
    let mut summary = FleetSummary {
        disbursed: snapshot.settlements.iter().map(|s| s.amount).sum(),
        ..FleetSummary::default()
    };

    for driver in &snapshot.drivers {
        let pending = compute_pending(driver, &snapshot.trips, &snapshot.routes);
        summary.pending_weekly += pending.weekly;
        summary.pending_monthly += pending.monthly;
        if !pending.is_zero() {
            summary.outstanding.push(OutstandingDriver {
                driver: driver.clone(),
                pending,
            });
        }
    }

    summary
}
