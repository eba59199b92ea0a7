use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampMilliSeconds};
use uuid::Uuid;

use super::{Cadence, Driver};

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub driver_id: String,
    pub route_id: String,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub timestamp: DateTime<Utc>,
    /// Vehicle the driver had registered when the trip was logged.
    pub vehicle_id: String,
    pub settled_weekly: bool,
    pub settled_monthly: bool,
}

impl Trip {
    pub fn is_settled(&self, cadence: Cadence) -> bool {
        match cadence {
            Cadence::Weekly => self.settled_weekly,
            Cadence::Monthly => self.settled_monthly,
        }
    }

    /// Flags only ever go from false to true.
    pub(crate) fn mark_settled(&mut self, cadence: Cadence) {
        match cadence {
            Cadence::Weekly => self.settled_weekly = true,
            Cadence::Monthly => self.settled_monthly = true,
        }
    }
}

/// Selection from the trip form. Both ids are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrip {
    pub driver_id: String,
    pub route_id: String,
}

impl NewTrip {
    pub fn parse(driver_id: &str, route_id: &str) -> Option<Self> {
        Some(Self {
            driver_id: super::normalize_required(driver_id)?,
            route_id: super::normalize_required(route_id)?,
        })
    }

    pub fn into_trip(self, driver: &Driver, now: DateTime<Utc>) -> Trip {
        Trip {
            id: Uuid::new_v4().to_string(),
            driver_id: self.driver_id,
            route_id: self.route_id,
            timestamp: now,
            vehicle_id: driver.vehicle_id.clone(),
            settled_weekly: false,
            settled_monthly: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn trip_serializes_millisecond_timestamp() {
        let trip = Trip {
            id: "t1".into(),
            driver_id: "d1".into(),
            route_id: "r1".into(),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            vehicle_id: "KA-01".into(),
            settled_weekly: true,
            settled_monthly: false,
        };
        let value = serde_json::to_value(&trip).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000_123_i64);
        assert_eq!(value["settledWeekly"], true);
        let back: Trip = serde_json::from_value(value).unwrap();
        assert_eq!(back, trip);
    }

    #[test]
    fn trip_form_needs_both_selections() {
        assert!(NewTrip::parse("", "r1").is_none());
        assert!(NewTrip::parse("d1", "").is_none());
        assert!(NewTrip::parse("d1", "r1").is_some());
    }
}
