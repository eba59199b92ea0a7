use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampMilliSeconds};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cadence {
    Weekly,
    Monthly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Weekly => "WEEKLY",
            Cadence::Monthly => "MONTHLY",
        }
    }

    /// Lowercase form used in URLs.
    pub fn slug(&self) -> &'static str {
        match self {
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Cadence::Weekly => "Weekly batta",
            Cadence::Monthly => "Monthly salary",
        }
    }

    fn tag(&self) -> char {
        match self {
            Cadence::Weekly => 'W',
            Cadence::Monthly => 'M',
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCadence(pub String);

impl fmt::Display for UnknownCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown cadence `{}`", self.0)
    }
}

impl std::error::Error for UnknownCadence {}

impl FromStr for Cadence {
    type Err = UnknownCadence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WEEKLY" => Ok(Cadence::Weekly),
            "MONTHLY" => Ok(Cadence::Monthly),
            _ => Err(UnknownCadence(s.to_string())),
        }
    }
}

/// Immutable record of one payout covering a fixed set of trips.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub id: String,
    pub driver_id: String,
    #[serde(rename = "type")]
    pub cadence: Cadence,
    pub amount: Decimal,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub timestamp: DateTime<Utc>,
    pub trip_ids: Vec<String>,
}

impl Settlement {
    pub fn new(
        driver_id: impl Into<String>,
        cadence: Cadence,
        amount: Decimal,
        timestamp: DateTime<Utc>,
        trip_ids: Vec<String>,
    ) -> Self {
        Self {
            id: format!("S-{}-{}", cadence.tag(), Uuid::new_v4().simple()),
            driver_id: driver_id.into(),
            cadence,
            amount,
            timestamp,
            trip_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn cadence_parses_url_slugs() {
        assert_eq!("weekly".parse::<Cadence>(), Ok(Cadence::Weekly));
        assert_eq!("MONTHLY".parse::<Cadence>(), Ok(Cadence::Monthly));
        assert!("daily".parse::<Cadence>().is_err());
    }

    #[test]
    fn settlement_id_is_tagged_with_cadence() {
        let s = Settlement::new("d1", Cadence::Monthly, dec!(10), Utc::now(), vec![]);
        assert!(s.id.starts_with("S-M-"));
        let s = Settlement::new("d1", Cadence::Weekly, dec!(10), Utc::now(), vec![]);
        assert!(s.id.starts_with("S-W-"));
    }

    #[test]
    fn settlement_serializes_cadence_as_type() {
        let s = Settlement::new("d1", Cadence::Weekly, dec!(100), Utc::now(), vec!["t1".into()]);
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["type"], "WEEKLY");
        assert_eq!(value["tripIds"][0], "t1");
    }
}
