use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::normalize_required;

/// How a driver wants the combined route value paid out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentPreference {
    /// Everything is paid with the weekly batta run.
    AllBatta,
    /// Everything is paid with the monthly salary run.
    AllSalary,
    /// Batta rate weekly, salary rate monthly.
    #[default]
    Split,
}

impl PaymentPreference {
    pub const ALL: [PaymentPreference; 3] = [
        PaymentPreference::Split,
        PaymentPreference::AllBatta,
        PaymentPreference::AllSalary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPreference::AllBatta => "ALL_BATTA",
            PaymentPreference::AllSalary => "ALL_SALARY",
            PaymentPreference::Split => "SPLIT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentPreference::AllBatta => "All weekly batta",
            PaymentPreference::AllSalary => "All monthly salary",
            PaymentPreference::Split => "Split batta / salary",
        }
    }
}

impl fmt::Display for PaymentPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPreference(pub String);

impl fmt::Display for UnknownPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown payment preference `{}`", self.0)
    }
}

impl std::error::Error for UnknownPreference {}

impl FromStr for PaymentPreference {
    type Err = UnknownPreference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL_BATTA" => Ok(PaymentPreference::AllBatta),
            "ALL_SALARY" => Ok(PaymentPreference::AllSalary),
            "SPLIT" => Ok(PaymentPreference::Split),
            other => Err(UnknownPreference(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub vehicle_id: String,
    pub preference: PaymentPreference,
}

/// A driver registration that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDriver {
    pub name: String,
    pub vehicle_id: String,
    pub preference: PaymentPreference,
}

impl NewDriver {
    /// Returns `None` when the name or vehicle is blank.
    pub fn parse(name: &str, vehicle_id: &str, preference: PaymentPreference) -> Option<Self> {
        Some(Self {
            name: normalize_required(name)?,
            vehicle_id: normalize_required(vehicle_id)?,
            preference,
        })
    }

    pub fn into_driver(self) -> Driver {
        Driver {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            vehicle_id: self.vehicle_id,
            preference: self.preference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_block_registration() {
        assert!(NewDriver::parse("  ", "KA-01", PaymentPreference::Split).is_none());
        assert!(NewDriver::parse("Ravi", "", PaymentPreference::Split).is_none());
    }

    #[test]
    fn registration_trims_input() {
        let new = NewDriver::parse(" Ravi ", " KA-01 ", PaymentPreference::AllBatta).unwrap();
        assert_eq!(new.name, "Ravi");
        assert_eq!(new.vehicle_id, "KA-01");
    }

    #[test]
    fn preference_uses_screaming_case_on_the_wire() {
        let json = serde_json::to_string(&PaymentPreference::AllSalary).unwrap();
        assert_eq!(json, "\"ALL_SALARY\"");
        assert_eq!("SPLIT".parse::<PaymentPreference>(), Ok(PaymentPreference::Split));
        assert!("weekly".parse::<PaymentPreference>().is_err());
    }
}
