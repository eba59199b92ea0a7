use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::normalize_required;

/// A fixed-rate route. Both rates are paid per trip regardless of how often
/// the route is travelled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub from: String,
    pub to: String,
    /// Weekly component.
    pub batta_rate: Decimal,
    /// Monthly component.
    pub salary_rate: Decimal,
}

impl Route {
    pub fn total_rate(&self) -> Decimal {
        self.batta_rate + self.salary_rate
    }

    pub fn label(&self) -> String {
        format!("{} → {}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoute {
    pub from: String,
    pub to: String,
    pub batta_rate: Decimal,
    pub salary_rate: Decimal,
}

impl NewRoute {
    /// Endpoints must be present and rates non-negative. A blank rate counts
    /// as zero.
    pub fn parse(from: &str, to: &str, batta_rate: &str, salary_rate: &str) -> Option<Self> {
        Some(Self {
            from: normalize_required(from)?,
            to: normalize_required(to)?,
            batta_rate: parse_rate(batta_rate)?,
            salary_rate: parse_rate(salary_rate)?,
        })
    }

    pub fn into_route(self) -> Route {
        Route {
            id: Uuid::new_v4().to_string(),
            from: self.from,
            to: self.to,
            batta_rate: self.batta_rate,
            salary_rate: self.salary_rate,
        }
    }
}

fn parse_rate(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Decimal::ZERO);
    }
    Decimal::from_str(raw)
        .ok()
        .filter(|rate| !rate.is_sign_negative())
}
