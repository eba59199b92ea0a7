pub mod driver;
pub mod route;
pub mod settlement;
pub mod trip;

use chrono::{DateTime, SubsecRound, Utc};

pub use driver::{Driver, NewDriver, PaymentPreference};
pub use route::{NewRoute, Route};
pub use settlement::{Cadence, Settlement};
pub use trip::{NewTrip, Trip};

pub(crate) fn normalize_required(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Current time at the millisecond precision both stores keep.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
