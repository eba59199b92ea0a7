pub mod catalog;
pub mod dashboard;
pub mod drivers;
pub mod settlements;
pub mod trips;

use axum::{response::Redirect, Router};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    error::AppError,
    notice::{self, Notice},
    services::StorageMode,
    state::AppState,
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(dashboard::router())
        .nest("/drivers", drivers::router())
        .nest("/routes", catalog::router())
        .nest("/trips", trips::router())
        .nest("/settlements", settlements::router())
        .nest_service("/static", ServeDir::new("static"))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Page chrome shared by every template.
pub struct Layout {
    pub active: &'static str,
    pub mode_label: &'static str,
    pub remote: bool,
    pub notice: Option<Notice>,
}

impl Layout {
    pub fn new(active: &'static str, mode: StorageMode, notice: Option<Notice>) -> Self {
        Self {
            active,
            mode_label: mode.label(),
            remote: mode == StorageMode::Remote,
            notice,
        }
    }
}

/// Turns a command result into a redirect carrying a notice. Failures have
/// already been logged by the ledger.
pub(crate) fn redirect_with_notice<T>(
    jar: PrivateCookieJar,
    result: Result<T, AppError>,
    to: &str,
    on_success: impl FnOnce(T) -> String,
) -> (PrivateCookieJar, Redirect) {
    let notice = match result {
        Ok(value) => Notice::success(on_success(value)),
        Err(AppError::NotFound) => Notice::error("That record no longer exists."),
        Err(err) => Notice::error(format!("Change was not saved: {err}")),
    };
    (notice::push(jar, &notice), Redirect::to(to))
}

pub(crate) fn blocked(jar: PrivateCookieJar, message: &str, to: &str) -> (PrivateCookieJar, Redirect) {
    (notice::push(jar, &Notice::error(message)), Redirect::to(to))
}

pub(crate) fn format_money(amount: Decimal) -> String {
    format!("₹{}", amount.round_dp(2).normalize())
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%d.%m.%Y %H:%M")
        .to_string()
}
