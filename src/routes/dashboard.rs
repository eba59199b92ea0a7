use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use axum_extra::extract::cookie::PrivateCookieJar;

use super::{format_money, Layout};
use crate::{engine::fleet_summary, error::AppError, notice, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(overview))
}

#[derive(Clone)]
struct OutstandingRow {
    driver_id: String,
    name: String,
    vehicle_id: String,
    preference: &'static str,
    weekly: String,
    monthly: String,
    can_settle_weekly: bool,
    can_settle_monthly: bool,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct OverviewTemplate {
    layout: Layout,
    disbursed: String,
    pending_weekly: String,
    pending_monthly: String,
    driver_count: usize,
    route_count: usize,
    outstanding: Vec<OutstandingRow>,
}

async fn overview(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, AppError> {
    let (jar, notice) = notice::take(jar);
    let ledger = state.ledger.lock().await;
    let snapshot = ledger.snapshot();
    let summary = fleet_summary(snapshot);

    let outstanding = summary
        .outstanding
        .into_iter()
        .map(|row| OutstandingRow {
            driver_id: row.driver.id,
            name: row.driver.name,
            vehicle_id: row.driver.vehicle_id,
            preference: row.driver.preference.label(),
            weekly: format_money(row.pending.weekly),
            monthly: format_money(row.pending.monthly),
            can_settle_weekly: !row.pending.weekly.is_zero(),
            can_settle_monthly: !row.pending.monthly.is_zero(),
        })
        .collect();

    let page = OverviewTemplate {
        layout: Layout::new("dashboard", ledger.mode(), notice),
        disbursed: format_money(summary.disbursed),
        pending_weekly: format_money(summary.pending_weekly),
        pending_monthly: format_money(summary.pending_monthly),
        driver_count: snapshot.drivers.len(),
        route_count: snapshot.routes.len(),
        outstanding,
    };
    Ok((jar, AskamaTemplateResponse::into_response(page)))
}
