use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;

use super::{blocked, format_money, redirect_with_notice, Layout};
use crate::{
    engine,
    error::AppError,
    models::{Cadence, NewDriver, PaymentPreference, Settlement},
    notice,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(drivers_list).post(register))
        .route("/:id/delete", get(delete_confirm).post(delete))
        .route("/:id/settle/:cadence", post(settle))
}

#[derive(Clone)]
struct DriverRow {
    id: String,
    name: String,
    vehicle_id: String,
    preference: &'static str,
    weekly: String,
    monthly: String,
    accrued: String,
    trip_count: usize,
}

#[derive(Clone)]
struct PreferenceOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Template)]
#[template(path = "drivers.html")]
struct DriversTemplate {
    layout: Layout,
    drivers: Vec<DriverRow>,
    preferences: Vec<PreferenceOption>,
}

async fn drivers_list(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, AppError> {
    let (jar, notice) = notice::take(jar);
    let ledger = state.ledger.lock().await;
    let snapshot = ledger.snapshot();

    let drivers = snapshot
        .drivers
        .iter()
        .map(|driver| {
            let pending = snapshot.pending_for(driver);
            DriverRow {
                id: driver.id.clone(),
                name: driver.name.clone(),
                vehicle_id: driver.vehicle_id.clone(),
                preference: driver.preference.label(),
                weekly: format_money(pending.weekly),
                monthly: format_money(pending.monthly),
                accrued: format_money(engine::accrued_total(
                    driver,
                    &snapshot.trips,
                    &snapshot.routes,
                )),
                trip_count: snapshot
                    .trips
                    .iter()
                    .filter(|trip| trip.driver_id == driver.id)
                    .count(),
            }
        })
        .collect();

    let preferences = PaymentPreference::ALL
        .iter()
        .map(|preference| PreferenceOption {
            value: preference.as_str(),
            label: preference.label(),
            selected: *preference == PaymentPreference::default(),
        })
        .collect();

    Ok((
        jar,
        AskamaTemplateResponse::into_response(DriversTemplate {
            layout: Layout::new("drivers", ledger.mode(), notice),
            drivers,
            preferences,
        }),
    ))
}

#[derive(Deserialize)]
struct DriverForm {
    name: String,
    vehicle_id: String,
    #[serde(default)]
    preference: PaymentPreference,
}

async fn register(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<DriverForm>,
) -> (PrivateCookieJar, Redirect) {
    let Some(new) = NewDriver::parse(&form.name, &form.vehicle_id, form.preference) else {
        return blocked(jar, "Driver name and vehicle are required.", "/drivers");
    };
    let mut ledger = state.ledger.lock().await;
    let result = ledger.add_driver(new).await;
    redirect_with_notice(jar, result, "/drivers", |driver| {
        format!("{} registered.", driver.name)
    })
}

#[derive(Template)]
#[template(path = "driver_delete.html")]
struct DeleteTemplate {
    layout: Layout,
    id: String,
    name: String,
    vehicle_id: String,
    weekly: String,
    monthly: String,
    has_pending: bool,
}

async fn delete_confirm(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(driver_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (jar, notice) = notice::take(jar);
    let ledger = state.ledger.lock().await;
    let driver = ledger
        .snapshot()
        .driver(&driver_id)
        .ok_or(AppError::NotFound)?;
    let pending = ledger.snapshot().pending_for(driver);

    let page = DeleteTemplate {
        layout: Layout::new("drivers", ledger.mode(), notice),
        id: driver.id.clone(),
        name: driver.name.clone(),
        vehicle_id: driver.vehicle_id.clone(),
        weekly: format_money(pending.weekly),
        monthly: format_money(pending.monthly),
        has_pending: !pending.is_zero(),
    };
    Ok((jar, AskamaTemplateResponse::into_response(page)))
}

async fn delete(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(driver_id): Path<String>,
) -> (PrivateCookieJar, Redirect) {
    let mut ledger = state.ledger.lock().await;
    let result = ledger.remove_driver(&driver_id).await;
    redirect_with_notice(jar, result, "/drivers", |driver| {
        format!("{} removed.", driver.name)
    })
}

async fn settle(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path((driver_id, cadence)): Path<(String, String)>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let cadence: Cadence = cadence.parse().map_err(|_| AppError::NotFound)?;
    let mut ledger = state.ledger.lock().await;
    let result = ledger.settle(&driver_id, cadence).await;
    Ok(redirect_with_notice(jar, result, "/", |settled| {
        describe_settlement(settled.as_ref(), cadence)
    }))
}

fn describe_settlement(settled: Option<&Settlement>, cadence: Cadence) -> String {
    match settled {
        Some(settlement) => format!(
            "{} of {} settled across {} trip(s).",
            cadence.label(),
            format_money(settlement.amount),
            settlement.trip_ids.len()
        ),
        None => format!("Nothing pending for {}.", cadence.label().to_lowercase()),
    }
}
