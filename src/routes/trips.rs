use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;

use super::{blocked, format_timestamp, redirect_with_notice, Layout};
use crate::{error::AppError, models::NewTrip, notice, state::AppState};

const RECENT_TRIPS: usize = 25;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(trip_form).post(log_trip))
}

#[derive(Clone)]
struct SelectOption {
    value: String,
    label: String,
    selected: bool,
}

#[derive(Clone)]
struct TripRow {
    driver: String,
    route: String,
    vehicle_id: String,
    logged_at: String,
    settled_weekly: bool,
    settled_monthly: bool,
}

#[derive(Template)]
#[template(path = "trips.html")]
struct TripsTemplate {
    layout: Layout,
    drivers: Vec<SelectOption>,
    routes: Vec<SelectOption>,
    recent: Vec<TripRow>,
}

#[derive(Deserialize, Default)]
struct TripsQuery {
    driver: Option<String>,
}

async fn trip_form(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<TripsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (jar, notice) = notice::take(jar);
    let ledger = state.ledger.lock().await;
    let snapshot = ledger.snapshot();

    let drivers = snapshot
        .drivers
        .iter()
        .map(|driver| SelectOption {
            value: driver.id.clone(),
            label: driver.name.clone(),
            selected: query.driver.as_deref() == Some(driver.id.as_str()),
        })
        .collect();
    let routes = snapshot
        .routes
        .iter()
        .map(|route| SelectOption {
            value: route.id.clone(),
            label: route.label(),
            selected: false,
        })
        .collect();
    let recent = snapshot
        .trips
        .iter()
        .take(RECENT_TRIPS)
        .map(|trip| TripRow {
            driver: snapshot
                .driver(&trip.driver_id)
                .map(|driver| driver.name.clone())
                .unwrap_or_else(|| "Removed driver".into()),
            route: snapshot
                .route(&trip.route_id)
                .map(|route| route.label())
                .unwrap_or_else(|| "Removed route".into()),
            vehicle_id: trip.vehicle_id.clone(),
            logged_at: format_timestamp(trip.timestamp),
            settled_weekly: trip.settled_weekly,
            settled_monthly: trip.settled_monthly,
        })
        .collect();

    Ok((
        jar,
        AskamaTemplateResponse::into_response(TripsTemplate {
            layout: Layout::new("trips", ledger.mode(), notice),
            drivers,
            routes,
            recent,
        }),
    ))
}

#[derive(Deserialize)]
struct TripForm {
    #[serde(default)]
    driver_id: String,
    #[serde(default)]
    route_id: String,
}

/// Keeps the driver selected so several trips can be logged in a row.
async fn log_trip(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<TripForm>,
) -> (PrivateCookieJar, Redirect) {
    let Some(new) = NewTrip::parse(&form.driver_id, &form.route_id) else {
        return blocked(jar, "Select a driver and a route.", "/trips");
    };
    let mut ledger = state.ledger.lock().await;
    let back = match ledger.snapshot().driver(&new.driver_id) {
        Some(driver) => format!("/trips?driver={}", driver.id),
        None => "/trips".to_string(),
    };
    let result = ledger.log_trip(new).await;
    redirect_with_notice(jar, result, &back, |_| "Trip logged.".to_string())
}
