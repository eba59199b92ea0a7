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
use crate::{error::AppError, models::NewRoute, notice, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(routes_list).post(add_route))
        .route("/:id/delete", post(delete_route))
}

#[derive(Clone)]
struct RouteRow {
    id: String,
    label: String,
    batta: String,
    salary: String,
    total: String,
}

#[derive(Template)]
#[template(path = "routes.html")]
struct RoutesTemplate {
    layout: Layout,
    routes: Vec<RouteRow>,
}

async fn routes_list(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, AppError> {
    let (jar, notice) = notice::take(jar);
    let ledger = state.ledger.lock().await;
    let routes = ledger
        .snapshot()
        .routes
        .iter()
        .map(|route| RouteRow {
            id: route.id.clone(),
            label: route.label(),
            batta: format_money(route.batta_rate),
            salary: format_money(route.salary_rate),
            total: format_money(route.total_rate()),
        })
        .collect();

    Ok((
        jar,
        AskamaTemplateResponse::into_response(RoutesTemplate {
            layout: Layout::new("routes", ledger.mode(), notice),
            routes,
        }),
    ))
}

#[derive(Deserialize)]
struct RouteForm {
    from: String,
    to: String,
    #[serde(default)]
    batta_rate: String,
    #[serde(default)]
    salary_rate: String,
}

async fn add_route(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<RouteForm>,
) -> (PrivateCookieJar, Redirect) {
    let Some(new) = NewRoute::parse(&form.from, &form.to, &form.batta_rate, &form.salary_rate)
    else {
        return blocked(
            jar,
            "Both endpoints are required and rates must be non-negative numbers.",
            "/routes",
        );
    };
    let mut ledger = state.ledger.lock().await;
    let result = ledger.add_route(new).await;
    redirect_with_notice(jar, result, "/routes", |route| {
        format!("Route {} added.", route.label())
    })
}

async fn delete_route(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(route_id): Path<String>,
) -> (PrivateCookieJar, Redirect) {
    let mut ledger = state.ledger.lock().await;
    let result = ledger.remove_route(&route_id).await;
    redirect_with_notice(jar, result, "/routes", |route| {
        format!("Route {} removed.", route.label())
    })
}
