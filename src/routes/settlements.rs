use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use axum_extra::extract::cookie::PrivateCookieJar;

use super::{format_money, format_timestamp, Layout};
use crate::{error::AppError, models::Cadence, notice, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(history))
}

#[derive(Clone)]
struct SettlementRow {
    id: String,
    driver: String,
    cadence: &'static str,
    weekly: bool,
    amount: String,
    settled_at: String,
    trip_count: usize,
}

#[derive(Template)]
#[template(path = "settlements.html")]
struct HistoryTemplate {
    layout: Layout,
    settlements: Vec<SettlementRow>,
}

async fn history(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, AppError> {
    let (jar, notice) = notice::take(jar);
    let ledger = state.ledger.lock().await;
    let snapshot = ledger.snapshot();

    let mut settlements: Vec<_> = snapshot.settlements.iter().collect();
    settlements.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let settlements = settlements
        .into_iter()
        .map(|settlement| SettlementRow {
            id: settlement.id.clone(),
            driver: snapshot
                .driver(&settlement.driver_id)
                .map(|driver| driver.name.clone())
                .unwrap_or_else(|| "Removed driver".into()),
            cadence: settlement.cadence.label(),
            weekly: settlement.cadence == Cadence::Weekly,
            amount: format_money(settlement.amount),
            settled_at: format_timestamp(settlement.timestamp),
            trip_count: settlement.trip_ids.len(),
        })
        .collect();

    Ok((
        jar,
        AskamaTemplateResponse::into_response(HistoryTemplate {
            layout: Layout::new("settlements", ledger.mode(), notice),
            settlements,
        }),
    ))
}
