use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use site_api::{now_ms, timestamp_now, PriceRange, Rsvp};
use topic_engine::LogError;

use super::{ApiError, AppState};

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

// ═══════════════════════════════════════════════════════════════
//  POST /submitVideo
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct SubmitForm {
    #[serde(default)]
    text: String,
}

pub(crate) async fn handle_submit_video(
    State(state): State<AppState>,
    Form(form): Form<SubmitForm>,
) -> Result<StatusCode, ApiError> {
    state.videos.submit(&form.text).await?;
    Ok(StatusCode::OK)
}

// ═══════════════════════════════════════════════════════════════
//  POST /register
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct RegisterForm {
    #[serde(default)]
    email: String,
    #[serde(default, rename = "paymentIntent")]
    payment_intent: String,
}

pub(crate) async fn handle_register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<RegisterForm>,
) -> Result<StatusCode, ApiError> {
    let rsvp = Rsvp {
        timestamp: timestamp_now(),
        ip: addr.to_string(),
        email: form.email,
        payment_intent: form.payment_intent,
    };
    let record = serde_json::to_value(&rsvp).map_err(LogError::Encode)?;
    state.rsvps.append(&record).await?;

    tracing::info!(ip = %addr, "rsvp recorded");
    Ok(StatusCode::OK)
}

// ═══════════════════════════════════════════════════════════════
//  GET /pay/deets
// ═══════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct PayDeets {
    #[serde(rename = "priceRange")]
    price_range: PriceRange,
    #[serde(rename = "stripeKey")]
    stripe_key: String,
}

pub(crate) async fn handle_pay_deets(State(state): State<AppState>) -> impl IntoResponse {
    let deets = PayDeets {
        price_range: state.price_range,
        stripe_key: state.payment_client_key.clone(),
    };
    ([(header::CACHE_CONTROL, NO_CACHE)], Json(deets))
}

// ═══════════════════════════════════════════════════════════════
//  POST /pay/new
// ═══════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct NewPayment {
    client_secret: String,
    price: i64,
}

pub(crate) async fn handle_pay_new(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    // Priced here, never taken from the client.
    let price = state.price_range.interpolated_price(now_ms());
    let intent = state.payments.create_intent(price).await?;

    let body = NewPayment {
        client_secret: intent.client_secret,
        price: intent.amount,
    };
    Ok(([(header::CACHE_CONTROL, NO_CACHE)], Json(body)))
}
