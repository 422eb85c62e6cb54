mod error;
mod http;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use payments::PaymentProcessor;
use site_api::PriceRange;
use topic_engine::{DurableLog, Topic};

pub use error::ApiError;

/// Everything the handlers touch, injected once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast topic for video submissions.
    pub videos: Arc<Topic>,
    /// Persist-only log of RSVPs.
    pub rsvps: Arc<DurableLog>,
    pub price_range: PriceRange,
    /// Publishable key the browser needs for the payment form.
    pub payment_client_key: String,
    pub payments: Arc<dyn PaymentProcessor>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/submitVideo", post(http::handle_submit_video))
        .route("/videoSubmissions", get(ws::handle_ws))
        .route("/register", post(http::handle_register))
        .route("/pay/deets", get(http::handle_pay_deets))
        .route("/pay/new", post(http::handle_pay_new))
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
