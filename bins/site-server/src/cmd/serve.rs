use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use payments::StripeProcessor;
use topic_api_server::AppState;
use topic_engine::{DurableLog, Topic, TopicRegistry};

use crate::config::{Secrets, ServeArgs, SiteConfig};
use crate::error::ServerError;

const VIDEOS_TOPIC: &str = "videos";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("site-server starting");

    // --- Load config ---
    let config = SiteConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    let secrets = Secrets::load(&config.secrets)?;
    tracing::info!(secrets = %config.secrets.display(), "loaded secrets");

    // --- Topics ---
    let mut topics = TopicRegistry::new();
    let videos = topics.register(Topic::new(
        VIDEOS_TOPIC,
        DurableLog::new(&config.videos_log),
        config.ws_buffer,
    ));
    tracing::info!(
        topic = VIDEOS_TOPIC,
        log = %config.videos_log.display(),
        buffer = config.ws_buffer,
        "registered topic"
    );

    let rsvps = Arc::new(DurableLog::new(&config.rsvp_log));
    tracing::info!(log = %config.rsvp_log.display(), "rsvp log ready");

    // --- Payments ---
    let processor = StripeProcessor::new(secrets.server_secret, config.stripe.clone())?;
    tracing::info!(
        start = config.price_range.start.price,
        end = config.price_range.end.price,
        currency = %config.stripe.currency,
        "payment processor ready"
    );

    let state = AppState {
        videos,
        rsvps,
        price_range: config.price_range,
        payment_client_key: secrets.client_secret,
        payments: Arc::new(processor),
    };

    // --- API server (HTTP + WS) ---
    let addr = args.http.unwrap_or(config.http);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
    tracing::info!(url = %format!("http://{addr}/"), "api server (http+ws) listening");

    let token = CancellationToken::new();
    let mut api = tokio::spawn(topic_api_server::serve(listener, state, token.clone()));

    tokio::select! {
        res = &mut api => {
            res?.map_err(ServerError::Serve)?;
            tracing::warn!("api server stopped on its own");
            return Ok(());
        }
        sig = tokio::signal::ctrl_c() => sig?,
    }
    tracing::info!("shutting down...");

    // Live viewers end their sessions; the listener drains in-flight requests.
    topics.close_all();
    token.cancel();

    match tokio::time::timeout(DRAIN_TIMEOUT, &mut api).await {
        Ok(res) => res?.map_err(ServerError::Serve)?,
        Err(_) => {
            tracing::warn!("drain timed out, aborting");
            api.abort();
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
