use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use payments::StripeConfig;
use site_api::PriceRange;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "site-server", about = "Event site backend: RSVPs, payments, live submissions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить HTTP + WebSocket сервер
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML-конфигу
    #[arg(long, default_value = "config.toml", env = "SITE_CONFIG")]
    pub config: String,

    /// Listen address, overrides `http` from the config file
    #[arg(long)]
    pub http: Option<String>,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_http")]
    pub http: String,
    /// Лог видео-заявок, проигрывается каждому новому зрителю.
    #[serde(default = "default_videos_log")]
    pub videos_log: PathBuf,
    /// Log of RSVPs.
    #[serde(default = "default_rsvp_log")]
    pub rsvp_log: PathBuf,
    /// JSON file with `server_secret` and `client_secret`.
    #[serde(default = "default_secrets")]
    pub secrets: PathBuf,
    /// Сколько live-записей может ждать в очереди зрителя до его отключения.
    #[serde(default = "default_ws_buffer")]
    pub ws_buffer: usize,
    pub price_range: PriceRange,
    #[serde(default)]
    pub stripe: StripeConfig,
}

fn default_http() -> String {
    "127.0.0.1:8025".into()
}
fn default_videos_log() -> PathBuf {
    "../videoSubmissions.json".into()
}
fn default_rsvp_log() -> PathBuf {
    "../data.json".into()
}
fn default_secrets() -> PathBuf {
    "../secrets.json".into()
}
fn default_ws_buffer() -> usize {
    4096
}

impl SiteConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content).map_err(|e| match e {
            ServerError::Config { context, detail } => ServerError::Config {
                context,
                detail: format!("'{path}': {detail}"),
            },
            other => other,
        })
    }

    pub fn parse(toml_str: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ServerError::Config { context: "parse", detail: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServerError> {
        let range = &self.price_range;
        if range.end.time < range.start.time {
            return Err(ServerError::Config {
                context: "price_range",
                detail: format!("end.time {} is before start.time {}", range.end.time, range.start.time),
            });
        }
        if !(range.exponent.is_finite() && range.exponent > 0.0) {
            return Err(ServerError::Config {
                context: "price_range",
                detail: format!("exponent must be positive, got {}", range.exponent),
            });
        }
        if self.ws_buffer == 0 {
            return Err(ServerError::Config { context: "ws_buffer", detail: "must be at least 1".into() });
        }
        Ok(())
    }
}

// ---- Secrets ----

#[derive(Deserialize)]
pub struct Secrets {
    /// Processor API key, never leaves the server.
    pub server_secret: String,
    /// Publishable key handed to the browser.
    pub client_secret: String,
}

impl Secrets {
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path).map_err(|e| ServerError::Secrets {
            context: "read",
            detail: format!("'{}': {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| ServerError::Secrets {
            context: "parse",
            detail: format!("'{}': {e}", path.display()),
        })
    }
}
