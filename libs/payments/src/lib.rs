use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════

/// A priced transaction created by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Handed to the browser to confirm the payment.
    pub client_secret: String,
    /// Committed amount in minor units, as confirmed by the processor.
    pub amount: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("processor rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid amount {0}")]
    InvalidAmount(i64),
}

/// Something that can create a priced transaction.
pub trait PaymentProcessor: Send + Sync {
    fn create_intent(
        &self,
        amount: i64,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentIntent, PaymentError>> + Send + '_>>;
}

// ═══════════════════════════════════════════════════════════════
//  Stripe
// ═══════════════════════════════════════════════════════════════

fn default_api_base() -> String {
    "https://api.stripe.com".into()
}

fn default_currency() -> String {
    "usd".into()
}

/// Static parameters of every created intent.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub statement_descriptor_suffix: Option<String>,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            currency: default_currency(),
            statement_descriptor_suffix: None,
        }
    }
}

/// Stripe `payment_intents` client.
pub struct StripeProcessor {
    http: reqwest::Client,
    secret_key: String,
    config: StripeConfig,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: String,
}

impl StripeProcessor {
    pub fn new(secret_key: impl Into<String>, config: StripeConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            secret_key: secret_key.into(),
            config,
        })
    }

    fn intent_form(&self, amount: i64) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("amount", amount.to_string()),
            ("currency", self.config.currency.clone()),
        ];
        if let Some(suffix) = &self.config.statement_descriptor_suffix {
            form.push(("statement_descriptor_suffix", suffix.clone()));
        }
        form
    }

    async fn do_create(&self, amount: i64) -> Result<PaymentIntent, PaymentError> {
        if amount <= 0 {
            return Err(PaymentError::InvalidAmount(amount));
        }

        let url = format!(
            "{}/v1/payment_intents",
            self.config.api_base.trim_end_matches('/')
        );
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&self.intent_form(amount))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let intent: PaymentIntent = resp.json().await?;
        tracing::info!(amount = intent.amount, "payment intent created");
        Ok(intent)
    }
}

impl PaymentProcessor for StripeProcessor {
    fn create_intent(
        &self,
        amount: i64,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentIntent, PaymentError>> + Send + '_>> {
        Box::pin(self.do_create(amount))
    }
}

/// Pull the human-readable message out of a Stripe error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_carries_amount_and_static_params() {
        let p = StripeProcessor::new(
            "sk_test",
            StripeConfig {
                statement_descriptor_suffix: Some("NYE 2025".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let form = p.intent_form(2750);
        assert_eq!(
            form,
            vec![
                ("amount", "2750".to_string()),
                ("currency", "usd".to_string()),
                ("statement_descriptor_suffix", "NYE 2025".to_string()),
            ]
        );
    }

    #[test]
    fn error_message_prefers_stripe_message() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Invalid API Key");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }

    #[tokio::test]
    async fn rejects_non_positive_amount_without_calling_out() {
        let p = StripeProcessor::new("sk_test", StripeConfig::default()).unwrap();
        assert!(matches!(
            p.create_intent(0).await,
            Err(PaymentError::InvalidAmount(0))
        ));
    }
}
