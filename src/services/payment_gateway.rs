use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::{GatewayProvider, PaymentGatewayConfig};
use crate::core::AppError;

/// Everything the provider needs to open a payment page.
#[derive(Debug)]
pub struct PaymentRequest<'a> {
    pub amount: &'a BigDecimal,
    pub currency: &'a str,
    pub description: String,
    pub callback_url: &'a str,
    pub email: &'a str,
    pub mobile: &'a str,
}

#[derive(Debug, Clone)]
pub struct PaymentInitiation {
    pub authority: String,
    pub payment_url: String,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct PaymentVerification {
    pub reference: String,
    pub raw: Value,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Error connecting to the gateway server: {0}")]
    Transport(String),
    #[error("{0}")]
    Rejected(String),
    #[error("amount {0} cannot be charged")]
    InvalidAmount(BigDecimal),
}

impl From<GatewayError> for AppError {
    fn from(error: GatewayError) -> Self {
        AppError::gateway_error(error)
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: &PaymentRequest<'_>)
        -> Result<PaymentInitiation, GatewayError>;

    async fn verify(
        &self,
        authority: &str,
        amount: &BigDecimal,
    ) -> Result<PaymentVerification, GatewayError>;
}

pub fn build_gateway(
    config: &PaymentGatewayConfig,
) -> Result<Arc<dyn PaymentGateway>, anyhow::Error> {
    let gateway: Arc<dyn PaymentGateway> = match config.provider {
        GatewayProvider::Zarinpal => Arc::new(ZarinpalGateway::new(config)?),
        GatewayProvider::Mock => Arc::new(MockBankGateway::new(
            config.mock_success_rate,
            config.callback_url.clone(),
        )),
    };

    Ok(gateway)
}

/// The provider works in whole units; fractions are dropped.
fn whole_amount(amount: &BigDecimal) -> Result<i64, GatewayError> {
    amount
        .with_scale(0)
        .to_i64()
        .filter(|value| *value >= 0)
        .ok_or_else(|| GatewayError::InvalidAmount(amount.clone()))
}

#[derive(Debug, Deserialize)]
struct ZarinpalEnvelope {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    errors: Value,
}

impl ZarinpalEnvelope {
    fn code(&self) -> Option<i64> {
        self.data.get("code").and_then(Value::as_i64)
    }

    fn error_message(&self, fallback: &str) -> String {
        match &self.errors {
            Value::Null => fallback.to_string(),
            Value::Array(items) if items.is_empty() => fallback.to_string(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.errors.to_string()),
            other => other.to_string(),
        }
    }
}

pub struct ZarinpalGateway {
    http_client: reqwest::Client,
    merchant_id: Secret<String>,
    base_url: String,
}

impl ZarinpalGateway {
    pub fn new(config: &PaymentGatewayConfig) -> Result<Self, reqwest::Error> {
        Self::with_base_url(
            config.merchant_id.clone(),
            &config.base_url,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn with_base_url(
        merchant_id: Secret<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            merchant_id,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn start_pay_url(&self, authority: &str) -> String {
        format!("{}/pg/StartPay/{}", self.base_url, authority)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ZarinpalEnvelope, GatewayError> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        response
            .json::<ZarinpalEnvelope>()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for ZarinpalGateway {
    #[tracing::instrument(name = "Zarinpal payment request", skip(self, request), fields(amount = %request.amount))]
    async fn initiate(
        &self,
        request: &PaymentRequest<'_>,
    ) -> Result<PaymentInitiation, GatewayError> {
        let body = json!({
            "merchant_id": self.merchant_id.expose_secret(),
            "amount": whole_amount(request.amount)?,
            "description": request.description,
            "callback_url": request.callback_url,
            "metadata": {
                "email": request.email,
                "mobile": request.mobile,
            },
            "currency": request.currency,
        });

        let envelope = self.post("/pg/v4/payment/request.json", &body).await?;

        let authority = envelope
            .data
            .get("authority")
            .and_then(Value::as_str)
            .filter(|_| envelope.code() == Some(100));

        match authority {
            Some(authority) => Ok(PaymentInitiation {
                authority: authority.to_string(),
                payment_url: self.start_pay_url(authority),
                raw: envelope.data.clone(),
            }),
            None => {
                let message = envelope.error_message("Unspecified error");
                tracing::warn!(gateway.message = %message, "payment request rejected");
                Err(GatewayError::Rejected(message))
            }
        }
    }

    #[tracing::instrument(name = "Zarinpal payment verify", skip(self, amount))]
    async fn verify(
        &self,
        authority: &str,
        amount: &BigDecimal,
    ) -> Result<PaymentVerification, GatewayError> {
        let body = json!({
            "merchant_id": self.merchant_id.expose_secret(),
            "amount": whole_amount(amount)?,
            "authority": authority,
        });

        let envelope = self.post("/pg/v4/payment/verify.json", &body).await?;

        match envelope.code() {
            Some(100) | Some(101) => {
                let reference = match envelope.data.get("ref_id") {
                    Some(Value::String(reference)) => reference.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Ok(PaymentVerification {
                    reference,
                    raw: envelope.data.clone(),
                })
            }
            _ => {
                let message = envelope.error_message("Payment confirmation failed.");
                tracing::warn!(gateway.message = %message, "payment verification rejected");
                Err(GatewayError::Rejected(message))
            }
        }
    }
}

/// In-process stand-in for a bank; succeeds with probability `success_rate`.
pub struct MockBankGateway {
    success_rate: f64,
    callback_url: String,
}

impl MockBankGateway {
    pub fn new(success_rate: f64, callback_url: String) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            callback_url,
        }
    }

    fn generate_code(length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(|byte| char::from(byte).to_ascii_uppercase())
            .collect()
    }

    fn roll(&self) -> bool {
        rand::thread_rng().gen_bool(self.success_rate)
    }
}

#[async_trait]
impl PaymentGateway for MockBankGateway {
    async fn initiate(
        &self,
        request: &PaymentRequest<'_>,
    ) -> Result<PaymentInitiation, GatewayError> {
        if !self.roll() {
            return Err(GatewayError::Rejected(
                "Mock bank declined the request".to_string(),
            ));
        }

        let authority = Self::generate_code(16);
        let payment_url = format!(
            "{}?Authority={}&Status=OK",
            self.callback_url, authority
        );

        Ok(PaymentInitiation {
            raw: json!({
                "authority": authority,
                "amount": request.amount.to_string(),
                "message": "Mock payment initiated",
            }),
            authority,
            payment_url,
        })
    }

    async fn verify(
        &self,
        authority: &str,
        _amount: &BigDecimal,
    ) -> Result<PaymentVerification, GatewayError> {
        if !self.roll() {
            return Err(GatewayError::Rejected(
                "Payment declined by mock bank".to_string(),
            ));
        }

        let reference = Self::generate_code(20);
        Ok(PaymentVerification {
            raw: json!({ "authority": authority, "ref_id": reference }),
            reference,
        })
    }
}
