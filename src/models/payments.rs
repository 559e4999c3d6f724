use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::subscriptions::Subscription;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_purpose", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentPurpose {
    Purchase,
    Upgrade,
    Renewal,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: Option<i64>,
    pub subscription_id: Option<i64>,
    pub purpose: PaymentPurpose,
    pub amount: BigDecimal,
    pub currency: String,
    pub authority_code: Option<String>,
    pub reference_code: Option<String>,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub metadata: sqlx::types::Json<serde_json::Value>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

pub struct NewPayment<'a> {
    pub user_id: i64,
    pub plan_id: i64,
    pub subscription_id: Option<i64>,
    pub purpose: PaymentPurpose,
    pub amount: &'a BigDecimal,
    pub currency: &'a str,
}

/// Query string the provider appends when sending the user back.
#[derive(Debug, Deserialize)]
pub struct PaymentCallbackQuery {
    #[serde(rename = "Authority")]
    pub authority: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackOutcome {
    pub payment: Payment,
    pub subscription: Option<Subscription>,
    /// False when the payment had already been settled by an earlier callback.
    pub processed_now: bool,
}
