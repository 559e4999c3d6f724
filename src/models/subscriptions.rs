use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::payments::Payment;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct SubscriptionPlan {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: BigDecimal,
    pub currency: String,
    pub duration_days: i32,
    pub level: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date >= now
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionDetail {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub plan: SubscriptionPlan,
    pub is_active: bool,
}

impl SubscriptionDetail {
    pub fn new(subscription: Subscription, plan: SubscriptionPlan) -> Self {
        let is_active = subscription.is_active_at(Utc::now());
        SubscriptionDetail {
            subscription,
            plan,
            is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionOverview {
    pub has_active_subscription: bool,
    pub subscription_level: i32,
    pub current_subscription: Option<SubscriptionDetail>,
    pub days_remaining: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub plan_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeSubscriptionRequest {
    pub plan_id: i64,
}

/// What a purchase, upgrade or renewal request produced.
#[derive(Debug, Serialize)]
pub struct Checkout {
    pub subscription: Subscription,
    pub payment: Payment,
    /// Provider page the client must be sent to; absent when nothing is due.
    pub payment_url: Option<String>,
}
