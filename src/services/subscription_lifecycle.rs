use std::collections::HashMap;
use std::sync::Arc;

use bigdecimal::Zero;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{Connection, PgConnection, PgPool};

use crate::core::{AppError, AppErrorType};
use crate::db::{payments, subscriptions};
use crate::models::payments::{CallbackOutcome, NewPayment, Payment, PaymentPurpose, PaymentStatus};
use crate::models::subscriptions::{
    Checkout, Subscription, SubscriptionDetail, SubscriptionOverview, SubscriptionPlan,
    SubscriptionStatus,
};
use crate::models::users::User;
use crate::services::payment_gateway::{GatewayError, PaymentGateway, PaymentRequest};
use crate::services::subscription_rules::{
    days_remaining, decide_purchase, ensure_cancellable, ensure_renewable, ensure_upgradable,
    is_chargeable, prorated_upgrade_amount, renewal_end_date, subscription_period, PurchaseDecision,
};

/// Reference recorded when an upgrade costs nothing and no provider is involved.
pub const CREDIT_REFERENCE: &str = "CREDIT";

const SUPERSEDED: &str = "superseded";
const CANCELLED_BY_USER: &str = "cancelled by user";

/// Orchestrates purchases, upgrades, renewals, cancellations and provider
/// callbacks. Database work happens in short transactions; provider calls are
/// made between them, except verification which runs under the payment row lock.
pub struct SubscriptionService {
    pool: PgPool,
    gateway: Arc<dyn PaymentGateway>,
    callback_url: String,
}

impl SubscriptionService {
    pub fn new(pool: PgPool, gateway: Arc<dyn PaymentGateway>, callback_url: String) -> Self {
        Self {
            pool,
            gateway,
            callback_url,
        }
    }

    #[tracing::instrument(name = "Purchase subscription", skip(self, user), fields(user_id = user.id))]
    pub async fn purchase(&self, user: &User, plan_id: i64) -> Result<Checkout, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        subscriptions::expire_lapsed_for_user(&mut *tx, user.id).await?;

        let plan = subscriptions::get_plan_by_id(&mut *tx, plan_id).await?;
        if !plan.is_active {
            return Err(AppError::bad_request("Subscription plan is not available"));
        }

        let live = subscriptions::get_live_subscription(&mut *tx, user.id).await?;
        let current_level = match &live {
            Some(subscription) if subscription.status == SubscriptionStatus::Active => {
                subscriptions::get_plan_by_id(&mut *tx, subscription.plan_id)
                    .await?
                    .level
            }
            _ => 0,
        };

        match decide_purchase(live.as_ref(), current_level, plan.level)? {
            PurchaseDecision::Upgrade { subscription_id } => {
                tx.commit().await?;
                tracing::info!(subscription_id, "purchase of a higher plan handled as upgrade");
                return self.upgrade(user, subscription_id, plan_id).await;
            }
            PurchaseDecision::SupersedePending { subscription_id } => {
                payments::fail_pending_for_subscription(&mut *tx, subscription_id, SUPERSEDED)
                    .await?;
                subscriptions::delete_subscription(&mut *tx, subscription_id).await?;
                tracing::info!(subscription_id, "superseded unpaid pending subscription");
            }
            PurchaseDecision::Create => {}
        }

        let (start_date, end_date) = subscription_period(now, plan.duration_days);
        let subscription =
            subscriptions::insert_pending_subscription(&mut *tx, user.id, plan.id, start_date, end_date)
                .await?;

        let payment = payments::insert_payment(
            &mut *tx,
            &NewPayment {
                user_id: user.id,
                plan_id: plan.id,
                subscription_id: Some(subscription.id),
                purpose: PaymentPurpose::Purchase,
                amount: &plan.price,
                currency: &plan.currency,
            },
        )
        .await?;

        tx.commit().await?;

        let description = format!("Payment for {} subscription purchase", plan.name);
        self.start_checkout(user, subscription, payment, description)
            .await
    }

    #[tracing::instrument(name = "Upgrade subscription", skip(self, user), fields(user_id = user.id))]
    pub async fn upgrade(
        &self,
        user: &User,
        subscription_id: i64,
        plan_id: i64,
    ) -> Result<Checkout, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        subscriptions::expire_lapsed_for_user(&mut *tx, user.id).await?;

        let subscription =
            subscriptions::lock_user_subscription(&mut *tx, subscription_id, user.id).await?;
        let current_plan = subscriptions::get_plan_by_id(&mut *tx, subscription.plan_id).await?;
        let new_plan = subscriptions::get_plan_by_id(&mut *tx, plan_id).await?;

        ensure_upgradable(&subscription, &current_plan, &new_plan, now)?;

        let amount = prorated_upgrade_amount(&current_plan, &new_plan, subscription.end_date, now);

        payments::fail_pending_for_subscription(&mut *tx, subscription.id, SUPERSEDED).await?;
        let payment = payments::insert_payment(
            &mut *tx,
            &NewPayment {
                user_id: user.id,
                plan_id: new_plan.id,
                subscription_id: Some(subscription.id),
                purpose: PaymentPurpose::Upgrade,
                amount: &amount,
                currency: &new_plan.currency,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            from_plan = current_plan.id,
            to_plan = new_plan.id,
            amount = %amount,
            "upgrade payment created"
        );

        let description = format!(
            "Upgrade from {} to {} subscription",
            current_plan.name, new_plan.name
        );
        self.start_checkout(user, subscription, payment, description)
            .await
    }

    #[tracing::instrument(name = "Renew subscription", skip(self, user), fields(user_id = user.id))]
    pub async fn renew(&self, user: &User, subscription_id: i64) -> Result<Checkout, AppError> {
        let mut tx = self.pool.begin().await?;

        subscriptions::expire_lapsed_for_user(&mut *tx, user.id).await?;

        let subscription =
            subscriptions::lock_user_subscription(&mut *tx, subscription_id, user.id).await?;
        let plan = subscriptions::get_plan_by_id(&mut *tx, subscription.plan_id).await?;
        let live = match subscription.status {
            SubscriptionStatus::Expired => {
                subscriptions::get_live_subscription(&mut *tx, user.id).await?
            }
            _ => None,
        };

        ensure_renewable(&subscription, &plan, live.as_ref())?;

        payments::fail_pending_for_subscription(&mut *tx, subscription.id, SUPERSEDED).await?;
        let payment = payments::insert_payment(
            &mut *tx,
            &NewPayment {
                user_id: user.id,
                plan_id: plan.id,
                subscription_id: Some(subscription.id),
                purpose: PaymentPurpose::Renewal,
                amount: &plan.price,
                currency: &plan.currency,
            },
        )
        .await?;

        tx.commit().await?;

        let description = format!("Renewal of {} subscription", plan.name);
        self.start_checkout(user, subscription, payment, description)
            .await
    }

    /// Cancels immediately. Nothing is refunded.
    #[tracing::instrument(name = "Cancel subscription", skip(self))]
    pub async fn cancel(&self, user_id: i64, subscription_id: i64) -> Result<Subscription, AppError> {
        let mut tx = self.pool.begin().await?;

        subscriptions::expire_lapsed_for_user(&mut *tx, user_id).await?;

        let subscription =
            subscriptions::lock_user_subscription(&mut *tx, subscription_id, user_id).await?;
        ensure_cancellable(&subscription)?;

        let cancelled = subscriptions::cancel_subscription(&mut *tx, subscription.id, Utc::now()).await?;
        payments::fail_pending_for_subscription(&mut *tx, subscription.id, "subscription cancelled")
            .await?;

        tx.commit().await?;

        Ok(cancelled)
    }

    /// Settles the payment identified by `authority`. Safe to call repeatedly:
    /// once a payment has left `pending`, later callbacks only report it.
    ///
    /// A non-`OK` status is checked with the provider as well; a payment the
    /// provider confirms is settled anyway.
    #[tracing::instrument(name = "Handle payment callback", skip(self))]
    pub async fn handle_callback(
        &self,
        authority: &str,
        status: &str,
    ) -> Result<CallbackOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let payment = payments::lock_payment_by_authority(&mut *tx, authority).await?;

        if payment.status != PaymentStatus::Pending {
            let subscription = match payment.subscription_id {
                Some(id) => subscriptions::find_subscription(&mut *tx, id).await?,
                None => None,
            };
            tx.commit().await?;
            tracing::info!(payment_id = payment.id, "callback for already settled payment");
            return Ok(CallbackOutcome {
                payment,
                subscription,
                processed_now: false,
            });
        }

        let reported_ok = status == "OK";

        let outcome = match self.gateway.verify(authority, &payment.amount).await {
            Ok(verification) => {
                if !reported_ok {
                    tracing::warn!(
                        payment_id = payment.id,
                        status,
                        "provider confirmed a payment reported as unpaid"
                    );
                }
                let metadata = json!({ "reference": verification.reference, "response": verification.raw });
                let settled =
                    payments::mark_success(&mut *tx, payment.id, &verification.reference, &metadata)
                        .await?;
                let subscription = Self::apply_payment(&mut *tx, &settled, Utc::now()).await?;
                tracing::info!(payment_id = settled.id, "payment verified");
                CallbackOutcome {
                    payment: settled,
                    subscription,
                    processed_now: true,
                }
            }
            Err(GatewayError::Transport(error)) => {
                // Leave the payment pending so the provider's retry can settle it.
                tracing::error!(payment_id = payment.id, error = %error, "could not reach gateway");
                return Err(GatewayError::Transport(error).into());
            }
            Err(_) if !reported_ok => {
                Self::fail_payment(&mut *tx, &payment, CANCELLED_BY_USER).await?
            }
            Err(error) => {
                tracing::warn!(payment_id = payment.id, error = %error, "payment verification failed");
                Self::fail_payment(&mut *tx, &payment, &error.to_string()).await?
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Current subscription summary for a user. Lapsed subscriptions are expired first.
    pub async fn overview(&self, user_id: i64) -> Result<SubscriptionOverview, AppError> {
        subscriptions::expire_lapsed_for_user(&self.pool, user_id).await?;

        let now = Utc::now();
        let overview = match subscriptions::get_current_subscription(&self.pool, user_id).await? {
            Some((subscription, plan)) => SubscriptionOverview {
                has_active_subscription: true,
                subscription_level: plan.level,
                days_remaining: Some(days_remaining(subscription.end_date, now)),
                current_subscription: Some(SubscriptionDetail::new(subscription, plan)),
            },
            None => SubscriptionOverview {
                has_active_subscription: false,
                subscription_level: 0,
                current_subscription: None,
                days_remaining: None,
            },
        };

        Ok(overview)
    }

    pub async fn user_subscriptions(&self, user_id: i64) -> Result<Vec<SubscriptionDetail>, AppError> {
        subscriptions::expire_lapsed_for_user(&self.pool, user_id).await?;

        let subscriptions = subscriptions::get_user_subscriptions(&self.pool, user_id).await?;
        let mut plans: HashMap<i64, SubscriptionPlan> = HashMap::new();
        let mut details = Vec::with_capacity(subscriptions.len());

        for subscription in subscriptions {
            let plan = match plans.get(&subscription.plan_id) {
                Some(plan) => plan.clone(),
                None => {
                    let plan = subscriptions::get_plan_by_id(&self.pool, subscription.plan_id).await?;
                    plans.insert(plan.id, plan.clone());
                    plan
                }
            };
            details.push(SubscriptionDetail::new(subscription, plan));
        }

        Ok(details)
    }

    pub async fn user_subscription(
        &self,
        user_id: i64,
        subscription_id: i64,
    ) -> Result<SubscriptionDetail, AppError> {
        subscriptions::expire_lapsed_for_user(&self.pool, user_id).await?;

        let subscription =
            subscriptions::get_user_subscription(&self.pool, subscription_id, user_id).await?;
        let plan = subscriptions::get_plan_by_id(&self.pool, subscription.plan_id).await?;

        Ok(SubscriptionDetail::new(subscription, plan))
    }

    /// Subscription level used for content access; 0 without an active subscription.
    pub async fn subscription_level(&self, user_id: i64) -> Result<i32, AppError> {
        subscriptions::expire_lapsed_for_user(&self.pool, user_id).await?;
        subscriptions::get_subscription_level(&self.pool, user_id).await
    }

    #[tracing::instrument(name = "Expire lapsed subscriptions", skip(self))]
    pub async fn expire_lapsed(&self) -> Result<u64, AppError> {
        let expired = subscriptions::expire_all_lapsed(&self.pool).await?;
        tracing::info!(expired, "lapsed subscriptions expired");
        Ok(expired)
    }

    async fn start_checkout(
        &self,
        user: &User,
        subscription: Subscription,
        payment: Payment,
        description: String,
    ) -> Result<Checkout, AppError> {
        if !is_chargeable(&payment.amount) {
            return self.settle_without_gateway(payment).await;
        }

        let request = PaymentRequest {
            amount: &payment.amount,
            currency: &payment.currency,
            description,
            callback_url: &self.callback_url,
            email: &user.email,
            mobile: &user.phone_number,
        };

        match self.gateway.initiate(&request).await {
            Ok(initiation) => {
                let payment = payments::set_authority(
                    &self.pool,
                    payment.id,
                    &initiation.authority,
                    &initiation.raw,
                )
                .await?;
                tracing::info!(payment_id = payment.id, "payment initiated");

                Ok(Checkout {
                    subscription,
                    payment,
                    payment_url: Some(initiation.payment_url),
                })
            }
            Err(error) => {
                tracing::warn!(payment_id = payment.id, error = %error, "payment initiation failed");

                let mut tx = self.pool.begin().await?;
                Self::fail_payment(&mut *tx, &payment, &error.to_string()).await?;
                tx.commit().await?;

                Err(error.into())
            }
        }
    }

    /// Nothing the provider can charge is owed, so the change applies at once.
    async fn settle_without_gateway(&self, payment: Payment) -> Result<Checkout, AppError> {
        let mut tx = self.pool.begin().await?;

        let reason = if payment.amount.is_zero() {
            "covered by unused credit"
        } else {
            "below the smallest chargeable amount"
        };
        let metadata = json!({ "reference": CREDIT_REFERENCE, "reason": reason });
        let settled = payments::mark_success(&mut *tx, payment.id, CREDIT_REFERENCE, &metadata).await?;
        let subscription = Self::apply_payment(&mut *tx, &settled, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("Subscription not found"))?;

        tx.commit().await?;

        Ok(Checkout {
            subscription,
            payment: settled,
            payment_url: None,
        })
    }

    async fn fail_payment(
        conn: &mut PgConnection,
        payment: &Payment,
        reason: &str,
    ) -> Result<CallbackOutcome, AppError> {
        let failed = payments::mark_failed(&mut *conn, payment.id, reason).await?;

        let subscription = match (payment.purpose, payment.subscription_id) {
            (PaymentPurpose::Purchase, Some(id)) => {
                subscriptions::delete_subscription(&mut *conn, id).await?;
                None
            }
            (_, Some(id)) => subscriptions::find_subscription(&mut *conn, id).await?,
            (_, None) => None,
        };

        Ok(CallbackOutcome {
            payment: failed,
            subscription,
            processed_now: true,
        })
    }

    /// Applies a successful payment to its subscription according to its purpose.
    async fn apply_payment(
        conn: &mut PgConnection,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, AppError> {
        let Some(subscription_id) = payment.subscription_id else {
            tracing::warn!(payment_id = payment.id, "settled payment has no subscription");
            return Ok(None);
        };
        let Some(subscription) = subscriptions::find_subscription(&mut *conn, subscription_id).await?
        else {
            return Ok(None);
        };

        if subscription.status == SubscriptionStatus::Cancelled {
            tracing::warn!(subscription_id, "payment settled for a cancelled subscription");
            return Ok(Some(subscription));
        }

        let plan_id = payment.plan_id.unwrap_or(subscription.plan_id);
        let plan = subscriptions::get_plan_by_id(&mut *conn, plan_id).await?;

        let (start_date, end_date) = match payment.purpose {
            PaymentPurpose::Purchase | PaymentPurpose::Upgrade => {
                subscription_period(now, plan.duration_days)
            }
            PaymentPurpose::Renewal => {
                let start_date = if subscription.end_date < now {
                    now
                } else {
                    subscription.start_date
                };
                (
                    start_date,
                    renewal_end_date(subscription.end_date, now, plan.duration_days),
                )
            }
        };

        // A verified payment must stay recorded even when the subscription
        // cannot take the new period, so the update runs under a savepoint.
        let mut savepoint = conn.begin().await?;
        match subscriptions::apply_period(&mut *savepoint, subscription.id, plan.id, start_date, end_date)
            .await
        {
            Ok(updated) => {
                savepoint.commit().await?;
                Ok(Some(updated))
            }
            Err(error) if error.error_type == AppErrorType::ConflictError => {
                savepoint.rollback().await?;
                tracing::warn!(
                    payment_id = payment.id,
                    subscription_id,
                    "paid period not applied: user already has another live subscription"
                );
                Ok(Some(subscription))
            }
            Err(error) => Err(error),
        }
    }
}

