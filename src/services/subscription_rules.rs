//! Subscription lifecycle rules. Nothing here touches the database.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Duration, Utc};

use crate::core::AppError;
use crate::models::subscriptions::{Subscription, SubscriptionPlan, SubscriptionStatus};

/// `(start, end)` of a fresh period beginning at `now`.
pub fn subscription_period(now: DateTime<Utc>, duration_days: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    (now, now + Duration::days(i64::from(duration_days)))
}

/// Renewals stack on top of time still owed; a lapsed subscription restarts from `now`.
pub fn renewal_end_date(
    current_end: DateTime<Utc>,
    now: DateTime<Utc>,
    duration_days: i32,
) -> DateTime<Utc> {
    current_end.max(now) + Duration::days(i64::from(duration_days))
}

/// Price of moving to `new_plan` now, minus the unused share of what was paid
/// for `current_plan`. Truncated to two decimals and never negative.
pub fn prorated_upgrade_amount(
    current_plan: &SubscriptionPlan,
    new_plan: &SubscriptionPlan,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> BigDecimal {
    let period_seconds = i64::from(current_plan.duration_days.max(1)) * 86_400;
    let remaining_seconds = (end_date - now).num_seconds().clamp(0, period_seconds);

    let credit = &current_plan.price * BigDecimal::from(remaining_seconds)
        / BigDecimal::from(period_seconds);
    let amount = (&new_plan.price - credit).with_scale(2);

    if amount < BigDecimal::zero() {
        BigDecimal::zero().with_scale(2)
    } else {
        amount
    }
}

/// The provider charges whole units only; anything smaller is settled without it.
pub fn is_chargeable(amount: &BigDecimal) -> bool {
    *amount >= BigDecimal::from(1)
}

#[derive(Debug, PartialEq, Eq)]
pub enum PurchaseDecision {
    /// No live subscription: open a new pending one.
    Create,
    /// An unpaid purchase is in flight; drop it and start over.
    SupersedePending { subscription_id: i64 },
    /// A lower plan is active; treat the purchase as an upgrade of it.
    Upgrade { subscription_id: i64 },
}

/// Decides what a purchase of a plan at `requested_level` means for a user whose
/// pending or active subscription is `live` at `current_level`.
pub fn decide_purchase(
    live: Option<&Subscription>,
    current_level: i32,
    requested_level: i32,
) -> Result<PurchaseDecision, AppError> {
    let Some(live) = live else {
        return Ok(PurchaseDecision::Create);
    };

    match live.status {
        SubscriptionStatus::Pending => Ok(PurchaseDecision::SupersedePending {
            subscription_id: live.id,
        }),
        SubscriptionStatus::Active if current_level >= requested_level => Err(AppError::conflict(
            "You already have an active subscription at this level or higher",
        )),
        SubscriptionStatus::Active => Ok(PurchaseDecision::Upgrade {
            subscription_id: live.id,
        }),
        SubscriptionStatus::Expired | SubscriptionStatus::Cancelled => Ok(PurchaseDecision::Create),
    }
}

pub fn ensure_upgradable(
    subscription: &Subscription,
    current_plan: &SubscriptionPlan,
    new_plan: &SubscriptionPlan,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if !subscription.is_active_at(now) {
        return Err(AppError::conflict("Only an active subscription can be upgraded"));
    }
    if !new_plan.is_active {
        return Err(AppError::bad_request("Subscription plan is not available"));
    }
    if new_plan.level <= current_plan.level {
        return Err(AppError::bad_request(
            "Upgrades must move to a plan with a higher level",
        ));
    }
    Ok(())
}

/// `live` is the user's pending or active subscription, if any. An expired
/// subscription cannot come back while another one holds that place.
pub fn ensure_renewable(
    subscription: &Subscription,
    plan: &SubscriptionPlan,
    live: Option<&Subscription>,
) -> Result<(), AppError> {
    if subscription.status == SubscriptionStatus::Expired {
        if live.is_some_and(|other| other.id != subscription.id) {
            return Err(AppError::conflict(
                "You already have a pending or active subscription",
            ));
        }
    }

    match subscription.status {
        SubscriptionStatus::Active | SubscriptionStatus::Expired if plan.is_active => Ok(()),
        SubscriptionStatus::Active | SubscriptionStatus::Expired => {
            Err(AppError::bad_request("Subscription plan is no longer offered"))
        }
        SubscriptionStatus::Pending => Err(AppError::conflict(
            "Subscription has not been paid for yet",
        )),
        SubscriptionStatus::Cancelled => Err(AppError::conflict(
            "Cancelled subscriptions cannot be renewed",
        )),
    }
}

pub fn ensure_cancellable(subscription: &Subscription) -> Result<(), AppError> {
    match subscription.status {
        SubscriptionStatus::Pending | SubscriptionStatus::Active => Ok(()),
        SubscriptionStatus::Cancelled => Err(AppError::conflict("Subscription is already cancelled")),
        SubscriptionStatus::Expired => Err(AppError::conflict("Subscription has already expired")),
    }
}

/// Whole days left, rounded up, for an active subscription.
pub fn days_remaining(end_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (end_date - now).num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds + 86_399) / 86_400
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AppErrorType;
    use claim::{assert_err, assert_ok};
    use quickcheck_macros::quickcheck;
    use std::str::FromStr;

    fn plan(id: i64, price: &str, duration_days: i32, level: i32) -> SubscriptionPlan {
        let now = Utc::now();
        SubscriptionPlan {
            id,
            name: format!("Plan {}", id),
            slug: format!("plan-{}", id),
            description: String::new(),
            price: BigDecimal::from_str(price).unwrap(),
            currency: "IRR".to_string(),
            duration_days,
            level,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn subscription(status: SubscriptionStatus, end_date: DateTime<Utc>) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: 7,
            user_id: 1,
            plan_id: 1,
            status,
            start_date: now - Duration::days(10),
            end_date,
            auto_renew: true,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn period_spans_plan_duration() {
        let now = Utc::now();
        let (start, end) = subscription_period(now, 30);
        assert_eq!(start, now);
        assert_eq!(end - start, Duration::days(30));
    }

    #[test]
    fn renewal_extends_from_current_end_when_still_running() {
        let now = Utc::now();
        let end = now + Duration::days(5);
        assert_eq!(renewal_end_date(end, now, 30), end + Duration::days(30));
    }

    #[test]
    fn renewal_restarts_from_now_when_lapsed() {
        let now = Utc::now();
        let end = now - Duration::days(3);
        assert_eq!(renewal_end_date(end, now, 30), now + Duration::days(30));
    }

    #[test]
    fn half_used_plan_credits_half_its_price() {
        let now = Utc::now();
        let basic = plan(1, "100.00", 30, 1);
        let premium = plan(2, "300.00", 30, 2);

        let amount = prorated_upgrade_amount(&basic, &premium, now + Duration::days(15), now);
        assert_eq!(amount, BigDecimal::from_str("250.00").unwrap());
    }

    #[test]
    fn lapsed_plan_earns_no_credit() {
        let now = Utc::now();
        let basic = plan(1, "100.00", 30, 1);
        let premium = plan(2, "300.00", 30, 2);

        let amount = prorated_upgrade_amount(&basic, &premium, now - Duration::days(1), now);
        assert_eq!(amount, BigDecimal::from_str("300.00").unwrap());
    }

    #[test]
    fn credit_larger_than_new_price_clamps_to_zero() {
        let now = Utc::now();
        let yearly = plan(1, "1000.00", 365, 1);
        let monthly_premium = plan(2, "50.00", 30, 2);

        let amount =
            prorated_upgrade_amount(&yearly, &monthly_premium, now + Duration::days(300), now);
        assert!(amount.is_zero());
    }

    #[test]
    fn prorated_amount_is_truncated_not_rounded() {
        let now = Utc::now();
        let basic = plan(1, "100.00", 3, 1);
        let premium = plan(2, "100.00", 3, 2);

        // Two thirds of 100 remain: 100 - 66.666... = 33.333...
        let amount = prorated_upgrade_amount(&basic, &premium, now + Duration::days(2), now);
        assert_eq!(amount, BigDecimal::from_str("33.33").unwrap());
    }

    #[test]
    fn fractions_of_a_unit_are_not_chargeable() {
        assert!(!is_chargeable(&BigDecimal::zero()));
        assert!(!is_chargeable(&BigDecimal::from_str("0.50").unwrap()));
        assert!(!is_chargeable(&BigDecimal::from_str("0.99").unwrap()));
        assert!(is_chargeable(&BigDecimal::from(1)));
        assert!(is_chargeable(&BigDecimal::from_str("1.01").unwrap()));
    }

    #[quickcheck]
    fn prorated_amount_stays_between_zero_and_new_price(
        current_price: u32,
        new_price: u32,
        days_left: u16,
    ) -> bool {
        let now = Utc::now();
        let current = plan(1, &(current_price % 100_000).to_string(), 30, 1);
        let next = plan(2, &(new_price % 100_000).to_string(), 30, 2);
        let end = now + Duration::days(i64::from(days_left % 60));

        let amount = prorated_upgrade_amount(&current, &next, end, now);
        amount >= BigDecimal::zero() && amount <= next.price
    }

    #[test]
    fn purchase_without_live_subscription_creates_one() {
        assert_eq!(decide_purchase(None, 0, 1).unwrap(), PurchaseDecision::Create);
    }

    #[test]
    fn purchase_supersedes_unpaid_pending_subscription() {
        let pending = subscription(SubscriptionStatus::Pending, Utc::now() + Duration::days(30));
        assert_eq!(
            decide_purchase(Some(&pending), 1, 1).unwrap(),
            PurchaseDecision::SupersedePending { subscription_id: 7 }
        );
    }

    #[test]
    fn purchase_at_same_or_lower_level_conflicts() {
        let active = subscription(SubscriptionStatus::Active, Utc::now() + Duration::days(30));
        assert_err!(decide_purchase(Some(&active), 2, 2));
        assert_err!(decide_purchase(Some(&active), 2, 1));
    }

    #[test]
    fn purchase_of_higher_level_becomes_upgrade() {
        let active = subscription(SubscriptionStatus::Active, Utc::now() + Duration::days(30));
        assert_eq!(
            decide_purchase(Some(&active), 1, 2).unwrap(),
            PurchaseDecision::Upgrade { subscription_id: 7 }
        );
    }

    #[test]
    fn upgrades_must_raise_the_level() {
        let now = Utc::now();
        let active = subscription(SubscriptionStatus::Active, now + Duration::days(10));
        let basic = plan(1, "100", 30, 1);
        let same_level = plan(3, "150", 30, 1);
        let premium = plan(2, "300", 30, 2);

        assert_ok!(ensure_upgradable(&active, &basic, &premium, now));
        assert_err!(ensure_upgradable(&active, &basic, &same_level, now));
        assert_err!(ensure_upgradable(&active, &premium, &basic, now));
    }

    #[test]
    fn lapsed_subscription_cannot_be_upgraded() {
        let now = Utc::now();
        let lapsed = subscription(SubscriptionStatus::Active, now - Duration::seconds(1));
        assert_err!(ensure_upgradable(
            &lapsed,
            &plan(1, "100", 30, 1),
            &plan(2, "300", 30, 2),
            now
        ));
    }

    #[test]
    fn only_active_or_expired_subscriptions_renew() {
        let basic = plan(1, "100", 30, 1);
        let end = Utc::now();
        assert_ok!(ensure_renewable(&subscription(SubscriptionStatus::Active, end), &basic, None));
        assert_ok!(ensure_renewable(&subscription(SubscriptionStatus::Expired, end), &basic, None));
        assert_err!(ensure_renewable(&subscription(SubscriptionStatus::Pending, end), &basic, None));
        assert_err!(ensure_renewable(&subscription(SubscriptionStatus::Cancelled, end), &basic, None));
    }

    #[test]
    fn expired_subscription_cannot_renew_while_another_is_live() {
        let basic = plan(1, "100", 30, 1);
        let now = Utc::now();
        let expired = subscription(SubscriptionStatus::Expired, now - Duration::days(2));
        let mut other = subscription(SubscriptionStatus::Active, now + Duration::days(20));
        other.id = 8;

        let error = ensure_renewable(&expired, &basic, Some(&other)).unwrap_err();
        assert_eq!(error.error_type, AppErrorType::ConflictError);

        other.status = SubscriptionStatus::Pending;
        assert_err!(ensure_renewable(&expired, &basic, Some(&other)));
    }

    #[test]
    fn active_subscription_renews_even_though_it_is_the_live_one() {
        let basic = plan(1, "100", 30, 1);
        let active = subscription(SubscriptionStatus::Active, Utc::now() + Duration::days(3));
        assert_ok!(ensure_renewable(&active, &basic, Some(&active)));
    }

    #[test]
    fn cancelling_twice_is_a_conflict() {
        let end = Utc::now();
        assert_ok!(ensure_cancellable(&subscription(SubscriptionStatus::Active, end)));
        assert_ok!(ensure_cancellable(&subscription(SubscriptionStatus::Pending, end)));
        assert_err!(ensure_cancellable(&subscription(SubscriptionStatus::Cancelled, end)));
        assert_err!(ensure_cancellable(&subscription(SubscriptionStatus::Expired, end)));
    }

    #[test]
    fn days_remaining_rounds_partial_days_up() {
        let now = Utc::now();
        assert_eq!(days_remaining(now + Duration::hours(1), now), 1);
        assert_eq!(days_remaining(now + Duration::days(2), now), 2);
        assert_eq!(days_remaining(now - Duration::days(2), now), 0);
    }
}
