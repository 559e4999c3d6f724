use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use chrono::Duration;
use claim::assert_none;
use sqlx::PgPool;
use streaming_platform::core::AppErrorType;
use streaming_platform::db::{payments, subscriptions, users};
use streaming_platform::models::payments::PaymentStatus;
use streaming_platform::models::subscriptions::{SubscriptionPlan, SubscriptionStatus};
use streaming_platform::models::users::{RegisterRequest, User};
use streaming_platform::services::payment_gateway::MockBankGateway;
use streaming_platform::services::subscription_lifecycle::CREDIT_REFERENCE;
use streaming_platform::services::SubscriptionService;

const CALLBACK_URL: &str = "http://127.0.0.1:8000/payment/callback";

/// Service backed by a mock bank that approves everything (`1.0`) or nothing (`0.0`).
fn lifecycle(pool: &PgPool, success_rate: f64) -> SubscriptionService {
    SubscriptionService::new(
        pool.clone(),
        Arc::new(MockBankGateway::new(success_rate, CALLBACK_URL.to_string())),
        CALLBACK_URL.to_string(),
    )
}

async fn create_user(pool: &PgPool) -> User {
    users::create_user(
        pool,
        &RegisterRequest {
            username: "viewer".to_string(),
            email: "viewer@example.com".to_string(),
            password: "correct horse battery".to_string(),
            first_name: None,
            last_name: None,
            phone_number: Some("09120000000".to_string()),
        },
    )
    .await
    .expect("Failed to create user")
}

async fn create_plan(
    pool: &PgPool,
    name: &str,
    price: &str,
    duration_days: i32,
    level: i32,
) -> SubscriptionPlan {
    sqlx::query_as::<_, SubscriptionPlan>(
        r#"
        INSERT INTO subscription_plans (name, slug, price, duration_days, level)
        VALUES ($1, LOWER($1), $2, $3, $4)
        RETURNING id, name, slug, description, price, currency, duration_days, level,
                  is_active, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(BigDecimal::from_str(price).unwrap())
    .bind(duration_days)
    .bind(level)
    .fetch_one(pool)
    .await
    .expect("Failed to create plan")
}

/// Buys `plan` and completes the provider round trip.
async fn buy_and_pay(service: &SubscriptionService, user: &User, plan: &SubscriptionPlan) -> i64 {
    let checkout = service.purchase(user, plan.id).await.expect("Purchase failed");
    let authority = checkout.payment.authority_code.expect("Payment has no authority");
    let outcome = service
        .handle_callback(&authority, "OK")
        .await
        .expect("Callback failed");
    assert_eq!(outcome.payment.status, PaymentStatus::Success);
    checkout.subscription.id
}

async fn lapse(pool: &PgPool, subscription_id: i64) {
    sqlx::query("UPDATE subscriptions SET end_date = NOW() - INTERVAL '1 day' WHERE id = $1")
        .bind(subscription_id)
        .execute(pool)
        .await
        .expect("Failed to backdate subscription");
}

#[sqlx::test(migrations = "./migrations")]
async fn paid_purchase_runs_for_the_plan_duration(pool: PgPool) {
    let user = create_user(&pool).await;
    let gold = create_plan(&pool, "Gold", "150000.00", 30, 2).await;
    let service = lifecycle(&pool, 1.0);

    let checkout = service.purchase(&user, gold.id).await.unwrap();
    assert_eq!(checkout.subscription.status, SubscriptionStatus::Pending);
    assert_eq!(checkout.payment.status, PaymentStatus::Pending);
    let authority = checkout.payment.authority_code.clone().unwrap();
    assert_eq!(
        checkout.payment_url,
        Some(format!("{}?Authority={}&Status=OK", CALLBACK_URL, authority))
    );

    let outcome = service.handle_callback(&authority, "OK").await.unwrap();

    assert!(outcome.processed_now);
    assert_eq!(outcome.payment.status, PaymentStatus::Success);
    assert_eq!(outcome.payment.reference_code.as_ref().map(String::len), Some(20));
    let subscription = outcome.subscription.expect("Subscription should be kept");
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(subscription.end_date - subscription.start_date, Duration::days(30));
    assert_eq!(service.subscription_level(user.id).await.unwrap(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn repeated_callback_reports_the_recorded_outcome(pool: PgPool) {
    let user = create_user(&pool).await;
    let silver = create_plan(&pool, "Silver", "90000.00", 30, 1).await;
    let service = lifecycle(&pool, 1.0);

    let checkout = service.purchase(&user, silver.id).await.unwrap();
    let authority = checkout.payment.authority_code.unwrap();
    let first = service.handle_callback(&authority, "OK").await.unwrap();

    // A declining provider proves the second call never reaches it.
    let second = lifecycle(&pool, 0.0)
        .handle_callback(&authority, "OK")
        .await
        .unwrap();

    assert!(!second.processed_now);
    assert_eq!(second.payment.status, PaymentStatus::Success);
    assert_eq!(second.payment.reference_code, first.payment.reference_code);
    assert_eq!(
        second.subscription.map(|s| s.status),
        Some(SubscriptionStatus::Active)
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn declined_purchase_discards_the_pending_subscription(pool: PgPool) {
    let user = create_user(&pool).await;
    let silver = create_plan(&pool, "Silver", "90000.00", 30, 1).await;

    let checkout = lifecycle(&pool, 1.0).purchase(&user, silver.id).await.unwrap();
    let authority = checkout.payment.authority_code.unwrap();

    let outcome = lifecycle(&pool, 0.0)
        .handle_callback(&authority, "OK")
        .await
        .unwrap();

    assert!(outcome.processed_now);
    assert_eq!(outcome.payment.status, PaymentStatus::Failed);
    assert_none!(outcome.subscription);
    assert_none!(subscriptions::find_subscription(&pool, checkout.subscription.id)
        .await
        .unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn unpaid_status_is_checked_with_the_provider(pool: PgPool) {
    let user = create_user(&pool).await;
    let silver = create_plan(&pool, "Silver", "90000.00", 30, 1).await;

    // The provider has no record of a payment: the purchase is dropped.
    let checkout = lifecycle(&pool, 1.0).purchase(&user, silver.id).await.unwrap();
    let authority = checkout.payment.authority_code.unwrap();
    let outcome = lifecycle(&pool, 0.0)
        .handle_callback(&authority, "NOK")
        .await
        .unwrap();
    assert_eq!(outcome.payment.status, PaymentStatus::Failed);
    assert_eq!(outcome.payment.failure_reason.as_deref(), Some("cancelled by user"));

    // The provider confirms the payment: a forged NOK cannot fail it.
    let checkout = lifecycle(&pool, 1.0).purchase(&user, silver.id).await.unwrap();
    let authority = checkout.payment.authority_code.unwrap();
    let outcome = lifecycle(&pool, 1.0)
        .handle_callback(&authority, "NOK")
        .await
        .unwrap();
    assert_eq!(outcome.payment.status, PaymentStatus::Success);
    assert_eq!(
        outcome.subscription.map(|s| s.status),
        Some(SubscriptionStatus::Active)
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn new_purchase_supersedes_an_unpaid_one(pool: PgPool) {
    let user = create_user(&pool).await;
    let silver = create_plan(&pool, "Silver", "90000.00", 30, 1).await;
    let service = lifecycle(&pool, 1.0);

    let abandoned = service.purchase(&user, silver.id).await.unwrap();
    let replacement = service.purchase(&user, silver.id).await.unwrap();

    assert_ne!(abandoned.subscription.id, replacement.subscription.id);
    assert_none!(subscriptions::find_subscription(&pool, abandoned.subscription.id)
        .await
        .unwrap());

    let old_payment =
        payments::lock_payment_by_authority(&pool, &abandoned.payment.authority_code.unwrap())
            .await
            .unwrap();
    assert_eq!(old_payment.status, PaymentStatus::Failed);
    assert_eq!(old_payment.failure_reason.as_deref(), Some("superseded"));
    assert_eq!(replacement.subscription.status, SubscriptionStatus::Pending);
}

#[sqlx::test(migrations = "./migrations")]
async fn fully_credited_upgrade_settles_without_the_provider(pool: PgPool) {
    let user = create_user(&pool).await;
    let yearly = create_plan(&pool, "Yearly", "1000000.00", 365, 1).await;
    let premium = create_plan(&pool, "Premium", "50000.00", 30, 2).await;
    let bank = lifecycle(&pool, 1.0);

    let subscription_id = buy_and_pay(&bank, &user, &yearly).await;

    // Nothing reaches the provider, so a declining one does not matter.
    let checkout = lifecycle(&pool, 0.0)
        .upgrade(&user, subscription_id, premium.id)
        .await
        .unwrap();

    assert!(checkout.payment.amount.is_zero());
    assert_none!(checkout.payment_url);
    assert_eq!(checkout.payment.status, PaymentStatus::Success);
    assert_eq!(checkout.payment.reference_code.as_deref(), Some(CREDIT_REFERENCE));
    assert_eq!(checkout.subscription.plan_id, premium.id);
    assert_eq!(checkout.subscription.status, SubscriptionStatus::Active);
    assert_eq!(
        checkout.subscription.end_date - checkout.subscription.start_date,
        Duration::days(30)
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn upgrade_costing_less_than_one_unit_is_settled_with_credit(pool: PgPool) {
    let user = create_user(&pool).await;
    let basic = create_plan(&pool, "Basic", "100.00", 30, 1).await;
    let plus = create_plan(&pool, "Plus", "100.50", 30, 2).await;

    let subscription_id = buy_and_pay(&lifecycle(&pool, 1.0), &user, &basic).await;

    let checkout = lifecycle(&pool, 0.0)
        .upgrade(&user, subscription_id, plus.id)
        .await
        .unwrap();

    assert!(checkout.payment.amount > BigDecimal::zero());
    assert!(checkout.payment.amount < BigDecimal::from(1));
    assert_none!(checkout.payment_url);
    assert_eq!(checkout.payment.reference_code.as_deref(), Some(CREDIT_REFERENCE));
    assert_eq!(checkout.subscription.plan_id, plus.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn cancelling_fails_pending_payments(pool: PgPool) {
    let user = create_user(&pool).await;
    let silver = create_plan(&pool, "Silver", "90000.00", 30, 1).await;
    let service = lifecycle(&pool, 1.0);

    let checkout = service.purchase(&user, silver.id).await.unwrap();
    let cancelled = service.cancel(user.id, checkout.subscription.id).await.unwrap();

    assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
    assert!(!cancelled.auto_renew);
    assert!(cancelled.cancelled_at.is_some());

    let authority = checkout.payment.authority_code.unwrap();
    let payment = payments::lock_payment_by_authority(&pool, &authority).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    let error = service.cancel(user.id, checkout.subscription.id).await.unwrap_err();
    assert_eq!(error.error_type, AppErrorType::ConflictError);
}

#[sqlx::test(migrations = "./migrations")]
async fn expired_subscription_cannot_be_renewed_while_another_is_active(pool: PgPool) {
    let user = create_user(&pool).await;
    let silver = create_plan(&pool, "Silver", "90000.00", 30, 1).await;
    let gold = create_plan(&pool, "Gold", "150000.00", 30, 2).await;
    let service = lifecycle(&pool, 1.0);

    let expired_id = buy_and_pay(&service, &user, &silver).await;
    lapse(&pool, expired_id).await;
    assert_eq!(service.expire_lapsed().await.unwrap(), 1);
    buy_and_pay(&service, &user, &gold).await;

    let error = service.renew(&user, expired_id).await.unwrap_err();

    assert_eq!(error.error_type, AppErrorType::ConflictError);
    let payments_for_user = payments::count_user_payments(&pool, user.id).await.unwrap();
    assert_eq!(payments_for_user, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn verified_renewal_is_kept_when_another_subscription_took_its_place(pool: PgPool) {
    let user = create_user(&pool).await;
    let silver = create_plan(&pool, "Silver", "90000.00", 30, 1).await;
    let gold = create_plan(&pool, "Gold", "150000.00", 30, 2).await;
    let service = lifecycle(&pool, 1.0);

    let expired_id = buy_and_pay(&service, &user, &silver).await;
    lapse(&pool, expired_id).await;
    service.expire_lapsed().await.unwrap();

    // Renewal is started but paid only after a new plan was bought.
    let renewal = service.renew(&user, expired_id).await.unwrap();
    let gold_id = buy_and_pay(&service, &user, &gold).await;

    let authority = renewal.payment.authority_code.unwrap();
    let outcome = service.handle_callback(&authority, "OK").await.unwrap();

    assert_eq!(outcome.payment.status, PaymentStatus::Success);
    assert_eq!(
        outcome.subscription.map(|s| s.status),
        Some(SubscriptionStatus::Expired)
    );
    let gold_subscription = subscriptions::find_subscription(&pool, gold_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(gold_subscription.status, SubscriptionStatus::Active);

    let retry = service.handle_callback(&authority, "OK").await.unwrap();
    assert!(!retry.processed_now);
}
