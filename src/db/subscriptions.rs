use crate::core::AppError;
use crate::models::subscriptions::{Subscription, SubscriptionPlan, SubscriptionStatus};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

const PLAN_COLUMNS: &str = "id, name, slug, description, price, currency, duration_days, level, \
     is_active, created_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, status, start_date, end_date, \
     auto_renew, cancelled_at, created_at, updated_at";

// Plans
pub async fn get_active_plans<'e>(
    executor: impl PgExecutor<'e>,
) -> Result<Vec<SubscriptionPlan>, AppError> {
    let plans = sqlx::query_as::<_, SubscriptionPlan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE is_active = TRUE ORDER BY level, price"
    ))
    .fetch_all(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(plans)
}

pub async fn get_plan_by_id<'e>(
    executor: impl PgExecutor<'e>,
    plan_id: i64,
) -> Result<SubscriptionPlan, AppError> {
    sqlx::query_as::<_, SubscriptionPlan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1"
    ))
    .bind(plan_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?
    .ok_or_else(|| AppError::not_found("Subscription plan not found"))
}

pub async fn get_active_plan_by_slug<'e>(
    executor: impl PgExecutor<'e>,
    slug: &str,
) -> Result<SubscriptionPlan, AppError> {
    sqlx::query_as::<_, SubscriptionPlan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE slug = $1 AND is_active = TRUE"
    ))
    .bind(slug)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?
    .ok_or_else(|| AppError::not_found("Subscription plan not found"))
}

// Subscriptions
pub async fn find_subscription<'e>(
    executor: impl PgExecutor<'e>,
    subscription_id: i64,
) -> Result<Option<Subscription>, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"
    ))
    .bind(subscription_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(subscription)
}

pub async fn get_user_subscription<'e>(
    executor: impl PgExecutor<'e>,
    subscription_id: i64,
    user_id: i64,
) -> Result<Subscription, AppError> {
    sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1 AND user_id = $2"
    ))
    .bind(subscription_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?
    .ok_or_else(|| AppError::not_found("Subscription not found"))
}

/// Row-locks the subscription for the rest of the surrounding transaction.
pub async fn lock_user_subscription<'e>(
    executor: impl PgExecutor<'e>,
    subscription_id: i64,
    user_id: i64,
) -> Result<Subscription, AppError> {
    sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(subscription_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?
    .ok_or_else(|| AppError::not_found("Subscription not found"))
}

pub async fn get_user_subscriptions<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<Vec<Subscription>, AppError> {
    let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1 ORDER BY start_date DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(subscriptions)
}

/// The user's pending or active subscription, if any.
pub async fn get_live_subscription<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<Option<Subscription>, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
        WHERE user_id = $1 AND status IN ('pending', 'active')
        ORDER BY start_date DESC
        LIMIT 1
        FOR UPDATE
        "#
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(subscription)
}

/// Active and unexpired subscription together with its plan.
pub async fn get_current_subscription(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<(Subscription, SubscriptionPlan)>, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
        WHERE user_id = $1 AND status = 'active' AND end_date >= NOW()
        ORDER BY end_date DESC
        LIMIT 1
        "#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    match subscription {
        Some(subscription) => {
            let plan = get_plan_by_id(pool, subscription.plan_id).await?;
            Ok(Some((subscription, plan)))
        }
        None => Ok(None),
    }
}

/// Level of the user's current plan, 0 when nothing is active.
pub async fn get_subscription_level<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<i32, AppError> {
    let level: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT MAX(p.level)
        FROM subscriptions s
        JOIN subscription_plans p ON p.id = s.plan_id
        WHERE s.user_id = $1 AND s.status = 'active' AND s.end_date >= NOW()
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(level.unwrap_or(0))
}

pub async fn insert_pending_subscription<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    plan_id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<Subscription, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        INSERT INTO subscriptions (user_id, plan_id, status, start_date, end_date)
        VALUES ($1, $2, 'pending', $3, $4)
        RETURNING {SUBSCRIPTION_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(plan_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::conflict("User already has a pending or active subscription")
        }
        other => AppError::db_error(other),
    })?;

    Ok(subscription)
}

/// Sets plan, period and status in one statement; used by activation, upgrade and renewal.
pub async fn apply_period<'e>(
    executor: impl PgExecutor<'e>,
    subscription_id: i64,
    plan_id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<Subscription, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        UPDATE subscriptions
        SET plan_id = $2, start_date = $3, end_date = $4, status = 'active', updated_at = NOW()
        WHERE id = $1
        RETURNING {SUBSCRIPTION_COLUMNS}
        "#
    ))
    .bind(subscription_id)
    .bind(plan_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::conflict("User already has a pending or active subscription")
        }
        other => AppError::from(other),
    })?;

    Ok(subscription)
}

pub async fn cancel_subscription<'e>(
    executor: impl PgExecutor<'e>,
    subscription_id: i64,
    now: DateTime<Utc>,
) -> Result<Subscription, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        UPDATE subscriptions
        SET status = $2, cancelled_at = $3, end_date = $3, auto_renew = FALSE, updated_at = NOW()
        WHERE id = $1
        RETURNING {SUBSCRIPTION_COLUMNS}
        "#
    ))
    .bind(subscription_id)
    .bind(SubscriptionStatus::Cancelled)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(subscription)
}

pub async fn delete_subscription<'e>(
    executor: impl PgExecutor<'e>,
    subscription_id: i64,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM subscriptions WHERE id = $1")
        .bind(subscription_id)
        .execute(executor)
        .await
        .map_err(AppError::db_error)?;

    Ok(())
}

/// Marks the user's lapsed active subscriptions as expired.
pub async fn expire_lapsed_for_user<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET status = 'expired', updated_at = NOW()
        WHERE user_id = $1 AND status = 'active' AND end_date < NOW()
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected())
}

pub async fn expire_all_lapsed<'e>(executor: impl PgExecutor<'e>) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET status = 'expired', updated_at = NOW()
        WHERE status = 'active' AND end_date < NOW()
        "#,
    )
    .execute(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected())
}
