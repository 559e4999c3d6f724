use crate::core::AppError;
use crate::models::pagination::PaginationQuery;
use crate::models::payments::{NewPayment, Payment, PaymentStatus};
use sqlx::PgExecutor;

const PAYMENT_COLUMNS: &str = "id, user_id, plan_id, subscription_id, purpose, amount, currency, \
     authority_code, reference_code, status, failure_reason, metadata, requested_at, processed_at";

pub async fn insert_payment<'e>(
    executor: impl PgExecutor<'e>,
    payment: &NewPayment<'_>,
) -> Result<Payment, AppError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        r#"
        INSERT INTO payments (user_id, plan_id, subscription_id, purpose, amount, currency, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending')
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(payment.user_id)
    .bind(payment.plan_id)
    .bind(payment.subscription_id)
    .bind(payment.purpose)
    .bind(payment.amount)
    .bind(payment.currency)
    .fetch_one(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(payment)
}

/// Stores the provider authority and the raw initiation response.
pub async fn set_authority<'e>(
    executor: impl PgExecutor<'e>,
    payment_id: i64,
    authority: &str,
    metadata: &serde_json::Value,
) -> Result<Payment, AppError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        r#"
        UPDATE payments
        SET authority_code = $2, metadata = metadata || jsonb_build_object('initiation', $3::jsonb)
        WHERE id = $1
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(payment_id)
    .bind(authority)
    .bind(sqlx::types::Json(metadata))
    .fetch_one(executor)
    .await?;

    Ok(payment)
}

/// Locks the payment row so concurrent callbacks for the same authority serialize.
pub async fn lock_payment_by_authority<'e>(
    executor: impl PgExecutor<'e>,
    authority: &str,
) -> Result<Payment, AppError> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE authority_code = $1 FOR UPDATE"
    ))
    .bind(authority)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?
    .ok_or_else(|| AppError::not_found("Payment not found"))
}

pub async fn mark_success<'e>(
    executor: impl PgExecutor<'e>,
    payment_id: i64,
    reference_code: &str,
    metadata: &serde_json::Value,
) -> Result<Payment, AppError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        r#"
        UPDATE payments
        SET status = $2, reference_code = $3, processed_at = NOW(),
            metadata = metadata || jsonb_build_object('verification', $4::jsonb)
        WHERE id = $1
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(payment_id)
    .bind(PaymentStatus::Success)
    .bind(reference_code)
    .bind(sqlx::types::Json(metadata))
    .fetch_one(executor)
    .await?;

    Ok(payment)
}

pub async fn mark_failed<'e>(
    executor: impl PgExecutor<'e>,
    payment_id: i64,
    reason: &str,
) -> Result<Payment, AppError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        r#"
        UPDATE payments
        SET status = $2, failure_reason = $3, processed_at = NOW()
        WHERE id = $1
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(payment_id)
    .bind(PaymentStatus::Failed)
    .bind(reason)
    .fetch_one(executor)
    .await?;

    Ok(payment)
}

/// Fails every payment still pending against the subscription.
pub async fn fail_pending_for_subscription<'e>(
    executor: impl PgExecutor<'e>,
    subscription_id: i64,
    reason: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = 'failed', failure_reason = $2, processed_at = NOW()
        WHERE subscription_id = $1 AND status = 'pending'
        "#,
    )
    .bind(subscription_id)
    .bind(reason)
    .execute(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected())
}

pub async fn get_user_payments<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    pagination: &PaginationQuery,
) -> Result<Vec<Payment>, AppError> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
        r#"
        SELECT {PAYMENT_COLUMNS} FROM payments
        WHERE user_id = $1
        ORDER BY requested_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(payments)
}

pub async fn count_user_payments<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::db_error)?;

    Ok(total)
}
