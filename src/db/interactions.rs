use crate::core::AppError;
use crate::models::interactions::{
    BookmarkEntry, CommentResponse, VideoBookmark, VideoComment, WatchHistory, WatchHistoryEntry,
};
use crate::models::pagination::PaginationQuery;
use sqlx::PgExecutor;

const WATCH_COLUMNS: &str =
    "id, user_id, video_id, watched_at, progress_seconds, completed, rating, review";

const COMMENT_COLUMNS: &str = "id, user_id, video_id, comment, is_spoiler, created_at, updated_at";

// Watch history
pub async fn insert_watch_history<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    video_id: i64,
    progress_seconds: i32,
    completed: bool,
    rating: Option<i16>,
    review: Option<&str>,
) -> Result<WatchHistory, AppError> {
    let entry = sqlx::query_as::<_, WatchHistory>(&format!(
        r#"
        INSERT INTO watch_history (user_id, video_id, progress_seconds, completed, rating, review)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {WATCH_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(video_id)
    .bind(progress_seconds)
    .bind(completed)
    .bind(rating)
    .bind(review.unwrap_or_default())
    .fetch_one(executor)
    .await?;

    Ok(entry)
}

pub async fn get_user_watch_history<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    pagination: &PaginationQuery,
) -> Result<Vec<WatchHistoryEntry>, AppError> {
    let entries = sqlx::query_as::<_, WatchHistoryEntry>(
        r#"
        SELECT h.id, h.video_id, v.title AS video_title, v.slug AS video_slug,
               c.name AS category_name, h.watched_at, h.progress_seconds, h.completed,
               h.rating, h.review
        FROM watch_history h
        JOIN videos v ON v.id = h.video_id
        LEFT JOIN video_categories c ON c.id = v.category_id
        WHERE h.user_id = $1
        ORDER BY h.watched_at DESC, h.id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(entries)
}

pub async fn count_user_watch_history<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watch_history WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::db_error)?;

    Ok(total)
}

/// Attaches a rating to the user's most recent watch of the video, if there is one.
pub async fn rate_latest_watch<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    video_id: i64,
    rating: i16,
) -> Result<Option<WatchHistory>, AppError> {
    let entry = sqlx::query_as::<_, WatchHistory>(&format!(
        r#"
        UPDATE watch_history SET rating = $3
        WHERE id = (
            SELECT id FROM watch_history
            WHERE user_id = $1 AND video_id = $2
            ORDER BY watched_at DESC, id DESC
            LIMIT 1
        )
        RETURNING {WATCH_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(video_id)
    .bind(rating)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(entry)
}

// Comments
pub async fn insert_comment<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    video_id: i64,
    comment: &str,
    is_spoiler: bool,
) -> Result<VideoComment, AppError> {
    let comment = sqlx::query_as::<_, VideoComment>(&format!(
        r#"
        INSERT INTO video_comments (user_id, video_id, comment, is_spoiler)
        VALUES ($1, $2, $3, $4)
        RETURNING {COMMENT_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(video_id)
    .bind(comment.trim())
    .bind(is_spoiler)
    .fetch_one(executor)
    .await?;

    Ok(comment)
}

pub async fn get_user_comments<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    pagination: &PaginationQuery,
) -> Result<Vec<CommentResponse>, AppError> {
    let comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.video_id, v.slug AS video_slug, u.username, c.comment, c.is_spoiler,
               c.created_at
        FROM video_comments c
        JOIN videos v ON v.id = c.video_id
        JOIN users u ON u.id = c.user_id
        WHERE c.user_id = $1
        ORDER BY c.created_at DESC, c.id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(comments)
}

pub async fn count_user_comments<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM video_comments WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::db_error)?;

    Ok(total)
}

pub async fn get_user_comment<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    comment_id: i64,
) -> Result<CommentResponse, AppError> {
    sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.video_id, v.slug AS video_slug, u.username, c.comment, c.is_spoiler,
               c.created_at
        FROM video_comments c
        JOIN videos v ON v.id = c.video_id
        JOIN users u ON u.id = c.user_id
        WHERE c.id = $1 AND c.user_id = $2
        "#,
    )
    .bind(comment_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?
    .ok_or_else(|| AppError::not_found("Comment not found"))
}

/// Only the author can delete a comment; anyone else sees 404.
pub async fn delete_user_comment<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    comment_id: i64,
) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM video_comments WHERE id = $1 AND user_id = $2")
        .bind(comment_id)
        .bind(user_id)
        .execute(executor)
        .await
        .map_err(AppError::db_error)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Comment not found"));
    }

    Ok(())
}

// Bookmarks
pub async fn insert_bookmark<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    video_id: i64,
) -> Result<VideoBookmark, AppError> {
    let bookmark = sqlx::query_as::<_, VideoBookmark>(
        r#"
        INSERT INTO video_bookmarks (user_id, video_id)
        VALUES ($1, $2)
        RETURNING id, user_id, video_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(video_id)
    .fetch_one(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::conflict("Video is already bookmarked")
        }
        other => AppError::from(other),
    })?;

    Ok(bookmark)
}

/// Returns true when a bookmark was removed.
pub async fn remove_bookmark_for_video<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    video_id: i64,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM video_bookmarks WHERE user_id = $1 AND video_id = $2")
        .bind(user_id)
        .bind(video_id)
        .execute(executor)
        .await
        .map_err(AppError::db_error)?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_user_bookmark<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    bookmark_id: i64,
) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM video_bookmarks WHERE id = $1 AND user_id = $2")
        .bind(bookmark_id)
        .bind(user_id)
        .execute(executor)
        .await
        .map_err(AppError::db_error)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Bookmark not found"));
    }

    Ok(())
}

pub async fn get_user_bookmarks<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    pagination: &PaginationQuery,
) -> Result<Vec<BookmarkEntry>, AppError> {
    let bookmarks = sqlx::query_as::<_, BookmarkEntry>(
        r#"
        SELECT b.id, b.video_id, v.title AS video_title, v.slug AS video_slug,
               c.name AS category_name, b.created_at
        FROM video_bookmarks b
        JOIN videos v ON v.id = b.video_id
        LEFT JOIN video_categories c ON c.id = v.category_id
        WHERE b.user_id = $1
        ORDER BY b.created_at DESC, b.id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(bookmarks)
}

pub async fn count_user_bookmarks<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM video_bookmarks WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::db_error)?;

    Ok(total)
}
