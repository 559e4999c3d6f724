use crate::core::utils::slugify;
use crate::core::AppError;
use crate::models::catalog::{
    Episode, RecentComment, Series, SeriesPayload, Video, VideoCategory, VideoListQuery,
    VideoPayload, VideoStatus,
};
use crate::models::pagination::PaginationQuery;
use bigdecimal::BigDecimal;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};

const SERIES_COLUMNS: &str =
    "id, title, slug, description, poster_url, release_year, created_at, updated_at";

const VIDEO_COLUMNS: &str = "id, series_id, season_number, episode_number, title, slug, \
     description, category_id, duration_seconds, trailer_url, stream_url, thumbnail_url, price, \
     min_subscription_level, is_premium, status, published_at, created_by, created_at, updated_at";

/// Maps an `ordering` query value to an ORDER BY clause; unknown fields fall back to newest first.
pub fn video_ordering(ordering: Option<&str>) -> &'static str {
    match ordering.map(str::trim) {
        Some("created_at") => "created_at ASC, id ASC",
        Some("-created_at") => "created_at DESC, id DESC",
        Some("published_at") => "published_at ASC NULLS LAST, id ASC",
        Some("title") => "title ASC, id ASC",
        Some("-title") => "title DESC, id DESC",
        _ => "published_at DESC NULLS LAST, id DESC",
    }
}

/// Episode order when browsing one series without an explicit ordering.
const EPISODE_ORDERING: &str = "season_number NULLS LAST, episode_number NULLS LAST, id";

fn list_ordering(query: &VideoListQuery) -> &'static str {
    match (&query.series, &query.ordering) {
        (Some(series), None) if !series.is_empty() => EPISODE_ORDERING,
        _ => video_ordering(query.ordering.as_deref()),
    }
}

/// First free slug of the form `base`, `base-2`, `base-3`... in `table`.
async fn available_slug(
    pool: &PgPool,
    table: &'static str,
    base: &str,
    excluding_id: Option<i64>,
) -> Result<String, AppError> {
    let base = if base.is_empty() { "item".to_string() } else { base.to_string() };

    let taken: Vec<String> = sqlx::query_scalar(&format!(
        "SELECT slug FROM {table} WHERE (slug = $1 OR slug LIKE $1 || '-%') AND ($2::BIGINT IS NULL OR id <> $2)"
    ))
    .bind(&base)
    .bind(excluding_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)?;

    if !taken.contains(&base) {
        return Ok(base);
    }

    let mut suffix = 2;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

// Categories
pub async fn get_categories<'e>(
    executor: impl PgExecutor<'e>,
) -> Result<Vec<VideoCategory>, AppError> {
    let categories = sqlx::query_as::<_, VideoCategory>(
        "SELECT id, name, slug, description FROM video_categories ORDER BY name",
    )
    .fetch_all(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(categories)
}

pub async fn get_category_by_id<'e>(
    executor: impl PgExecutor<'e>,
    category_id: i64,
) -> Result<Option<VideoCategory>, AppError> {
    let category = sqlx::query_as::<_, VideoCategory>(
        "SELECT id, name, slug, description FROM video_categories WHERE id = $1",
    )
    .bind(category_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(category)
}

pub async fn create_category(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
) -> Result<VideoCategory, AppError> {
    let slug = available_slug(pool, "video_categories", &slugify(name), None).await?;

    let category = sqlx::query_as::<_, VideoCategory>(
        r#"
        INSERT INTO video_categories (name, slug, description)
        VALUES ($1, $2, $3)
        RETURNING id, name, slug, description
        "#,
    )
    .bind(name.trim())
    .bind(slug)
    .bind(description.unwrap_or_default())
    .fetch_one(pool)
    .await?;

    Ok(category)
}

// Series
pub async fn get_series_list(
    pool: &PgPool,
    search: Option<&str>,
    pagination: &PaginationQuery,
) -> Result<(Vec<Series>, i64), AppError> {
    let pattern = search
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| format!("%{}%", term));

    let series = sqlx::query_as::<_, Series>(&format!(
        r#"
        SELECT {SERIES_COLUMNS} FROM series
        WHERE $1::TEXT IS NULL OR title ILIKE $1
        ORDER BY release_year DESC NULLS LAST, title
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(pattern.as_deref())
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM series WHERE $1::TEXT IS NULL OR title ILIKE $1")
            .bind(pattern.as_deref())
            .fetch_one(pool)
            .await
            .map_err(AppError::db_error)?;

    Ok((series, total))
}

pub async fn get_series_by_slug<'e>(
    executor: impl PgExecutor<'e>,
    slug: &str,
) -> Result<Series, AppError> {
    sqlx::query_as::<_, Series>(&format!("SELECT {SERIES_COLUMNS} FROM series WHERE slug = $1"))
        .bind(slug)
        .fetch_optional(executor)
        .await
        .map_err(AppError::db_error)?
        .ok_or_else(|| AppError::not_found("Series not found"))
}

pub async fn get_series_title<'e>(
    executor: impl PgExecutor<'e>,
    series_id: i64,
) -> Result<Option<String>, AppError> {
    let title: Option<String> = sqlx::query_scalar("SELECT title FROM series WHERE id = $1")
        .bind(series_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::db_error)?;

    Ok(title)
}

/// Episodes ordered by season then episode; drafts are hidden unless `include_unpublished`.
pub async fn get_series_episodes<'e>(
    executor: impl PgExecutor<'e>,
    series_id: i64,
    include_unpublished: bool,
) -> Result<Vec<Episode>, AppError> {
    let episodes = sqlx::query_as::<_, Episode>(
        r#"
        SELECT title, slug, season_number, episode_number, duration_seconds
        FROM videos
        WHERE series_id = $1 AND ($2 OR status = 'published')
        ORDER BY season_number NULLS LAST, episode_number NULLS LAST, id
        "#,
    )
    .bind(series_id)
    .bind(include_unpublished)
    .fetch_all(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(episodes)
}

pub async fn create_series(pool: &PgPool, payload: &SeriesPayload) -> Result<Series, AppError> {
    let slug = available_slug(pool, "series", &slugify(&payload.title), None).await?;

    let series = sqlx::query_as::<_, Series>(&format!(
        r#"
        INSERT INTO series (title, slug, description, poster_url, release_year)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {SERIES_COLUMNS}
        "#
    ))
    .bind(payload.title.trim())
    .bind(slug)
    .bind(payload.description.as_deref().unwrap_or_default())
    .bind(payload.poster_url.as_deref().unwrap_or_default())
    .bind(payload.release_year)
    .fetch_one(pool)
    .await?;

    Ok(series)
}

pub async fn update_series(
    pool: &PgPool,
    series_id: i64,
    payload: &SeriesPayload,
) -> Result<Series, AppError> {
    let series = sqlx::query_as::<_, Series>(&format!(
        r#"
        UPDATE series
        SET title = $2, description = $3, poster_url = $4, release_year = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING {SERIES_COLUMNS}
        "#
    ))
    .bind(series_id)
    .bind(payload.title.trim())
    .bind(payload.description.as_deref().unwrap_or_default())
    .bind(payload.poster_url.as_deref().unwrap_or_default())
    .bind(payload.release_year)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Series not found"))?;

    Ok(series)
}

pub async fn delete_series<'e>(
    executor: impl PgExecutor<'e>,
    series_id: i64,
) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM series WHERE id = $1")
        .bind(series_id)
        .execute(executor)
        .await
        .map_err(AppError::db_error)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Series not found"));
    }

    Ok(())
}

// Videos
fn push_video_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    query: &VideoListQuery,
    include_unpublished: bool,
) {
    builder.push(" WHERE TRUE");

    match (include_unpublished, query.status) {
        (true, Some(status)) => {
            builder.push(" AND status = ").push_bind(status);
        }
        (true, None) => {}
        (false, _) => {
            builder.push(" AND status = ").push_bind(VideoStatus::Published);
        }
    }

    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        builder
            .push(" AND category_id IN (SELECT id FROM video_categories WHERE slug = ")
            .push_bind(category.to_string())
            .push(")");
    }

    if let Some(series) = query.series.as_deref().filter(|s| !s.is_empty()) {
        builder
            .push(" AND series_id IN (SELECT id FROM series WHERE slug = ")
            .push_bind(series.to_string())
            .push(")");
    }

    match query.content_type.as_deref() {
        Some("movie") => {
            builder.push(" AND series_id IS NULL");
        }
        Some("episode") => {
            builder.push(" AND series_id IS NOT NULL");
        }
        _ => {}
    }

    if let Some(is_premium) = query.is_premium {
        builder.push(" AND is_premium = ").push_bind(is_premium);
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn get_videos(
    pool: &PgPool,
    query: &VideoListQuery,
    include_unpublished: bool,
    pagination: &PaginationQuery,
) -> Result<(Vec<Video>, i64), AppError> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {VIDEO_COLUMNS} FROM videos"));
    push_video_filters(&mut builder, query, include_unpublished);
    builder
        .push(" ORDER BY ")
        .push(list_ordering(query))
        .push(" LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let videos = builder
        .build_query_as::<Video>()
        .fetch_all(pool)
        .await
        .map_err(AppError::db_error)?;

    let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM videos");
    push_video_filters(&mut count_builder, query, include_unpublished);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .map_err(AppError::db_error)?;

    Ok((videos, total))
}

pub async fn get_video_by_slug<'e>(
    executor: impl PgExecutor<'e>,
    slug: &str,
) -> Result<Video, AppError> {
    sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE slug = $1"))
        .bind(slug)
        .fetch_optional(executor)
        .await
        .map_err(AppError::db_error)?
        .ok_or_else(|| AppError::not_found("Video not found"))
}

pub async fn get_video_by_id<'e>(
    executor: impl PgExecutor<'e>,
    video_id: i64,
) -> Result<Video, AppError> {
    sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"))
        .bind(video_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::db_error)?
        .ok_or_else(|| AppError::not_found("Video not found"))
}

pub async fn create_video(
    pool: &PgPool,
    payload: &VideoPayload,
    created_by: i64,
) -> Result<Video, AppError> {
    let requested = payload
        .slug
        .as_deref()
        .map(slugify)
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| slugify(&payload.title));
    let slug = available_slug(pool, "videos", &requested, None).await?;
    let status = payload.status.unwrap_or(VideoStatus::Draft);

    let video = sqlx::query_as::<_, Video>(&format!(
        r#"
        INSERT INTO videos (
            series_id, season_number, episode_number, title, slug, description, category_id,
            duration_seconds, trailer_url, stream_url, thumbnail_url, price,
            min_subscription_level, is_premium, status, published_at, created_by
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
            CASE WHEN $15 = 'published'::video_status THEN NOW() END, $16
        )
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(payload.series_id)
    .bind(payload.season_number)
    .bind(payload.episode_number)
    .bind(payload.title.trim())
    .bind(slug)
    .bind(payload.description.as_deref().unwrap_or_default())
    .bind(payload.category_id)
    .bind(payload.duration_seconds)
    .bind(payload.trailer_url.as_deref().unwrap_or_default())
    .bind(&payload.stream_url)
    .bind(payload.thumbnail_url.as_deref().unwrap_or_default())
    .bind(payload.price.clone().unwrap_or_else(|| BigDecimal::from(0)))
    .bind(payload.min_subscription_level.unwrap_or(1))
    .bind(payload.is_premium.unwrap_or(true))
    .bind(status)
    .bind(created_by)
    .fetch_one(pool)
    .await?;

    Ok(video)
}

/// Replaces the editable fields; `published_at` is stamped the first time the video goes live.
pub async fn update_video(
    pool: &PgPool,
    current: &Video,
    payload: &VideoPayload,
) -> Result<Video, AppError> {
    let slug = match payload.slug.as_deref().map(slugify).filter(|s| !s.is_empty()) {
        Some(requested) if requested != current.slug => {
            available_slug(pool, "videos", &requested, Some(current.id)).await?
        }
        _ => current.slug.clone(),
    };
    let status = payload.status.unwrap_or(current.status);

    let video = sqlx::query_as::<_, Video>(&format!(
        r#"
        UPDATE videos SET
            series_id = $2, season_number = $3, episode_number = $4, title = $5, slug = $6,
            description = $7, category_id = $8, duration_seconds = $9, trailer_url = $10,
            stream_url = $11, thumbnail_url = $12, price = $13, min_subscription_level = $14,
            is_premium = $15, status = $16,
            published_at = CASE
                WHEN $16 = 'published'::video_status AND published_at IS NULL THEN NOW()
                ELSE published_at
            END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(current.id)
    .bind(payload.series_id)
    .bind(payload.season_number)
    .bind(payload.episode_number)
    .bind(payload.title.trim())
    .bind(slug)
    .bind(payload.description.as_deref().unwrap_or_default())
    .bind(payload.category_id)
    .bind(payload.duration_seconds)
    .bind(payload.trailer_url.as_deref().unwrap_or_default())
    .bind(&payload.stream_url)
    .bind(payload.thumbnail_url.as_deref().unwrap_or_default())
    .bind(payload.price.clone().unwrap_or_else(|| current.price.clone()))
    .bind(payload.min_subscription_level.unwrap_or(current.min_subscription_level))
    .bind(payload.is_premium.unwrap_or(current.is_premium))
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok(video)
}

pub async fn delete_video<'e>(executor: impl PgExecutor<'e>, video_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(video_id)
        .execute(executor)
        .await
        .map_err(AppError::db_error)?;

    Ok(())
}

/// View count and mean rating taken from watch history.
pub async fn get_video_stats<'e>(
    executor: impl PgExecutor<'e>,
    video_id: i64,
) -> Result<(i64, f64), AppError> {
    let (views, average): (i64, Option<f64>) = sqlx::query_as(
        r#"
        SELECT COUNT(*), AVG(rating)::FLOAT8
        FROM watch_history
        WHERE video_id = $1
        "#,
    )
    .bind(video_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok((views, average.map(round_rating).unwrap_or(0.0)))
}

fn round_rating(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub async fn get_recent_comments<'e>(
    executor: impl PgExecutor<'e>,
    video_id: i64,
    limit: i64,
) -> Result<Vec<RecentComment>, AppError> {
    let comments = sqlx::query_as::<_, RecentComment>(
        r#"
        SELECT COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username) AS "user",
               c.comment, c.created_at
        FROM video_comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.video_id = $1
        ORDER BY c.created_at DESC, c.id DESC
        LIMIT $2
        "#,
    )
    .bind(video_id)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::db_error)?;

    Ok(comments)
}
