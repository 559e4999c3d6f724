use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// Watch history
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct WatchHistory {
    pub id: i64,
    pub user_id: i64,
    pub video_id: i64,
    pub watched_at: DateTime<Utc>,
    pub progress_seconds: i32,
    pub completed: bool,
    pub rating: Option<i16>,
    pub review: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordWatchRequest {
    /// Ignored when the video comes from the URL.
    pub video_id: Option<i64>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub progress_seconds: i32,
    #[serde(default)]
    pub completed: bool,
    #[validate(range(min = 1, max = 5, message = "Ratings go from 1 to 5"))]
    pub rating: Option<i16>,
    #[validate(length(max = 5000))]
    pub review: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct WatchHistoryEntry {
    pub id: i64,
    pub video_id: i64,
    pub video_title: String,
    pub video_slug: String,
    pub category_name: Option<String>,
    pub watched_at: DateTime<Utc>,
    pub progress_seconds: i32,
    pub completed: bool,
    pub rating: Option<i16>,
    pub review: String,
}

// Comments
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct VideoComment {
    pub id: i64,
    pub user_id: i64,
    pub video_id: i64,
    pub comment: String,
    pub is_spoiler: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Comment must not be empty"))]
    pub comment: String,
    #[serde(default)]
    pub is_spoiler: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(min = 1, max = 5000, message = "Comment must not be empty"))]
    pub comment: String,
    #[serde(default)]
    pub is_spoiler: bool,
    #[validate(range(min = 1, max = 5, message = "Ratings go from 1 to 5"))]
    pub rating: Option<i16>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CommentResponse {
    pub id: i64,
    pub video_id: i64,
    pub video_slug: String,
    pub username: String,
    pub comment: String,
    pub is_spoiler: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub comment: VideoComment,
    pub watch_history: Option<WatchHistory>,
}

// Bookmarks
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct VideoBookmark {
    pub id: i64,
    pub user_id: i64,
    pub video_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookmarkRequest {
    pub video_id: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BookmarkEntry {
    pub id: i64,
    pub video_id: i64,
    pub video_title: String,
    pub video_slug: String,
    pub category_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BookmarkToggle {
    pub video_id: i64,
    pub bookmarked: bool,
}
