use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct VideoCategory {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Series {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub poster_url: String,
    pub release_year: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SeriesPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(url)]
    pub poster_url: Option<String>,
    #[validate(range(min = 1888, max = 2100))]
    pub release_year: Option<i32>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Episode {
    pub title: String,
    pub slug: String,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub duration_seconds: i32,
}

#[derive(Debug, Serialize)]
pub struct SeriesDetail {
    #[serde(flatten)]
    pub series: Series,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "video_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Video {
    pub id: i64,
    pub series_id: Option<i64>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub duration_seconds: i32,
    pub trailer_url: String,
    pub stream_url: String,
    pub thumbnail_url: String,
    pub price: BigDecimal,
    pub min_subscription_level: i32,
    pub is_premium: bool,
    pub status: VideoStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// `level` is the caller's subscription level, `None` for anonymous callers.
    pub fn can_user_access(&self, level: Option<i32>) -> bool {
        if self.status != VideoStatus::Published {
            return false;
        }
        if !self.is_premium {
            return true;
        }
        match level {
            Some(level) => level >= self.min_subscription_level,
            None => false,
        }
    }

    pub fn display_title(&self, series_title: Option<&str>) -> String {
        match (series_title, self.season_number, self.episode_number) {
            (Some(series), Some(season), Some(episode)) => {
                format!("{} - S{:02}E{:02}: {}", series, season, episode, self.title)
            }
            _ => self.title.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VideoDetail {
    #[serde(flatten)]
    pub video: Video,
    pub category: Option<VideoCategory>,
    pub series_title: Option<String>,
    pub display_title: String,
    pub average_rating: f64,
    pub views_count: i64,
    pub can_watch: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VideoPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 260))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub series_id: Option<i64>,
    #[validate(range(min = 1))]
    pub season_number: Option<i32>,
    #[validate(range(min = 1))]
    pub episode_number: Option<i32>,
    #[validate(range(min = 0))]
    pub duration_seconds: i32,
    #[validate(url)]
    pub trailer_url: Option<String>,
    #[validate(url(message = "Entering a stream address is required."))]
    pub stream_url: String,
    #[validate(url)]
    pub thumbnail_url: Option<String>,
    pub price: Option<BigDecimal>,
    #[validate(range(min = 0))]
    pub min_subscription_level: Option<i32>,
    pub is_premium: Option<bool>,
    pub status: Option<VideoStatus>,
}

#[derive(Debug, Deserialize)]
pub struct VideoListQuery {
    pub category: Option<String>,
    pub series: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub is_premium: Option<bool>,
    pub status: Option<VideoStatus>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RecentComment {
    pub user: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct VideoLiveStatus {
    pub video_id: i64,
    pub views: i64,
    pub average_rating: f64,
    pub recent_comments: Vec<RecentComment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(status: VideoStatus, is_premium: bool, min_level: i32) -> Video {
        let now = Utc::now();
        Video {
            id: 1,
            series_id: None,
            season_number: None,
            episode_number: None,
            title: "Pilot".to_string(),
            slug: "pilot".to_string(),
            description: String::new(),
            category_id: None,
            duration_seconds: 1800,
            trailer_url: String::new(),
            stream_url: "https://cdn.example.com/pilot.m3u8".to_string(),
            thumbnail_url: String::new(),
            price: BigDecimal::from(0),
            min_subscription_level: min_level,
            is_premium,
            status,
            published_at: Some(now),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unpublished_videos_are_never_accessible() {
        let draft = video(VideoStatus::Draft, false, 1);
        let archived = video(VideoStatus::Archived, false, 1);
        assert!(!draft.can_user_access(Some(10)));
        assert!(!archived.can_user_access(Some(10)));
    }

    #[test]
    fn free_published_videos_are_open_to_anonymous_users() {
        assert!(video(VideoStatus::Published, false, 3).can_user_access(None));
    }

    #[test]
    fn premium_videos_require_a_sufficient_level() {
        let premium = video(VideoStatus::Published, true, 2);
        assert!(!premium.can_user_access(None));
        assert!(!premium.can_user_access(Some(0)));
        assert!(!premium.can_user_access(Some(1)));
        assert!(premium.can_user_access(Some(2)));
        assert!(premium.can_user_access(Some(3)));
    }

    #[test]
    fn episodes_are_titled_with_season_and_episode() {
        let mut episode = video(VideoStatus::Published, true, 1);
        episode.season_number = Some(1);
        episode.episode_number = Some(3);

        assert_eq!(
            episode.display_title(Some("Dark")),
            "Dark - S01E03: Pilot"
        );
        assert_eq!(episode.display_title(None), "Pilot");
    }
}
