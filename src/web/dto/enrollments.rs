use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::entity::EnrollmentWithCourseRow;

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct EnrollmentListQuery {
    /// `all` (default), `completed` or `in-progress`
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CompleteLectureBody {
    pub watch_time_seconds: Option<i32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct NoteCreateBody {
    pub lecture_id: Uuid,
    pub content: String,
    pub timestamp_seconds: Option<i32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct NoteUpdateBody {
    pub content: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnalyticsOverview {
    pub total_courses: i64,
    pub completed_courses: i64,
    pub in_progress_courses: i64,
    pub total_lectures_completed: i64,
    pub average_progress: i32,
}

#[derive(Debug, Default, Serialize, utoipa::ToSchema)]
pub struct CategoryProgress {
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecentActivity {
    pub course_title: String,
    pub progress: i32,
    pub last_accessed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LearningAnalyticsResponse {
    pub overview: AnalyticsOverview,
    pub category_breakdown: HashMap<String, CategoryProgress>,
    pub recent_activity: Vec<RecentActivity>,
}

impl LearningAnalyticsResponse {
    /// Folds the caller's enrollment rows (already ordered most recently
    /// accessed first) into the aggregate view.
    pub fn from_rows(rows: &[EnrollmentWithCourseRow]) -> Self {
        let total_courses = rows.len() as i64;
        let completed_courses = rows.iter().filter(|r| r.is_completed).count() as i64;
        let total_lectures_completed: i64 = rows.iter().map(|r| r.completed_count as i64).sum();

        let average_progress = if rows.is_empty() {
            0
        } else {
            let sum: i64 = rows.iter().map(|r| r.progress as i64).sum();
            (sum as f64 / rows.len() as f64).round() as i32
        };

        let mut category_breakdown: HashMap<String, CategoryProgress> = HashMap::new();
        for row in rows {
            let entry = category_breakdown
                .entry(row.course_category.clone())
                .or_default();
            entry.total += 1;
            if row.is_completed {
                entry.completed += 1;
            }
        }

        let recent_activity = rows
            .iter()
            .take(5)
            .map(|r| RecentActivity {
                course_title: r.course_title.clone(),
                progress: r.progress,
                last_accessed_at: r.last_accessed_at,
            })
            .collect();

        Self {
            overview: AnalyticsOverview {
                total_courses,
                completed_courses,
                in_progress_courses: total_courses - completed_courses,
                total_lectures_completed,
                average_progress,
            },
            category_breakdown,
            recent_activity,
        }
    }
}
