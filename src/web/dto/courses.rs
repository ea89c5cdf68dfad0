use serde::{Deserialize, Serialize};

use crate::model::entity::Course;

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CourseListQuery {
    pub category: Option<String>,
    pub level: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ReviewBody {
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CourseDetailResponse {
    pub course: Course,
    /// Whether the calling user (if any) holds an enrollment for this course.
    pub is_enrolled: bool,
}
