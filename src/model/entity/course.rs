use crate::impl_paginatable_for;
use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{DatabaseError, ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::prelude::Row;
use sqlx::types::Json;
use uuid::Uuid;

pub static STATUS_DRAFT: &str = "draft";
pub static STATUS_PUBLISHED: &str = "published";
pub static STATUS_ARCHIVED: &str = "archived";

/// Atomic content unit. Lives inside a section, addressable by its generated id.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Lecture {
    pub id: Uuid,
    pub title: String,
    pub video_ref: String,
    pub duration_minutes: i32,
    pub is_free: bool,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Section {
    pub id: Uuid,
    pub title: String,
    pub lectures: Vec<Lecture>,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Review {
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Course {
    id: Uuid,
    slug: String,
    title: String,
    description: String,
    category: String,
    level: String,
    price: f64,
    instructor_id: Uuid,
    #[schema(value_type = Vec<Section>)]
    sections: Json<Vec<Section>>,
    #[schema(value_type = Vec<Review>)]
    reviews: Json<Vec<Review>>,
    is_published: bool,
    published_at: Option<DateTime<Utc>>,
    status: String,
    enrollment_count: i32,
    total_duration: i32,
    total_lectures: i32,
    average_rating: f64,
    rating_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResourceTyped for Course {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Course
    }
}

impl Course {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn instructor_id(&self) -> Uuid {
        self.instructor_id
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections.0
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews.0
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn enrollment_count(&self) -> i32 {
        self.enrollment_count
    }

    pub fn total_duration(&self) -> i32 {
        self.total_duration
    }

    pub fn total_lectures(&self) -> i32 {
        self.total_lectures
    }

    pub fn average_rating(&self) -> f64 {
        self.average_rating
    }

    pub fn rating_count(&self) -> i32 {
        self.rating_count
    }
}

/// Derives the url slug from a course title: lowercase, word characters kept,
/// whitespace collapsed to single hyphens. Slugs are not unique.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut prev_hyphen = true; // swallow leading hyphens

    for c in lowered.trim().chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if c == '-' {
            if !prev_hyphen {
                slug.push('-');
            }
            prev_hyphen = true;
        } else if c.is_alphanumeric() || c == '_' {
            slug.push(c);
            prev_hyphen = false;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CourseCreate {
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: String,
    pub price: f64,
}

#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SectionCreate {
    pub title: String,
    pub order: Option<i32>,
}

#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct LectureCreate {
    pub title: String,
    pub video_ref: String,
    pub duration_minutes: i32,
    pub is_free: Option<bool>,
    pub order: Option<i32>,
}

#[async_trait]
impl CrudRepository<Course, CourseCreate, Uuid> for Course {
    async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        let now = Utc::now();
        let slug = slugify(&data.title);
        let result = sqlx::query(
            "INSERT INTO courses (id, slug, title, description, category, level, price, instructor_id, status) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&slug)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.category)
        .bind(&data.level)
        .bind(data.price)
        .bind(actor.user_id())
        .bind(STATUS_DRAFT)
        .fetch_one(mm.executor())
        .await?;

        let id = result.try_get("id")?;
        Ok(Course {
            id,
            slug,
            title: data.title,
            description: data.description,
            category: data.category,
            level: data.level,
            price: data.price,
            instructor_id: actor.user_id(),
            sections: Json(Vec::new()),
            reviews: Json(Vec::new()),
            is_published: false,
            published_at: None,
            status: STATUS_DRAFT.to_string(),
            enrollment_count: 0,
            total_duration: 0,
            total_lectures: 0,
            average_rating: 0.0,
            rating_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        if data.title != self.title {
            self.slug = slugify(&data.title);
        }
        self.title = data.title;
        self.description = data.description;
        self.category = data.category;
        self.level = data.level;
        self.price = data.price;

        self.recompute_derived();
        self.save(mm).await?;
        Ok(self)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        // enrollments are removed by the store's cascade
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_one(mm.executor())
            .await;
        if let Err(sqlx::Error::RowNotFound) = result {
            return Ok(None);
        }

        Ok(Some(result?))
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result =
            sqlx::query_as("SELECT * FROM courses ORDER BY created_at DESC LIMIT $1 OFFSET $2")
                .bind(limit)
                .bind(offset)
                .fetch_all(mm.executor())
                .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl Course {
    /// Recomputes every derived field from the embedded section/lecture tree and
    /// the review list. Must be called by the write path right before `save` —
    /// the stored values are never trusted from client input.
    pub fn recompute_derived(&mut self) {
        let mut total_duration = 0;
        let mut total_lectures = 0;
        for section in self.sections.0.iter() {
            total_lectures += section.lectures.len() as i32;
            for lecture in &section.lectures {
                total_duration += lecture.duration_minutes;
            }
        }
        self.total_duration = total_duration;
        self.total_lectures = total_lectures;

        if self.reviews.0.is_empty() {
            self.average_rating = 0.0;
            self.rating_count = 0;
        } else {
            let sum: i32 = self.reviews.0.iter().map(|r| r.rating).sum();
            let mean = sum as f64 / self.reviews.0.len() as f64;
            self.average_rating = (mean * 10.0).round() / 10.0;
            self.rating_count = self.reviews.0.len() as i32;
        }
    }

    /// Writes the whole course row, embedded trees included, in one statement.
    /// `enrollment_count` is deliberately left out: it is maintained by
    /// `bump_enrollment_count` so a stale in-memory copy cannot clobber it.
    pub async fn save(&self, mm: &ModelManager) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE courses SET slug = $1, title = $2, description = $3, category = $4, \
             level = $5, price = $6, sections = $7, reviews = $8, is_published = $9, \
             published_at = $10, status = $11, total_duration = $12, total_lectures = $13, \
             average_rating = $14, rating_count = $15, updated_at = now() WHERE id = $16",
        )
        .bind(&self.slug)
        .bind(&self.title)
        .bind(&self.description)
        .bind(&self.category)
        .bind(&self.level)
        .bind(self.price)
        .bind(&self.sections)
        .bind(&self.reviews)
        .bind(self.is_published)
        .bind(self.published_at)
        .bind(&self.status)
        .bind(self.total_duration)
        .bind(self.total_lectures)
        .bind(self.average_rating)
        .bind(self.rating_count)
        .bind(self.id)
        .execute(mm.executor())
        .await?;
        Ok(())
    }

    /// Appends a section to the ordered list, returning its generated id.
    /// Order defaults to the append position.
    pub fn add_section(&mut self, data: SectionCreate) -> Uuid {
        let id = Uuid::new_v4();
        let order = data.order.unwrap_or(self.sections.0.len() as i32);
        self.sections.0.push(Section {
            id,
            title: data.title,
            lectures: Vec::new(),
            order,
        });
        id
    }

    /// Appends a lecture to the given section, `None` if the section is absent.
    pub fn add_lecture(&mut self, section_id: Uuid, data: LectureCreate) -> Option<Uuid> {
        let section = self.sections.0.iter_mut().find(|s| s.id == section_id)?;
        let id = Uuid::new_v4();
        let order = data.order.unwrap_or(section.lectures.len() as i32);
        section.lectures.push(Lecture {
            id,
            title: data.title,
            video_ref: data.video_ref,
            duration_minutes: data.duration_minutes,
            is_free: data.is_free.unwrap_or(false),
            order,
        });
        Some(id)
    }

    /// One review per user per course; a second attempt is a `Conflict`.
    pub fn add_review(&mut self, user_id: Uuid, rating: i32, comment: String) -> DatabaseResult<()> {
        if self.reviews.0.iter().any(|r| r.user_id == user_id) {
            return Err(DatabaseError::Conflict);
        }
        self.reviews.0.push(Review {
            user_id,
            rating,
            comment,
            created_at: Utc::now(),
        });
        Ok(())
    }

    /// Flips the publish flag and derived status. `published_at` is stamped on the
    /// first transition to published and never overwritten afterwards.
    pub fn toggle_publish(&mut self) {
        self.is_published = !self.is_published;
        self.status = if self.is_published {
            STATUS_PUBLISHED.to_string()
        } else {
            STATUS_DRAFT.to_string()
        };
        if self.is_published && self.published_at.is_none() {
            self.published_at = Some(Utc::now());
        }
    }

    /// Best-effort counter maintenance; intentionally a separate write from
    /// enrollment creation (see DESIGN.md).
    pub async fn bump_enrollment_count(
        mm: &ModelManager,
        course_id: Uuid,
        delta: i32,
    ) -> DatabaseResult<()> {
        sqlx::query("UPDATE courses SET enrollment_count = enrollment_count + $1 WHERE id = $2")
            .bind(delta)
            .bind(course_id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    pub async fn list_published(
        mm: &ModelManager,
        category: Option<&str>,
        level: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM courses WHERE is_published = TRUE \
             AND ($1::text IS NULL OR category = $1) \
             AND ($2::text IS NULL OR level = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(category)
        .bind(level)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn count_published(
        mm: &ModelManager,
        category: Option<&str>,
        level: Option<&str>,
    ) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM courses WHERE is_published = TRUE \
             AND ($1::text IS NULL OR category = $1) \
             AND ($2::text IS NULL OR level = $2)",
        )
        .bind(category)
        .bind(level)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn all_by_instructor(
        mm: &ModelManager,
        instructor_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM courses WHERE instructor_id = $1 ORDER BY created_at DESC",
        )
        .bind(instructor_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    /// Soft removal used when the owning instructor account goes away.
    pub async fn archive_by_instructor(
        mm: &ModelManager,
        instructor_id: Uuid,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE courses SET status = $1, is_published = FALSE, updated_at = now() \
             WHERE instructor_id = $2",
        )
        .bind(STATUS_ARCHIVED)
        .bind(instructor_id)
        .execute(mm.executor())
        .await?;
        Ok(())
    }
}

impl_paginatable_for!(Course, CourseCreate, Uuid);

#[async_trait]
impl HasOwner for Course {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.instructor_id)
    }
}
