use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{DatabaseError, ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::prelude::Row;
use sqlx::types::Json;
use uuid::Uuid;

/// One completion record per lecture; the list is deduplicated by `lecture_id`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CompletedLecture {
    pub lecture_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub watch_time_seconds: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Note {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub content: String,
    pub timestamp_seconds: i32,
    pub created_at: DateTime<Utc>,
}

/// Completed-over-total as an integer percentage, rounded half-up.
/// A course with no lectures yields 0; the result is clamped to 100.
pub fn progress_percent(completed: usize, total_lectures: i32) -> i32 {
    if total_lectures <= 0 {
        return 0;
    }
    let pct = (completed as f64 / total_lectures as f64 * 100.0).round() as i32;
    pct.min(100)
}

#[derive(Debug, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Enrollment {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    progress: i32,
    #[schema(value_type = Vec<CompletedLecture>)]
    completed_lectures: Json<Vec<CompletedLecture>>,
    last_accessed_lecture: Option<Uuid>,
    last_accessed_at: DateTime<Utc>,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
    #[schema(value_type = Vec<Note>)]
    notes: Json<Vec<Note>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResourceTyped for Enrollment {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Enrollment
    }
}

impl Enrollment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn completed_lectures(&self) -> &[CompletedLecture] {
        &self.completed_lectures.0
    }

    pub fn last_accessed_lecture(&self) -> Option<Uuid> {
        self.last_accessed_lecture
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes.0
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EnrollmentFilter {
    All,
    Completed,
    InProgress,
}

impl EnrollmentFilter {
    fn as_completed_flag(self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Completed => Some(true),
            Self::InProgress => Some(false),
        }
    }
}

impl From<&str> for EnrollmentFilter {
    fn from(value: &str) -> Self {
        match value {
            "completed" => Self::Completed,
            "in-progress" => Self::InProgress,
            _ => Self::All,
        }
    }
}

impl Enrollment {
    /// Inserts the ledger record. The `(user_id, course_id)` uniqueness is
    /// enforced by the store; a duplicate insert comes back as `Conflict`.
    pub async fn create(
        mm: &ModelManager,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query(
            "INSERT INTO enrollments (id, user_id, course_id) VALUES ($1,$2,$3) \
             RETURNING id, last_accessed_at, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .fetch_one(mm.executor())
        .await
        .map_err(DatabaseError::from_insert)?;

        Ok(Enrollment {
            id: result.try_get("id")?,
            user_id,
            course_id,
            progress: 0,
            completed_lectures: Json(Vec::new()),
            last_accessed_lecture: None,
            last_accessed_at: result.try_get("last_accessed_at")?,
            is_completed: false,
            completed_at: None,
            notes: Json(Vec::new()),
            created_at: result.try_get("created_at")?,
            updated_at: result.try_get("updated_at")?,
        })
    }

    pub async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM enrollments WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn find_by_pair(
        mm: &ModelManager,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result =
            sqlx::query_as("SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2")
                .bind(user_id)
                .bind(course_id)
                .fetch_optional(mm.executor())
                .await?;
        Ok(result)
    }

    /// Writes the whole record, embedded lists included, in one statement.
    pub async fn save(&self, mm: &ModelManager) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE enrollments SET progress = $1, completed_lectures = $2, \
             last_accessed_lecture = $3, last_accessed_at = $4, is_completed = $5, \
             completed_at = $6, notes = $7, updated_at = now() WHERE id = $8",
        )
        .bind(self.progress)
        .bind(&self.completed_lectures)
        .bind(self.last_accessed_lecture)
        .bind(self.last_accessed_at)
        .bind(self.is_completed)
        .bind(self.completed_at)
        .bind(&self.notes)
        .bind(self.id)
        .execute(mm.executor())
        .await?;
        Ok(())
    }

    pub async fn delete(self, mm: &ModelManager) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM enrollments WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    /// Marks a lecture completed. Idempotent: a lecture already in the set leaves
    /// the set and the progress untouched; last-accessed bookkeeping updates
    /// either way.
    pub fn complete_lecture(
        &mut self,
        lecture_id: Uuid,
        watch_time_seconds: i32,
        total_lectures: i32,
    ) {
        let already_completed = self
            .completed_lectures
            .0
            .iter()
            .any(|c| c.lecture_id == lecture_id);

        if !already_completed {
            self.completed_lectures.0.push(CompletedLecture {
                lecture_id,
                completed_at: Utc::now(),
                watch_time_seconds,
            });
            self.update_progress(total_lectures);
        }

        self.last_accessed_lecture = Some(lecture_id);
        self.last_accessed_at = Utc::now();
    }

    /// Re-derives the percentage and fires the completion latch. Once latched,
    /// neither `is_completed` nor the stored percentage changes again, even if
    /// the course's lecture count has moved since.
    fn update_progress(&mut self, total_lectures: i32) {
        if self.is_completed {
            return;
        }

        self.progress = progress_percent(self.completed_lectures.0.len(), total_lectures);

        if self.progress >= 100 {
            self.is_completed = true;
            self.completed_at = Some(Utc::now());
        }
    }

    /// Appends a note, returning its generated id. Timestamp defaults to 0.
    pub fn add_note(
        &mut self,
        lecture_id: Uuid,
        content: String,
        timestamp_seconds: Option<i32>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.notes.0.push(Note {
            id,
            lecture_id,
            content,
            timestamp_seconds: timestamp_seconds.unwrap_or(0),
            created_at: Utc::now(),
        });
        id
    }

    /// Replaces a note's content, `None` if the note id is absent.
    pub fn update_note(&mut self, note_id: Uuid, content: String) -> Option<()> {
        let note = self.notes.0.iter_mut().find(|n| n.id == note_id)?;
        note.content = content;
        Some(())
    }

    /// Removes a note, `None` if the note id is absent.
    pub fn delete_note(&mut self, note_id: Uuid) -> Option<()> {
        let before = self.notes.0.len();
        self.notes.0.retain(|n| n.id != note_id);
        (self.notes.0.len() < before).then_some(())
    }
}

// Listing and analytics views

/// An enrollment joined with its course summary, one row per enrollment,
/// most recently accessed first.
#[derive(Debug, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct EnrollmentWithCourseRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub progress: i32,
    pub is_completed: bool,
    pub completed_count: i32,
    pub last_accessed_at: DateTime<Utc>,
    pub course_title: String,
    pub course_category: String,
    pub total_lectures: i32,
    pub total_duration: i32,
}

impl EnrollmentWithCourseRow {
    pub async fn all_for_user(
        mm: &ModelManager,
        user_id: Uuid,
        filter: EnrollmentFilter,
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT
                e.id,
                e.course_id,
                e.progress,
                e.is_completed,
                jsonb_array_length(e.completed_lectures) AS completed_count,
                e.last_accessed_at,
                c.title AS course_title,
                c.category AS course_category,
                c.total_lectures,
                c.total_duration
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = $1
              AND ($2::bool IS NULL OR e.is_completed = $2)
            ORDER BY e.last_accessed_at DESC
            "#,
        )
        .bind(user_id)
        .bind(filter.as_completed_flag())
        .fetch_all(mm.executor())
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl HasOwner for Enrollment {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.user_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn blank_enrollment() -> Enrollment {
        let now = Utc::now();
        Enrollment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            progress: 0,
            completed_lectures: Json(Vec::new()),
            last_accessed_lecture: None,
            last_accessed_at: now,
            is_completed: false,
            completed_at: None,
            notes: Json(Vec::new()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(progress_percent(1, 4), 25);
        assert_eq!(progress_percent(2, 4), 50);
        assert_eq!(progress_percent(3, 4), 75);
        assert_eq!(progress_percent(4, 4), 100);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(1, 8), 13); // 12.5 rounds up
    }

    #[test]
    fn percent_guards_division_by_zero() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(5, 0), 0);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(progress_percent(5, 4), 100);
    }

    #[test]
    fn four_lecture_walkthrough() {
        let mut e = blank_enrollment();
        let lectures: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        e.complete_lecture(lectures[0], 60, 4);
        assert_eq!(e.progress(), 25);
        assert!(!e.is_completed());

        e.complete_lecture(lectures[1], 60, 4);
        e.complete_lecture(lectures[2], 60, 4);
        assert_eq!(e.progress(), 75);

        e.complete_lecture(lectures[3], 60, 4);
        assert_eq!(e.progress(), 100);
        assert!(e.is_completed());
        assert!(e.completed_at().is_some());
    }

    #[test]
    fn completing_a_lecture_twice_is_a_noop() {
        let mut e = blank_enrollment();
        let lecture = Uuid::new_v4();

        e.complete_lecture(lecture, 60, 4);
        let progress = e.progress();
        let count = e.completed_lectures().len();

        e.complete_lecture(lecture, 120, 4);
        assert_eq!(e.completed_lectures().len(), count);
        assert_eq!(e.progress(), progress);
        assert_eq!(e.last_accessed_lecture(), Some(lecture));
    }

    #[test]
    fn completion_latch_never_reverts() {
        let mut e = blank_enrollment();
        let first = Uuid::new_v4();
        e.complete_lecture(first, 60, 1);
        assert!(e.is_completed());
        let stamped = e.completed_at().unwrap();

        // the course grew afterwards; stored progress stays latched at 100
        e.complete_lecture(Uuid::new_v4(), 60, 3);
        assert!(e.is_completed());
        assert_eq!(e.progress(), 100);
        assert_eq!(e.completed_at().unwrap(), stamped);
        assert_eq!(e.completed_lectures().len(), 2);
    }

    #[test]
    fn progress_stays_in_bounds() {
        let mut e = blank_enrollment();
        for _ in 0..6 {
            e.complete_lecture(Uuid::new_v4(), 0, 4);
            assert!((0..=100).contains(&e.progress()));
        }
    }

    #[test]
    fn note_timestamp_defaults_to_zero() {
        let mut e = blank_enrollment();
        let id = e.add_note(Uuid::new_v4(), "remember this".into(), None);
        assert_eq!(e.notes()[0].timestamp_seconds, 0);

        assert!(e.update_note(id, "changed".into()).is_some());
        assert_eq!(e.notes()[0].content, "changed");

        assert!(e.update_note(Uuid::new_v4(), "nope".into()).is_none());
        assert!(e.delete_note(id).is_some());
        assert!(e.notes().is_empty());
        assert!(e.delete_note(id).is_none());
    }
}
