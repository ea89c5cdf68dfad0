use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, ResourceType, ResourceTyped, check_access,
        entity::{
            Course, Enrollment, EnrollmentFilter, EnrollmentWithCourseRow,
        },
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::enrollments::{
            CompleteLectureBody, EnrollmentListQuery, LearningAnalyticsResponse, NoteCreateBody,
            NoteUpdateBody,
        },
        error::ErrorResponse,
        middlewares,
    },
};

static NOTE_CONTENT_MAX: usize = 2000;

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(enrollments_list_handler))
        .route("/analytics", get(analytics_handler))
        // POST takes the course id, GET/DELETE the enrollment id
        .route(
            "/{id}",
            get(enrollment_get_handler)
                .delete(unenroll_handler)
                .post(enroll_handler),
        )
        .route(
            "/{id}/lectures/{lecture_id}/complete",
            post(complete_lecture_handler),
        )
        .route("/{id}/notes", get(notes_list_handler).post(note_add_handler))
        .route(
            "/{id}/notes/{note_id}",
            put(note_update_handler).delete(note_delete_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

/// Loads an enrollment the caller must own. The ledger is strictly personal:
/// even admins go through `check_access`, which lets them in for reads and
/// removal, while the mutating handlers below compare the owner directly.
async fn fetch_enrollment(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Enrollment> {
    let enrollment = Enrollment::find_by_id(state.mm(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Enrollment::get_resource_type()))?;

    check_access(state.mm(), user, &enrollment, user.user_id())
        .await
        .map_err(|e| WebError::from_database(Enrollment::get_resource_type(), e))?;

    Ok(enrollment)
}

/// Same as `fetch_enrollment` but with no admin bypass: progress and notes
/// belong to the enrolled user alone.
async fn fetch_own_enrollment(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Enrollment> {
    let enrollment = Enrollment::find_by_id(state.mm(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Enrollment::get_resource_type()))?;

    if enrollment.user_id() != user.user_id() {
        return Err(WebError::resource_forbidden(Enrollment::get_resource_type()));
    }

    Ok(enrollment)
}

#[utoipa::path(
    post,
    path = "/api/v1/enrollments/{course_id}",
    description = "Enroll the caller into a published course",
    params(
        ("course_id" = Uuid, Path, description = "ID of the course to enroll into")
    ),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 400, description = "Course is not published", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Already enrolled", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn enroll_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;

    let course = Course::find_by_id(state.mm(), user, course_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    if !course.is_published() {
        return Err(WebError::resource_invalid_state(
            Course::get_resource_type(),
            "cannot enroll in an unpublished course",
        ));
    }

    // the unique (user, course) constraint resolves the duplicate race;
    // a second insert surfaces here as Conflict
    let enrollment = Enrollment::create(state.mm(), user.user_id(), course.id())
        .await
        .map_err(|e| WebError::from_database(Enrollment::get_resource_type(), e))?;

    // separate, uncompensated write; see DESIGN.md
    Course::bump_enrollment_count(state.mm(), course.id(), 1)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[utoipa::path(
    get,
    path = "/api/v1/enrollments/",
    description = "List the caller's enrollments, most recently accessed first",
    params(
        ("status" = Option<String>, Query, description = "all | completed | in-progress")
    ),
    responses(
        (status = 200, description = "Enrollments with course summaries", body = Vec<EnrollmentWithCourseRow>),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn enrollments_list_handler(
    ctx: RequestContext,
    Query(query): Query<EnrollmentListQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let filter = query
        .status
        .as_deref()
        .map(EnrollmentFilter::from)
        .unwrap_or(EnrollmentFilter::All);

    let rows = EnrollmentWithCourseRow::all_for_user(state.mm(), user.user_id(), filter)
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/enrollments/analytics",
    description = "Learning analytics across the caller's enrollments",
    responses(
        (status = 200, description = "Aggregated progress", body = LearningAnalyticsResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn analytics_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;

    let rows =
        EnrollmentWithCourseRow::all_for_user(state.mm(), user.user_id(), EnrollmentFilter::All)
            .await
            .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(LearningAnalyticsResponse::from_rows(&rows))))
}

#[utoipa::path(
    get,
    path = "/api/v1/enrollments/{id}",
    description = "Fetch one enrollment with its completion set and notes",
    params(
        ("id" = Uuid, Path, description = "ID of the enrollment")
    ),
    responses(
        (status = 200, description = "Enrollment found", body = Enrollment),
        (status = 403, description = "Not the enrollment owner", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn enrollment_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = fetch_enrollment(&state, user, id).await?;

    Ok((StatusCode::OK, Json(enrollment)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/enrollments/{id}",
    description = "Remove an enrollment. Owner or admin.",
    responses(
        (status = 200, description = "Enrollment removed"),
        (status = 403, description = "Not the enrollment owner", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn unenroll_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = fetch_enrollment(&state, user, id).await?;
    let course_id = enrollment.course_id();

    enrollment
        .delete(state.mm())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    Course::bump_enrollment_count(state.mm(), course_id, -1)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/v1/enrollments/{id}/lectures/{lecture_id}/complete",
    request_body = CompleteLectureBody,
    description = "Mark a lecture completed. Idempotent per lecture.",
    params(
        ("id" = Uuid, Path, description = "ID of the enrollment"),
        ("lecture_id" = Uuid, Path, description = "ID of the lecture"),
    ),
    responses(
        (status = 200, description = "Completion recorded", body = Enrollment),
        (status = 403, description = "Not the enrollment owner", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn complete_lecture_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path((id, lecture_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CompleteLectureBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let mut enrollment = fetch_own_enrollment(&state, user, id).await?;

    let course = Course::find_by_id(state.mm(), user, enrollment.course_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    enrollment.complete_lecture(
        lecture_id,
        payload.watch_time_seconds.unwrap_or(0),
        course.total_lectures(),
    );
    enrollment
        .save(state.mm())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(enrollment)))
}

#[utoipa::path(
    get,
    path = "/api/v1/enrollments/{id}/notes",
    description = "List the notes on an enrollment",
    responses(
        (status = 200, description = "Notes", body = Vec<crate::model::entity::Note>),
        (status = 403, description = "Not the enrollment owner", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn notes_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = fetch_own_enrollment(&state, user, id).await?;

    Ok((StatusCode::OK, Json(enrollment.notes().to_vec())))
}

#[utoipa::path(
    post,
    path = "/api/v1/enrollments/{id}/notes",
    request_body = NoteCreateBody,
    description = "Attach a note to a lecture within this enrollment",
    responses(
        (status = 201, description = "Note added", body = Enrollment),
        (status = 400, description = "Note content missing or too long", body = ErrorResponse),
        (status = 403, description = "Not the enrollment owner", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn note_add_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NoteCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validate_note_content(&payload.content)?;
    let mut enrollment = fetch_own_enrollment(&state, user, id).await?;

    enrollment.add_note(payload.lecture_id, payload.content, payload.timestamp_seconds);
    enrollment
        .save(state.mm())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[utoipa::path(
    put,
    path = "/api/v1/enrollments/{id}/notes/{note_id}",
    request_body = NoteUpdateBody,
    description = "Replace a note's content",
    responses(
        (status = 200, description = "Note updated", body = Enrollment),
        (status = 400, description = "Note content missing or too long", body = ErrorResponse),
        (status = 403, description = "Not the enrollment owner", body = ErrorResponse),
        (status = 404, description = "Enrollment or note not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn note_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path((id, note_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<NoteUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validate_note_content(&payload.content)?;
    let mut enrollment = fetch_own_enrollment(&state, user, id).await?;

    enrollment
        .update_note(note_id, payload.content)
        .ok_or_else(|| WebError::resource_not_found(ResourceType::Note))?;
    enrollment
        .save(state.mm())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(enrollment)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/enrollments/{id}/notes/{note_id}",
    description = "Delete a note",
    responses(
        (status = 200, description = "Note deleted", body = Enrollment),
        (status = 403, description = "Not the enrollment owner", body = ErrorResponse),
        (status = 404, description = "Enrollment or note not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub async fn note_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path((id, note_id)): Path<(Uuid, Uuid)>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let mut enrollment = fetch_own_enrollment(&state, user, id).await?;

    enrollment
        .delete_note(note_id)
        .ok_or_else(|| WebError::resource_not_found(ResourceType::Note))?;
    enrollment
        .save(state.mm())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(enrollment)))
}

fn validate_note_content(content: &str) -> WebResult<()> {
    if content.trim().is_empty() {
        return Err(WebError::resource_bad_request(
            ResourceType::Note,
            "`content` is required",
        ));
    }
    if content.chars().count() > NOTE_CONTENT_MAX {
        return Err(WebError::resource_bad_request(
            ResourceType::Note,
            format!("`content` cannot exceed {NOTE_CONTENT_MAX} characters"),
        ));
    }
    Ok(())
}
