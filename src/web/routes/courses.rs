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
        CrudRepository, Page, ResourceType, ResourceTyped, check_access,
        entity::{Course, CourseCreate, Enrollment, LectureCreate, SectionCreate},
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::courses::{CourseDetailResponse, CourseListQuery, ReviewBody},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(courses_list_handler).post(course_create_handler))
        .route("/mine", get(instructor_courses_handler))
        .route(
            "/{id}",
            get(course_get_handler)
                .put(course_update_handler)
                .delete(course_delete_handler),
        )
        .route("/{id}/publish", post(course_publish_handler))
        .route("/{id}/sections", post(section_add_handler))
        .route("/{id}/sections/{section_id}/lectures", post(lecture_add_handler))
        .route("/{id}/reviews", post(review_add_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn validate_course_body(body: &CourseCreate) -> WebResult<()> {
    let missing = [
        ("title", body.title.trim().is_empty()),
        ("description", body.description.trim().is_empty()),
        ("category", body.category.trim().is_empty()),
        ("level", body.level.trim().is_empty()),
    ]
    .into_iter()
    .find_map(|(name, empty)| empty.then_some(name));

    if let Some(field) = missing {
        return Err(WebError::resource_bad_request(
            Course::get_resource_type(),
            format!("`{field}` is required"),
        ));
    }
    if body.price < 0.0 {
        return Err(WebError::resource_bad_request(
            Course::get_resource_type(),
            "`price` must not be negative",
        ));
    }
    Ok(())
}

async fn fetch_owned_course(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Course> {
    let course = Course::find_by_id(state.mm(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    check_access(state.mm(), user, &course, user.user_id())
        .await
        .map_err(|e| WebError::from_database(Course::get_resource_type(), e))?;

    Ok(course)
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/",
    description = "Browse published courses, newest first",
    params(
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("level" = Option<String>, Query, description = "Filter by level"),
        ("limit" = Option<i64>, Query, description = "Page size, default 10"),
        ("offset" = Option<i64>, Query, description = "Page offset, default 0"),
    ),
    responses(
        (status = 200, description = "Published courses", body = Page<Course>),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses"
)]
pub async fn courses_list_handler(
    State(state): State<AppState>,
    Query(query): Query<CourseListQuery>,
) -> WebResult<impl IntoResponse> {
    let category = query.category.as_deref();
    let level = query.level.as_deref();

    let items = Course::list_published(state.mm(), category, level, query.limit, query.offset)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;
    let total = Course::count_published(state.mm(), category, level)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((
        StatusCode::OK,
        Json(Page::new(items, total, query.limit, query.offset)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}",
    description = "Fetch one course with its content tree",
    params(
        ("id" = Uuid, Path, description = "ID of the course")
    ),
    responses(
        (status = 200, description = "Course found", body = CourseDetailResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses"
)]
pub async fn course_get_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ctx: RequestContext,
) -> WebResult<impl IntoResponse> {
    let actor = ctx
        .maybe_user()
        .cloned()
        .unwrap_or_else(AuthenticatedUser::admin);

    let course = Course::find_by_id(state.mm(), &actor, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    let is_enrolled = match ctx.maybe_user() {
        Some(user) => Enrollment::find_by_pair(state.mm(), user.user_id(), course.id())
            .await
            .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?
            .is_some(),
        None => false,
    };

    Ok((StatusCode::OK, Json(CourseDetailResponse { course, is_enrolled })))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/",
    request_body = CourseCreate,
    description = "Create a draft course owned by the caller",
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 400, description = "Missing required fields", body = ErrorResponse),
        (status = 403, description = "Only instructors and admins may author courses", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub async fn course_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if !user.can_author() {
        return Err(WebError::resource_forbidden(Course::get_resource_type()));
    }
    validate_course_body(&payload)?;

    let created = Course::create(state.mm(), user, payload)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/mine",
    description = "List courses authored by the caller, drafts included",
    responses(
        (status = 200, description = "Authored courses", body = Vec<Course>),
        (status = 403, description = "Only instructors and admins author courses", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub async fn instructor_courses_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if !user.can_author() {
        return Err(WebError::resource_forbidden(Course::get_resource_type()));
    }

    let courses = Course::all_by_instructor(state.mm(), user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(courses)))
}

#[utoipa::path(
    put,
    path = "/api/v1/courses/{id}",
    request_body = CourseCreate,
    description = "Update course metadata. Owner or admin only.",
    responses(
        (status = 200, description = "Course updated", body = Course),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub async fn course_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourseCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validate_course_body(&payload)?;
    let course = fetch_owned_course(&state, user, id).await?;

    let updated = course
        .update(state.mm(), user, payload)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/courses/{id}",
    description = "Hard-delete a course; enrollments go with it. Owner or admin only.",
    responses(
        (status = 200, description = "Course deleted"),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub async fn course_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = fetch_owned_course(&state, user, id).await?;

    course
        .delete(state.mm(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/publish",
    description = "Toggle the publish flag. First publish stamps `published_at`.",
    responses(
        (status = 200, description = "Publish flag flipped", body = Course),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub async fn course_publish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let mut course = fetch_owned_course(&state, user, id).await?;

    course.toggle_publish();
    course.recompute_derived();
    course
        .save(state.mm())
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(course)))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/sections",
    request_body = SectionCreate,
    description = "Append a section to the course content tree",
    responses(
        (status = 201, description = "Section added", body = Course),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub async fn section_add_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SectionCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if payload.title.trim().is_empty() {
        return Err(WebError::resource_bad_request(
            ResourceType::Section,
            "`title` is required",
        ));
    }
    let mut course = fetch_owned_course(&state, user, id).await?;

    course.add_section(payload);
    course.recompute_derived();
    course
        .save(state.mm())
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/sections/{section_id}/lectures",
    request_body = LectureCreate,
    description = "Append a lecture to a section",
    responses(
        (status = 201, description = "Lecture added", body = Course),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course or section not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub async fn lecture_add_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path((id, section_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<LectureCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if payload.title.trim().is_empty() || payload.video_ref.trim().is_empty() {
        return Err(WebError::resource_bad_request(
            ResourceType::Lecture,
            "`title` and `video_ref` are required",
        ));
    }
    if payload.duration_minutes < 0 {
        return Err(WebError::resource_bad_request(
            ResourceType::Lecture,
            "`duration_minutes` must not be negative",
        ));
    }
    let mut course = fetch_owned_course(&state, user, id).await?;

    if course.add_lecture(section_id, payload).is_none() {
        return Err(WebError::resource_not_found(ResourceType::Section));
    }
    course.recompute_derived();
    course
        .save(state.mm())
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/reviews",
    request_body = ReviewBody,
    description = "Leave a review. Requires an enrollment; one review per user.",
    responses(
        (status = 201, description = "Review added", body = Course),
        (status = 400, description = "Rating out of range", body = ErrorResponse),
        (status = 403, description = "Caller is not enrolled in this course", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Caller already reviewed this course", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub async fn review_add_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if !(1..=5).contains(&payload.rating) {
        return Err(WebError::resource_bad_request(
            ResourceType::Review,
            "`rating` must be between 1 and 5",
        ));
    }
    if payload.comment.trim().is_empty() {
        return Err(WebError::resource_bad_request(
            ResourceType::Review,
            "`comment` is required",
        ));
    }

    let enrolled = Enrollment::find_by_pair(state.mm(), user.user_id(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?
        .is_some();
    if !enrolled {
        return Err(WebError::resource_forbidden(ResourceType::Review));
    }

    let mut course = Course::find_by_id(state.mm(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    course
        .add_review(user.user_id(), payload.rating, payload.comment)
        .map_err(|e| WebError::from_database(ResourceType::Review, e))?;
    course.recompute_derived();
    course
        .save(state.mm())
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(course)))
}
