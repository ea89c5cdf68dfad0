use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub struct CookieAuthModifier;

impl Modify for CookieAuthModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(schema) = openapi.components.as_mut() {
            schema.add_security_scheme(
                "cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "SID",
                    "JWT token for current user",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::routes::user::user_signup_handler,
        crate::web::routes::user::user_signin_handler,
        crate::web::routes::user::user_list_handler,
        crate::web::routes::user::user_update_handler,
        crate::web::routes::user::user_delete_handler,
        crate::web::routes::courses::courses_list_handler,
        crate::web::routes::courses::course_get_handler,
        crate::web::routes::courses::course_create_handler,
        crate::web::routes::courses::instructor_courses_handler,
        crate::web::routes::courses::course_update_handler,
        crate::web::routes::courses::course_delete_handler,
        crate::web::routes::courses::course_publish_handler,
        crate::web::routes::courses::section_add_handler,
        crate::web::routes::courses::lecture_add_handler,
        crate::web::routes::courses::review_add_handler,
        crate::web::routes::enrollments::enroll_handler,
        crate::web::routes::enrollments::enrollments_list_handler,
        crate::web::routes::enrollments::analytics_handler,
        crate::web::routes::enrollments::enrollment_get_handler,
        crate::web::routes::enrollments::unenroll_handler,
        crate::web::routes::enrollments::complete_lecture_handler,
        crate::web::routes::enrollments::notes_list_handler,
        crate::web::routes::enrollments::note_add_handler,
        crate::web::routes::enrollments::note_update_handler,
        crate::web::routes::enrollments::note_delete_handler,
    ),
    modifiers(&CookieAuthModifier),
)]
pub struct ApiDoc;
