mod user;
pub use user::{UserEntity, UserEntityCreateUpdate};

mod course;
pub use course::{
    Course, CourseCreate, Lecture, LectureCreate, Review, STATUS_ARCHIVED, STATUS_DRAFT,
    STATUS_PUBLISHED, Section, SectionCreate, slugify,
};

mod enrollment;
pub use enrollment::{
    CompletedLecture, Enrollment, EnrollmentFilter, EnrollmentWithCourseRow, Note,
    progress_percent,
};
