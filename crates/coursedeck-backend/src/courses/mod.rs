mod store;

pub(crate) use store::delete_courses_by_author;
pub use store::{course_stats, CourseStore};
