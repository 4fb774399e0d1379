//! Service Layer
//!
//! Business rules and data access for every area of the academic service.
//! Each service owns a clone of the pool and reports failures through its
//! own error enum, which converts into `AppError` at the HTTP boundary.

pub mod admin;
pub mod assignment;
pub mod attendance;
pub mod audit;
pub mod auth;
pub mod catalog;
pub mod classroom;
pub mod course;
pub mod email_service;
pub mod enrollment;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod grade;
pub mod material;
pub mod report;
pub mod section;
pub mod student;
pub mod teacher;
pub mod time_block;
pub mod timetable;

// Re-export services
pub use admin::AdminService;
pub use assignment::AssignmentService;
pub use attendance::AttendanceService;
pub use auth::AuthService;
pub use catalog::CatalogService;
pub use classroom::ClassroomService;
pub use course::CourseService;
pub use email_service::EmailService;
pub use enrollment::EnrollmentService;
pub use grade::GradeService;
pub use material::MaterialService;
pub use report::ReportService;
pub use section::SectionService;
pub use student::StudentService;
pub use teacher::TeacherService;
pub use time_block::TimeBlockService;
pub use timetable::TimetableService;
