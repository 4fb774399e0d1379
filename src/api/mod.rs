//! API Layer
//!
//! HTTP endpoints of the academic service, grouped by area.

pub mod academic_handlers;
pub mod handlers;
pub mod people_handlers;
pub mod routes;
pub mod schedule_handlers;
pub mod student_handlers;
pub mod teacher_handlers;

// Re-export commonly used types
pub use handlers::{AppState, SuccessResponse};
pub use routes::{
    create_back_office_routes, create_minimal_routes, create_portal_routes, create_routes,
    RouterBuilder,
};
