//! Data Models Module
//!
//! Row types read from the database and request/response payloads, grouped
//! by area. Request types derive `Validate` where field rules apply.

pub mod academic;
pub mod auth;
pub mod catalog;
pub mod common;
pub mod course;
pub mod people;
pub mod schedule;

// Re-export commonly used types
pub use academic::*;
pub use auth::{AccountStatus, ChangePasswordRequest, LoginRequest, LoginResponse, Role};
pub use catalog::*;
pub use common::*;
pub use course::{
    Course, CourseQuery, CourseRequest, CourseWithPrerequisites, Prerequisite, PrerequisiteRequest,
};
pub use people::*;
pub use schedule::*;
