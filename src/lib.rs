//! Academic Service Library
//!
//! Back office and self-service API for a university's academic
//! administration: people, the course catalog, scheduling with conflict
//! checks, grades, attendance, teaching material and enrollment.
//!
//! # Features
//!
//! - **Role logins**: per-role login routes with bcrypt password checks
//! - **People management**: students, teachers and administrators, with
//!   credential emails sent after each account is created
//! - **Catalog**: schools, geography lookups, courses and prerequisites
//! - **Scheduling**: time blocks with generated codes, classrooms, and
//!   assignments checked for capacity and double booking
//! - **Teaching**: grade computation, attendance with low-attendance alerts,
//!   material uploads, course reports and an audit trail of teacher actions
//! - **Flexible Router**: areas toggled through `RouterBuilder`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use academic_service::{
//!     api::{AppState, RouterBuilder},
//!     config::UploadConfig,
//!     database::DatabaseConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = config.create_pool().await?;
//!
//!     // No mail transport: accounts are created with `email_sent: false`
//!     let state = AppState::new(pool, None, 12, UploadConfig::default());
//!
//!     let app = RouterBuilder::with_back_office_routes()
//!         .build()
//!         .with_state(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **API Layer**: HTTP handlers per area and the route builder
//! - **Service Layer**: business rules and SQL, one service per area
//! - **Models**: rows and request/response payloads
//! - **Database**: pool configuration
//! - **Utils**: errors, validators and password helpers

/// HTTP API layer with handlers and configurable routing
pub mod api;

/// Configuration management for all service settings
pub mod config;

/// Database connection management and configuration
pub mod database;

/// Data models and request/response structures
pub mod models;

/// Business rules and data access
pub mod service;

/// Shared utilities for security, validation, and error handling
pub mod utils;

// Re-export commonly used types for convenient access
pub use api::{create_routes, AppState, RouterBuilder};
pub use models::{Role, RecordStatus};
pub use service::{
    AdminService, AssignmentService, AttendanceService, AuthService, CatalogService,
    ClassroomService, CourseService, EmailService, EnrollmentService, GradeService,
    MaterialService, ReportService, SectionService, StudentService, TeacherService,
    TimeBlockService, TimetableService,
};
pub use utils::error::{AppError, AppResult, ErrorResponse};

// Re-export database utilities for configuration
pub use database::{DatabaseConfig, DatabasePool};

// Re-export configuration system
pub use config::{env, AppConfig, EmailConfig, SecurityConfig, ServerConfig, UploadConfig};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
