//! HTTP Request Handlers
//!
//! Shared application state, the response envelope, and the handlers that
//! do not belong to a single back-office area: health and login.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use crate::{
    config::UploadConfig,
    models::{HealthCheckResponse, LoginRequest, LoginResponse},
    service::{
        auth::AuthServiceError, AdminService, AssignmentService, AttendanceService, AuthService,
        CatalogService, ClassroomService, CourseService, EmailService, EnrollmentService,
        GradeService, MaterialService, ReportService, SectionService, StudentService,
        TeacherService, TimeBlockService, TimetableService,
    },
    utils::error::AppResult,
    VERSION,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub student_service: Arc<StudentService>,
    pub teacher_service: Arc<TeacherService>,
    pub admin_service: Arc<AdminService>,
    pub catalog_service: Arc<CatalogService>,
    pub course_service: Arc<CourseService>,
    pub section_service: Arc<SectionService>,
    pub time_block_service: Arc<TimeBlockService>,
    pub classroom_service: Arc<ClassroomService>,
    pub assignment_service: Arc<AssignmentService>,
    pub grade_service: Arc<GradeService>,
    pub attendance_service: Arc<AttendanceService>,
    pub material_service: Arc<MaterialService>,
    pub enrollment_service: Arc<EnrollmentService>,
    pub timetable_service: Arc<TimetableService>,
    pub report_service: Arc<ReportService>,
}

impl AppState {
    /// Wire every service onto one pool.
    ///
    /// `email_service` is shared by the services that hand out credentials;
    /// `None` turns credential mails off.
    pub fn new(
        db_pool: PgPool,
        email_service: Option<Arc<EmailService>>,
        bcrypt_cost: u32,
        uploads: UploadConfig,
    ) -> Self {
        Self {
            auth_service: Arc::new(AuthService::with_bcrypt_cost(db_pool.clone(), bcrypt_cost)),
            student_service: Arc::new(
                StudentService::with_email_service(db_pool.clone(), email_service.clone())
                    .with_bcrypt_cost(bcrypt_cost),
            ),
            teacher_service: Arc::new(
                TeacherService::with_email_service(db_pool.clone(), email_service.clone())
                    .with_bcrypt_cost(bcrypt_cost),
            ),
            admin_service: Arc::new(
                AdminService::with_email_service(db_pool.clone(), email_service)
                    .with_bcrypt_cost(bcrypt_cost),
            ),
            catalog_service: Arc::new(CatalogService::new(db_pool.clone())),
            course_service: Arc::new(CourseService::new(db_pool.clone())),
            section_service: Arc::new(SectionService::new(db_pool.clone())),
            time_block_service: Arc::new(TimeBlockService::new(db_pool.clone())),
            classroom_service: Arc::new(ClassroomService::new(db_pool.clone())),
            assignment_service: Arc::new(AssignmentService::new(db_pool.clone())),
            grade_service: Arc::new(GradeService::new(db_pool.clone())),
            attendance_service: Arc::new(AttendanceService::new(db_pool.clone())),
            material_service: Arc::new(MaterialService::new(db_pool.clone(), uploads)),
            enrollment_service: Arc::new(EnrollmentService::new(db_pool.clone())),
            timetable_service: Arc::new(TimetableService::new(db_pool.clone())),
            report_service: Arc::new(ReportService::new(db_pool)),
        }
    }
}

/// Standard success response wrapper
#[derive(Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mensaje: Option<String>,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            mensaje: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            mensaje: Some(message.into()),
            data,
        }
    }
}

impl SuccessResponse<()> {
    /// Message-only response for deletes and status changes
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_message(message, ())
    }
}

/// Health check endpoint
pub async fn health_check(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<HealthCheckResponse>>> {
    state.auth_service.health_check().await?;

    let response = HealthCheckResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: VERSION.to_string(),
    };

    Ok(Json(SuccessResponse::new(response)))
}

/// `POST /auth/login` without a role segment
pub async fn login_without_role() -> AppResult<Json<SuccessResponse<()>>> {
    Err(AuthServiceError::RoleRouteRequired.into())
}

/// `POST /auth/login/{admin|docente|alumno|aplicativo}`
pub async fn login(
    State(state): State<AppState>,
    Path(route): Path<String>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<SuccessResponse<LoginResponse>>> {
    let response = state.auth_service.login(&route, request).await?;
    Ok(Json(SuccessResponse::with_message("Login exitoso", response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response_creation() {
        let response = SuccessResponse::new("test data");
        assert!(response.success);
        assert_eq!(response.data, "test data");
        assert!(response.mensaje.is_none());
    }

    #[test]
    fn test_message_envelope() {
        let body = serde_json::to_value(SuccessResponse::message("Curso eliminado")).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["mensaje"], "Curso eliminado");

        let body = serde_json::to_value(SuccessResponse::new(vec![1, 2])).unwrap();
        assert!(body.get("mensaje").is_none());
        assert_eq!(body["data"], serde_json::json!([1, 2]));
    }
}
