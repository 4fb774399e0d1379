//! Student Portal Handlers
//!
//! Self-service endpoints under `/alumno`.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    api::handlers::{AppState, SuccessResponse},
    models::{
        EnrollRequest, Enrollment, Material, OfferedAssignment, Student, StudentAttendance,
        StudentGrade,
    },
    utils::error::AppResult,
};

pub async fn get_profile(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Student>>> {
    let student = state.student_service.get_student(student_id).await?;
    Ok(Json(SuccessResponse::new(student)))
}

/// Assignments in active sections the student is not enrolled in yet
pub async fn available_assignments(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<OfferedAssignment>>>> {
    let offered = state.enrollment_service.available(student_id).await?;
    Ok(Json(SuccessResponse::new(offered)))
}

pub async fn my_enrollments(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<OfferedAssignment>>>> {
    let enrolled = state.enrollment_service.my_enrollments(student_id).await?;
    Ok(Json(SuccessResponse::new(enrolled)))
}

pub async fn enroll(
    State(state): State<AppState>,
    Json(request): Json<EnrollRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<Enrollment>>)> {
    let enrollment = state.enrollment_service.enroll(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message(
            "Matrícula registrada correctamente",
            enrollment,
        )),
    ))
}

pub async fn drop_enrollment(
    State(state): State<AppState>,
    Path((student_id, enrollment_id)): Path<(i32, i32)>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state
        .enrollment_service
        .drop_enrollment(student_id, enrollment_id)
        .await?;
    Ok(Json(SuccessResponse::message("Matrícula retirada correctamente")))
}

pub async fn my_grades(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<StudentGrade>>>> {
    let grades = state.grade_service.student_grades(student_id).await?;
    Ok(Json(SuccessResponse::new(grades)))
}

pub async fn my_attendance(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<StudentAttendance>>>> {
    let records = state
        .attendance_service
        .student_attendance(student_id)
        .await?;
    Ok(Json(SuccessResponse::new(records)))
}

/// Material of the courses the student is actively enrolled in
pub async fn my_materials(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<Material>>>> {
    let materials = state.material_service.list_for_student(student_id).await?;
    Ok(Json(SuccessResponse::new(materials)))
}

/// Stream a stored file back under its original name
pub async fn download_material(
    State(state): State<AppState>,
    Path(material_id): Path<i32>,
) -> AppResult<Response> {
    let (material, bytes) = state.material_service.download(material_id).await?;

    let disposition = attachment_header(&material.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, material.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn attachment_header(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{}\"", cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_header_quotes_name() {
        assert_eq!(
            attachment_header("silabo.pdf"),
            "attachment; filename=\"silabo.pdf\""
        );
        assert_eq!(
            attachment_header("a\"b\n.pdf"),
            "attachment; filename=\"ab.pdf\""
        );
    }
}
