//! Teacher Portal Handlers
//!
//! Self-service endpoints under `/docentes`: grades, attendance, teaching
//! material, course reports, profile and the teacher's own courses.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    api::handlers::{AppState, SuccessResponse},
    models::{
        AttendanceDay, AttendanceRecordedResponse, AttendanceRequest, AuditEntry,
        ChangePasswordRequest, CourseGrade, CourseSummaryReport, DateRangeQuery, EnrolledStudent,
        GradeDetailReport, GradeRequest, GradeUpsertResponse, LowPerformanceReport, Material,
        MaterialUpload, Teacher, TeacherCourse, UpdateProfileRequest,
    },
    service::material::{MaterialServiceError, UploadedFile},
    utils::error::{AppError, AppResult},
};

const DEFAULT_ACTIVITY_LIMIT: i64 = 50;

/// `?docente_id=` selector for course-wide listings
#[derive(Debug, Deserialize)]
pub struct TeacherQuery {
    #[serde(alias = "docente_id")]
    pub teacher_id: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    #[serde(alias = "limite")]
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

/// Insert or update the grade of a student; 201 only when a row was created
pub async fn upsert_grade(
    State(state): State<AppState>,
    Json(request): Json<GradeRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<GradeUpsertResponse>>)> {
    let response = state.grade_service.upsert_grade(request).await?;

    let (status, message) = if response.created {
        (StatusCode::CREATED, "Calificación registrada correctamente")
    } else {
        (StatusCode::OK, "Calificación actualizada correctamente")
    };
    Ok((status, Json(SuccessResponse::with_message(message, response))))
}

pub async fn course_grades(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
    Query(query): Query<TeacherQuery>,
) -> AppResult<Json<SuccessResponse<Vec<CourseGrade>>>> {
    let grades = state
        .grade_service
        .course_grades(course_id, query.teacher_id)
        .await?;
    Ok(Json(SuccessResponse::new(grades)))
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

pub async fn record_attendance(
    State(state): State<AppState>,
    Json(request): Json<AttendanceRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<AttendanceRecordedResponse>>)> {
    let response = state.attendance_service.record_session(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message(
            format!("Asistencia registrada para {} alumnos", response.recorded),
            response,
        )),
    ))
}

/// Attendance of a course grouped by date, optionally within `?fecha_inicio=&fecha_fin=`
pub async fn course_attendance(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
    Query(range): Query<DateRangeQuery>,
) -> AppResult<Json<SuccessResponse<Vec<AttendanceDay>>>> {
    let days = state
        .attendance_service
        .course_attendance(course_id, range)
        .await?;
    Ok(Json(SuccessResponse::new(days)))
}

// ---------------------------------------------------------------------------
// Teaching material
// ---------------------------------------------------------------------------

/// Multipart upload: `file` plus `course_id`, `teacher_id`, `title` and
/// optional `description` and `unit`
pub async fn upload_material(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<SuccessResponse<Material>>)> {
    let max_bytes = state.material_service.max_upload_bytes();
    let (upload, file) = read_material_form(multipart, max_bytes).await?;

    let material = state.material_service.upload(upload, file).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message(
            "Material subido correctamente",
            material,
        )),
    ))
}

pub async fn list_teacher_materials(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<Material>>>> {
    let materials = state.material_service.list_for_teacher(teacher_id).await?;
    Ok(Json(SuccessResponse::new(materials)))
}

pub async fn delete_material(
    State(state): State<AppState>,
    Path(material_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.material_service.delete(material_id).await?;
    Ok(Json(SuccessResponse::message("Material eliminado correctamente")))
}

async fn read_material_form(
    mut multipart: Multipart,
    max_bytes: usize,
) -> AppResult<(MaterialUpload, Option<UploadedFile>)> {
    let mut upload = MaterialUpload::default();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "archivo" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;
                if bytes.len() > max_bytes {
                    return Err(MaterialServiceError::TooLarge { max: max_bytes }.into());
                }
                file = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            other => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;
                apply_text_field(&mut upload, other, value.trim())?;
            }
        }
    }

    Ok((upload, file))
}

fn apply_text_field(upload: &mut MaterialUpload, name: &str, value: &str) -> AppResult<()> {
    match name {
        "course_id" | "curso_id" => upload.course_id = Some(parse_id(name, value)?),
        "teacher_id" | "docente_id" => upload.teacher_id = Some(parse_id(name, value)?),
        "title" | "titulo" => upload.title = value.to_string(),
        "description" | "descripcion" if !value.is_empty() => {
            upload.description = Some(value.to_string())
        }
        "unit" | "unidad" if !value.is_empty() => upload.unit = Some(value.to_string()),
        _ => {}
    }
    Ok(())
}

fn parse_id(name: &str, value: &str) -> AppResult<i32> {
    value
        .parse()
        .map_err(|_| AppError::Validation(format!("El campo {} debe ser numérico", name)))
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        MaterialServiceError::TooLarge { max: max_bytes }.into()
    } else {
        AppError::BadRequest(format!("Formulario inválido: {}", err.body_text()))
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Course totals; 403 when the teacher has no assignment in the course
pub async fn course_summary_report(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
    Query(query): Query<TeacherQuery>,
) -> AppResult<Json<SuccessResponse<CourseSummaryReport>>> {
    let report = state
        .report_service
        .course_summary(course_id, query.teacher_id)
        .await?;
    Ok(Json(SuccessResponse::new(report)))
}

pub async fn low_performance_report(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
    Query(query): Query<TeacherQuery>,
) -> AppResult<Json<SuccessResponse<LowPerformanceReport>>> {
    let report = state
        .report_service
        .low_performance(course_id, query.teacher_id)
        .await?;
    Ok(Json(SuccessResponse::new(report)))
}

pub async fn grade_detail_report(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
    Query(query): Query<TeacherQuery>,
) -> AppResult<Json<SuccessResponse<GradeDetailReport>>> {
    let report = state
        .report_service
        .grade_detail(course_id, query.teacher_id)
        .await?;
    Ok(Json(SuccessResponse::new(report)))
}

// ---------------------------------------------------------------------------
// Profile and own courses
// ---------------------------------------------------------------------------

pub async fn get_profile(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Teacher>>> {
    let teacher = state.teacher_service.get_teacher(teacher_id).await?;
    Ok(Json(SuccessResponse::new(teacher)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
    Json(request): Json<UpdateProfileRequest>,
) -> AppResult<Json<SuccessResponse<Teacher>>> {
    let teacher = state
        .teacher_service
        .update_profile(teacher_id, request)
        .await?;
    Ok(Json(SuccessResponse::with_message(
        "Perfil actualizado correctamente",
        teacher,
    )))
}

pub async fn change_password(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<Json<SuccessResponse<()>>> {
    let user_id = state.teacher_service.user_id_for(teacher_id).await?;
    state.auth_service.change_password(user_id, request).await?;
    Ok(Json(SuccessResponse::message("Contraseña actualizada correctamente")))
}

pub async fn list_courses(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<TeacherCourse>>>> {
    let courses = state.teacher_service.list_courses(teacher_id).await?;
    Ok(Json(SuccessResponse::new(courses)))
}

pub async fn list_students(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<EnrolledStudent>>>> {
    let students = state.teacher_service.list_students(teacher_id).await?;
    Ok(Json(SuccessResponse::new(students)))
}

pub async fn assignment_roster(
    State(state): State<AppState>,
    Path((teacher_id, assignment_id)): Path<(i32, i32)>,
) -> AppResult<Json<SuccessResponse<Vec<EnrolledStudent>>>> {
    let students = state
        .teacher_service
        .assignment_roster(teacher_id, assignment_id)
        .await?;
    Ok(Json(SuccessResponse::new(students)))
}

/// Latest audit entries, `?limite=` capped at 200
pub async fn activity(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<SuccessResponse<Vec<AuditEntry>>>> {
    let entries = state
        .teacher_service
        .activity(teacher_id, query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT))
        .await?;
    Ok(Json(SuccessResponse::new(entries)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_fields_fill_upload() {
        let mut upload = MaterialUpload::default();
        apply_text_field(&mut upload, "curso_id", "12").unwrap();
        apply_text_field(&mut upload, "teacher_id", "3").unwrap();
        apply_text_field(&mut upload, "titulo", "Semana 1").unwrap();
        apply_text_field(&mut upload, "unidad", "").unwrap();
        apply_text_field(&mut upload, "ignored", "x").unwrap();

        assert_eq!(upload.course_id, Some(12));
        assert_eq!(upload.teacher_id, Some(3));
        assert_eq!(upload.title, "Semana 1");
        assert!(upload.unit.is_none());
    }

    #[test]
    fn test_non_numeric_id_is_rejected() {
        let mut upload = MaterialUpload::default();
        let err = apply_text_field(&mut upload, "course_id", "abc").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
