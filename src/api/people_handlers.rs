//! People Management Handlers
//!
//! Back-office endpoints for students, teachers and administrators.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::handlers::{AppState, SuccessResponse},
    models::{
        AdminRequest, AdminStatusRequest, Administrator, CreateAdminResponse,
        CreateStudentResponse, CreateTeacherRequest, CreateTeacherResponse, Student,
        StudentRequest, Teacher, UpdateTeacherRequest,
    },
    utils::error::AppResult,
};

// ---------------------------------------------------------------------------
// Students
// ---------------------------------------------------------------------------

/// Register a student and mail the temporary credentials
pub async fn create_student(
    State(state): State<AppState>,
    Json(request): Json<StudentRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<CreateStudentResponse>>)> {
    let response = state.student_service.create_student(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message(
            "Alumno registrado correctamente",
            response,
        )),
    ))
}

pub async fn list_students(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<Student>>>> {
    let students = state.student_service.list_active().await?;
    Ok(Json(SuccessResponse::new(students)))
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Student>>> {
    let student = state.student_service.get_student(student_id).await?;
    Ok(Json(SuccessResponse::new(student)))
}

pub async fn update_student(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
    Json(request): Json<StudentRequest>,
) -> AppResult<Json<SuccessResponse<Student>>> {
    let student = state
        .student_service
        .update_student(student_id, request)
        .await?;
    Ok(Json(SuccessResponse::with_message(
        "Alumno actualizado correctamente",
        student,
    )))
}

/// Soft delete: the account is deactivated, records are kept
pub async fn delete_student(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.student_service.deactivate_student(student_id).await?;
    Ok(Json(SuccessResponse::message("Alumno desactivado correctamente")))
}

// ---------------------------------------------------------------------------
// Teachers
// ---------------------------------------------------------------------------

pub async fn create_teacher(
    State(state): State<AppState>,
    Json(request): Json<CreateTeacherRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<CreateTeacherResponse>>)> {
    let response = state.teacher_service.create_teacher(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message(
            "Docente registrado correctamente",
            response,
        )),
    ))
}

pub async fn list_teachers(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<Teacher>>>> {
    let teachers = state.teacher_service.list_teachers().await?;
    Ok(Json(SuccessResponse::new(teachers)))
}

pub async fn get_teacher(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Teacher>>> {
    let teacher = state.teacher_service.get_teacher(teacher_id).await?;
    Ok(Json(SuccessResponse::new(teacher)))
}

pub async fn update_teacher(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
    Json(request): Json<UpdateTeacherRequest>,
) -> AppResult<Json<SuccessResponse<Teacher>>> {
    let teacher = state
        .teacher_service
        .update_teacher(teacher_id, request)
        .await?;
    Ok(Json(SuccessResponse::with_message(
        "Docente actualizado correctamente",
        teacher,
    )))
}

pub async fn delete_teacher(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.teacher_service.deactivate_teacher(teacher_id).await?;
    Ok(Json(SuccessResponse::message("Docente desactivado correctamente")))
}

// ---------------------------------------------------------------------------
// Administrators
// ---------------------------------------------------------------------------

/// Create an administrator with a generated email and password
pub async fn create_admin(
    State(state): State<AppState>,
    Json(request): Json<AdminRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<CreateAdminResponse>>)> {
    let response = state.admin_service.create_admin(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message(
            "Administrador creado correctamente",
            response,
        )),
    ))
}

pub async fn list_admins(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<Administrator>>>> {
    let admins = state.admin_service.list_admins().await?;
    Ok(Json(SuccessResponse::new(admins)))
}

pub async fn get_admin(
    State(state): State<AppState>,
    Path(admin_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Administrator>>> {
    let admin = state.admin_service.get_admin(admin_id).await?;
    Ok(Json(SuccessResponse::new(admin)))
}

pub async fn update_admin(
    State(state): State<AppState>,
    Path(admin_id): Path<i32>,
    Json(request): Json<AdminRequest>,
) -> AppResult<Json<SuccessResponse<Administrator>>> {
    let admin = state.admin_service.update_admin(admin_id, request).await?;
    Ok(Json(SuccessResponse::with_message(
        "Administrador actualizado correctamente",
        admin,
    )))
}

/// Hard delete of the account and its profile
pub async fn delete_admin(
    State(state): State<AppState>,
    Path(admin_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.admin_service.delete_admin(admin_id).await?;
    Ok(Json(SuccessResponse::message("Administrador eliminado correctamente")))
}

pub async fn set_admin_status(
    State(state): State<AppState>,
    Path(admin_id): Path<i32>,
    Json(request): Json<AdminStatusRequest>,
) -> AppResult<Json<SuccessResponse<Administrator>>> {
    let admin = state
        .admin_service
        .set_status(admin_id, request.status)
        .await?;
    Ok(Json(SuccessResponse::with_message(
        "Estado actualizado correctamente",
        admin,
    )))
}
