//! Scheduling Handlers
//!
//! Assignment CRUD runs every proposal through the conflict checker before
//! anything is written. Weekly timetables are read-only views over the
//! committed assignments.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::handlers::{AppState, SuccessResponse},
    models::{
        AssignmentDetail, CreateAssignmentRequest, CreateAssignmentResponse, TimetableEntry,
        UpdateAssignmentRequest,
    },
    utils::error::AppResult,
};

/// Create one assignment, or two when a secondary session is proposed
pub async fn create_assignment(
    State(state): State<AppState>,
    Json(request): Json<CreateAssignmentRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<CreateAssignmentResponse>>)> {
    let response = state.assignment_service.create_assignment(request).await?;

    let message = if response.assignment_ids.len() > 1 {
        "Asignaciones registradas correctamente"
    } else {
        "Asignación registrada correctamente"
    };
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message(message, response)),
    ))
}

pub async fn list_assignments(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<AssignmentDetail>>>> {
    let assignments = state.assignment_service.list_assignments().await?;
    Ok(Json(SuccessResponse::new(assignments)))
}

pub async fn get_assignment(
    State(state): State<AppState>,
    Path(assignment_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<AssignmentDetail>>> {
    let assignment = state
        .assignment_service
        .get_assignment(assignment_id)
        .await?;
    Ok(Json(SuccessResponse::new(assignment)))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    Path(assignment_id): Path<i32>,
    Json(request): Json<UpdateAssignmentRequest>,
) -> AppResult<Json<SuccessResponse<AssignmentDetail>>> {
    let assignment = state
        .assignment_service
        .update_assignment(assignment_id, request)
        .await?;
    Ok(Json(SuccessResponse::with_message(
        "Asignación actualizada correctamente",
        assignment,
    )))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    Path(assignment_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state
        .assignment_service
        .delete_assignment(assignment_id)
        .await?;
    Ok(Json(SuccessResponse::message("Asignación eliminada correctamente")))
}

pub async fn teacher_timetable(
    State(state): State<AppState>,
    Path(teacher_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<TimetableEntry>>>> {
    let entries = state
        .timetable_service
        .teacher_timetable(teacher_id)
        .await?;
    Ok(Json(SuccessResponse::new(entries)))
}

pub async fn student_timetable(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<TimetableEntry>>>> {
    let entries = state
        .timetable_service
        .student_timetable(student_id)
        .await?;
    Ok(Json(SuccessResponse::new(entries)))
}
