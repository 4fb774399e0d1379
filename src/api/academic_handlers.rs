//! Academic Catalog Handlers
//!
//! Schools and geography lookups, courses with their prerequisites,
//! sections, time blocks and classrooms.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::handlers::{AppState, SuccessResponse},
    models::{
        AffectedRows, Classroom, ClassroomRequest, Course, CourseQuery, CourseRequest,
        CourseWithPrerequisites, Department, District, NamedItem, NextCodeQuery,
        NextCodeResponse, PavilionRequest, Prerequisite, PrerequisiteRequest, Province, School,
        SchoolRequest, Section, SectionRequest, TimeBlock, TimeBlockRequest,
    },
    utils::error::AppResult,
};

// ---------------------------------------------------------------------------
// Schools and lookups
// ---------------------------------------------------------------------------

pub async fn list_schools(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<School>>>> {
    let schools = state.catalog_service.list_schools().await?;
    Ok(Json(SuccessResponse::new(schools)))
}

pub async fn get_school(
    State(state): State<AppState>,
    Path(school_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<School>>> {
    let school = state.catalog_service.get_school(school_id).await?;
    Ok(Json(SuccessResponse::new(school)))
}

pub async fn create_school(
    State(state): State<AppState>,
    Json(request): Json<SchoolRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<School>>)> {
    let school = state.catalog_service.create_school(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message("Escuela registrada", school)),
    ))
}

pub async fn update_school(
    State(state): State<AppState>,
    Path(school_id): Path<i32>,
    Json(request): Json<SchoolRequest>,
) -> AppResult<Json<SuccessResponse<School>>> {
    let school = state
        .catalog_service
        .update_school(school_id, request)
        .await?;
    Ok(Json(SuccessResponse::with_message("Escuela actualizada", school)))
}

pub async fn delete_school(
    State(state): State<AppState>,
    Path(school_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.catalog_service.delete_school(school_id).await?;
    Ok(Json(SuccessResponse::message("Escuela eliminada")))
}

pub async fn list_departments(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<Department>>>> {
    let departments = state.catalog_service.list_departments().await?;
    Ok(Json(SuccessResponse::new(departments)))
}

pub async fn list_provinces(
    State(state): State<AppState>,
    Path(department_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<Province>>>> {
    let provinces = state.catalog_service.list_provinces(department_id).await?;
    Ok(Json(SuccessResponse::new(provinces)))
}

pub async fn list_districts(
    State(state): State<AppState>,
    Path(province_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<District>>>> {
    let districts = state.catalog_service.list_districts(province_id).await?;
    Ok(Json(SuccessResponse::new(districts)))
}

pub async fn list_all_districts(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<District>>>> {
    let districts = state.catalog_service.list_all_districts().await?;
    Ok(Json(SuccessResponse::new(districts)))
}

pub async fn list_formations(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<NamedItem>>>> {
    let formations = state.catalog_service.list_formations().await?;
    Ok(Json(SuccessResponse::new(formations)))
}

pub async fn list_specialties(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<NamedItem>>>> {
    let specialties = state.catalog_service.list_specialties().await?;
    Ok(Json(SuccessResponse::new(specialties)))
}

pub async fn list_classroom_types(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<NamedItem>>>> {
    let types = state.catalog_service.list_classroom_types().await?;
    Ok(Json(SuccessResponse::new(types)))
}

pub async fn list_pavilions(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<NamedItem>>>> {
    let pavilions = state.catalog_service.list_pavilions().await?;
    Ok(Json(SuccessResponse::new(pavilions)))
}

pub async fn create_pavilion(
    State(state): State<AppState>,
    Json(request): Json<PavilionRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<NamedItem>>)> {
    let pavilion = state.catalog_service.create_pavilion(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message("Pabellón registrado", pavilion)),
    ))
}

// ---------------------------------------------------------------------------
// Courses and prerequisites
// ---------------------------------------------------------------------------

pub async fn create_course(
    State(state): State<AppState>,
    Json(request): Json<CourseRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<Course>>)> {
    let course = state.course_service.create_course(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message("Curso registrado", course)),
    ))
}

/// Courses, optionally filtered with `?ciclo=`
pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseQuery>,
) -> AppResult<Json<SuccessResponse<Vec<Course>>>> {
    let courses = state.course_service.list_courses(query.cycle).await?;
    Ok(Json(SuccessResponse::new(courses)))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Course>>> {
    let course = state.course_service.get_course(course_id).await?;
    Ok(Json(SuccessResponse::new(course)))
}

pub async fn update_course(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
    Json(request): Json<CourseRequest>,
) -> AppResult<Json<SuccessResponse<Course>>> {
    let course = state
        .course_service
        .update_course(course_id, request)
        .await?;
    Ok(Json(SuccessResponse::with_message("Curso actualizado", course)))
}

pub async fn delete_course(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.course_service.delete_course(course_id).await?;
    Ok(Json(SuccessResponse::message(
        "Curso y sus prerrequisitos eliminados",
    )))
}

pub async fn add_prerequisite(
    State(state): State<AppState>,
    Json(request): Json<PrerequisiteRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<Prerequisite>>)> {
    let prerequisite = state.course_service.add_prerequisite(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message(
            "Prerrequisito registrado",
            prerequisite,
        )),
    ))
}

pub async fn list_prerequisites(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<Prerequisite>>>> {
    let prerequisites = state.course_service.list_prerequisites(course_id).await?;
    Ok(Json(SuccessResponse::new(prerequisites)))
}

pub async fn list_all_prerequisites(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<CourseWithPrerequisites>>>> {
    let courses = state.course_service.list_all_prerequisites().await?;
    Ok(Json(SuccessResponse::new(courses)))
}

pub async fn delete_prerequisite(
    State(state): State<AppState>,
    Path(prerequisite_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state
        .course_service
        .delete_prerequisite(prerequisite_id)
        .await?;
    Ok(Json(SuccessResponse::message("Prerrequisito eliminado")))
}

pub async fn clear_prerequisites(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<AffectedRows>>> {
    let affected = state.course_service.clear_prerequisites(course_id).await?;
    Ok(Json(SuccessResponse::with_message(
        "Prerrequisitos eliminados",
        AffectedRows { affected },
    )))
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

pub async fn list_sections(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<Section>>>> {
    let sections = state.section_service.list_sections().await?;
    Ok(Json(SuccessResponse::new(sections)))
}

pub async fn get_section(
    State(state): State<AppState>,
    Path(section_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Section>>> {
    let section = state.section_service.get_section(section_id).await?;
    Ok(Json(SuccessResponse::new(section)))
}

pub async fn create_section(
    State(state): State<AppState>,
    Json(request): Json<SectionRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<Section>>)> {
    let section = state.section_service.create_section(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message("Sección registrada", section)),
    ))
}

pub async fn update_section(
    State(state): State<AppState>,
    Path(section_id): Path<i32>,
    Json(request): Json<SectionRequest>,
) -> AppResult<Json<SuccessResponse<Section>>> {
    let section = state
        .section_service
        .update_section(section_id, request)
        .await?;
    Ok(Json(SuccessResponse::with_message("Sección actualizada", section)))
}

pub async fn delete_section(
    State(state): State<AppState>,
    Path(section_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.section_service.delete_section(section_id).await?;
    Ok(Json(SuccessResponse::message("Sección eliminada")))
}

// ---------------------------------------------------------------------------
// Time blocks
// ---------------------------------------------------------------------------

pub async fn list_time_blocks(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<TimeBlock>>>> {
    let blocks = state.time_block_service.list_time_blocks().await?;
    Ok(Json(SuccessResponse::new(blocks)))
}

pub async fn get_time_block(
    State(state): State<AppState>,
    Path(block_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<TimeBlock>>> {
    let block = state.time_block_service.get_time_block(block_id).await?;
    Ok(Json(SuccessResponse::new(block)))
}

pub async fn create_time_block(
    State(state): State<AppState>,
    Json(request): Json<TimeBlockRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<TimeBlock>>)> {
    let block = state.time_block_service.create_time_block(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message(
            format!("Bloque {} registrado", block.block_code),
            block,
        )),
    ))
}

pub async fn update_time_block(
    State(state): State<AppState>,
    Path(block_id): Path<i32>,
    Json(request): Json<TimeBlockRequest>,
) -> AppResult<Json<SuccessResponse<TimeBlock>>> {
    let block = state
        .time_block_service
        .update_time_block(block_id, request)
        .await?;
    Ok(Json(SuccessResponse::with_message(
        "Bloque horario actualizado",
        block,
    )))
}

pub async fn delete_time_block(
    State(state): State<AppState>,
    Path(block_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.time_block_service.delete_time_block(block_id).await?;
    Ok(Json(SuccessResponse::message("Bloque horario eliminado")))
}

/// Code the next block for `?dia=&hora_inicio=` would receive
pub async fn preview_block_code(
    State(state): State<AppState>,
    Query(query): Query<NextCodeQuery>,
) -> AppResult<Json<SuccessResponse<NextCodeResponse>>> {
    let next = state.time_block_service.preview_next_code(query).await?;
    Ok(Json(SuccessResponse::new(next)))
}

// ---------------------------------------------------------------------------
// Classrooms
// ---------------------------------------------------------------------------

pub async fn list_classrooms(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<Vec<Classroom>>>> {
    let classrooms = state.classroom_service.list_classrooms().await?;
    Ok(Json(SuccessResponse::new(classrooms)))
}

pub async fn get_classroom(
    State(state): State<AppState>,
    Path(classroom_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Classroom>>> {
    let classroom = state.classroom_service.get_classroom(classroom_id).await?;
    Ok(Json(SuccessResponse::new(classroom)))
}

pub async fn create_classroom(
    State(state): State<AppState>,
    Json(request): Json<ClassroomRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<Classroom>>)> {
    let classroom = state.classroom_service.create_classroom(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_message("Aula registrada", classroom)),
    ))
}

pub async fn update_classroom(
    State(state): State<AppState>,
    Path(classroom_id): Path<i32>,
    Json(request): Json<ClassroomRequest>,
) -> AppResult<Json<SuccessResponse<Classroom>>> {
    let classroom = state
        .classroom_service
        .update_classroom(classroom_id, request)
        .await?;
    Ok(Json(SuccessResponse::with_message("Aula actualizada", classroom)))
}

pub async fn delete_classroom(
    State(state): State<AppState>,
    Path(classroom_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.classroom_service.delete_classroom(classroom_id).await?;
    Ok(Json(SuccessResponse::message("Aula eliminada")))
}

/// Operational classrooms still free at a time block
pub async fn available_classrooms(
    State(state): State<AppState>,
    Path(time_block_id): Path<i32>,
) -> AppResult<Json<SuccessResponse<Vec<Classroom>>>> {
    let classrooms = state.classroom_service.available_at(time_block_id).await?;
    Ok(Json(SuccessResponse::new(classrooms)))
}
