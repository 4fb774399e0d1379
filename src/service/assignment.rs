//! Assignment Service
//!
//! Places a course section with a teacher in a classroom at a time block,
//! optionally with a second weekly session. Before anything is written the
//! proposal goes through a fixed sequence of checks; the first failing check
//! decides the error the client sees.
//!
//! The unique constraints on `assignments` back the three non-overlap checks,
//! so a proposal that races past the checks still fails on insert, and it
//! fails with the same error the check would have produced.

use log::{info, warn};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use crate::models::{
    AssignmentDetail, ClassroomStatus, CreateAssignmentRequest, CreateAssignmentResponse,
    RecordStatus, UpdateAssignmentRequest,
};
use crate::utils::error::{is_foreign_key_violation, violated_constraint, AppError};

#[derive(Error, Debug)]
pub enum AssignmentServiceError {
    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("Expected enrollment must be a positive integer")]
    InvalidEnrollment,

    #[error("A secondary classroom needs a secondary time block")]
    OrphanSecondaryClassroom,

    #[error("The secondary time block repeats the primary one")]
    RepeatedTimeBlock,

    #[error("Section {0} not found")]
    SectionNotFound(i32),

    #[error("Section {0} is not active")]
    SectionInactive(i32),

    #[error("Time block {0} not found")]
    TimeBlockNotFound(i32),

    #[error("Time block {0} is not active")]
    TimeBlockInactive(i32),

    #[error("Classroom {0} not found")]
    ClassroomNotFound(i32),

    #[error("Classroom {0} is not operational")]
    ClassroomNotOperational(i32),

    #[error("Classroom {classroom_id} holds {capacity} students, {requested} requested")]
    CapacityExceeded {
        classroom_id: i32,
        capacity: i32,
        requested: i32,
    },

    #[error("Classroom already occupied at this time block")]
    ClassroomOccupied,

    #[error("Teacher already assigned at this time block")]
    TeacherBusy,

    #[error("Course and section already scheduled at this time block")]
    DuplicateAssignment,

    #[error("Course or teacher not found")]
    ReferenceNotFound,

    #[error("Assignment not found")]
    AssignmentNotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl AssignmentServiceError {
    /// Constraint violations on insert or update read like the matching pre-check
    fn from_write(err: sqlx::Error) -> Self {
        match violated_constraint(&err) {
            Some("assignments_block_classroom_key") => Self::ClassroomOccupied,
            Some("assignments_block_teacher_key") => Self::TeacherBusy,
            Some("assignments_course_section_block_key") => Self::DuplicateAssignment,
            _ if is_foreign_key_violation(&err) => Self::ReferenceNotFound,
            _ => Self::DatabaseError(err),
        }
    }
}

impl From<AssignmentServiceError> for AppError {
    fn from(err: AssignmentServiceError) -> Self {
        use AssignmentServiceError as E;

        match err {
            E::MissingFields(fields) => {
                AppError::Validation(format!("Faltan campos obligatorios: {}", fields))
            }
            E::InvalidEnrollment => AppError::Validation(
                "La cantidad de estudiantes debe ser un entero positivo".to_string(),
            ),
            E::OrphanSecondaryClassroom => AppError::Validation(
                "El aula del segundo horario requiere un segundo horario".to_string(),
            ),
            E::RepeatedTimeBlock => AppError::Validation(
                "El segundo horario no puede ser igual al primero".to_string(),
            ),
            E::SectionNotFound(_) => AppError::NotFound("Sección no encontrada".to_string()),
            E::SectionInactive(_) => AppError::BadRequest("La sección no está activa".to_string()),
            E::TimeBlockNotFound(id) => {
                AppError::NotFound(format!("Bloque horario {} no encontrado", id))
            }
            E::TimeBlockInactive(id) => {
                AppError::BadRequest(format!("El bloque horario {} no está activo", id))
            }
            E::ClassroomNotFound(id) => AppError::NotFound(format!("Aula {} no encontrada", id)),
            E::ClassroomNotOperational(id) => {
                AppError::BadRequest(format!("El aula {} no está operativa", id))
            }
            E::CapacityExceeded {
                capacity,
                requested,
                ..
            } => AppError::BadRequest(format!(
                "La cantidad de estudiantes ({}) excede la capacidad del aula ({})",
                requested, capacity
            )),
            E::ClassroomOccupied => AppError::BadRequest(
                "El aula ya está ocupada en ese bloque horario".to_string(),
            ),
            E::TeacherBusy => AppError::BadRequest(
                "El docente ya tiene una asignación en ese bloque horario".to_string(),
            ),
            E::DuplicateAssignment => AppError::BadRequest(
                "El curso y la sección ya están registrados en ese bloque horario".to_string(),
            ),
            E::ReferenceNotFound => {
                AppError::NotFound("Curso o docente no encontrado".to_string())
            }
            E::AssignmentNotFound => AppError::NotFound("Asignación no encontrada".to_string()),
            E::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type AssignmentServiceResult<T> = Result<T, AssignmentServiceError>;

/// One weekly session: a classroom at a time block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub time_block_id: i32,
    pub classroom_id: i32,
}

/// A proposal that passed the field checks
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentPlan {
    pub course_id: i32,
    pub section_id: i32,
    pub teacher_id: i32,
    pub expected_enrollment: i32,
    pub primary: Session,
    pub secondary: Option<Session>,
    pub notes: Option<String>,
}

impl AssignmentPlan {
    /// Required fields, a positive enrollment and two distinct time blocks.
    ///
    /// The secondary session reuses the primary classroom unless it names its own.
    pub fn from_request(request: CreateAssignmentRequest) -> AssignmentServiceResult<Self> {
        let mut missing = Vec::new();
        if request.course_id.is_none() {
            missing.push("course_id");
        }
        if request.section_id.is_none() {
            missing.push("section_id");
        }
        if request.teacher_id.is_none() {
            missing.push("teacher_id");
        }
        if request.expected_enrollment.is_none() {
            missing.push("expected_enrollment");
        }
        if request.time_block_id.is_none() {
            missing.push("time_block_id");
        }
        if request.classroom_id.is_none() {
            missing.push("classroom_id");
        }

        let (
            Some(course_id),
            Some(section_id),
            Some(teacher_id),
            Some(enrollment),
            Some(time_block_id),
            Some(classroom_id),
        ) = (
            request.course_id,
            request.section_id,
            request.teacher_id,
            request.expected_enrollment,
            request.time_block_id,
            request.classroom_id,
        )
        else {
            return Err(AssignmentServiceError::MissingFields(missing.join(", ")));
        };

        let expected_enrollment = positive_enrollment(enrollment)?;

        let primary = Session {
            time_block_id,
            classroom_id,
        };

        let secondary = match (request.secondary_time_block_id, request.secondary_classroom_id) {
            (Some(block), classroom) => Some(Session {
                time_block_id: block,
                classroom_id: classroom.unwrap_or(classroom_id),
            }),
            (None, Some(_)) => return Err(AssignmentServiceError::OrphanSecondaryClassroom),
            (None, None) => None,
        };

        if secondary.is_some_and(|s| s.time_block_id == primary.time_block_id) {
            return Err(AssignmentServiceError::RepeatedTimeBlock);
        }

        Ok(Self {
            course_id,
            section_id,
            teacher_id,
            expected_enrollment,
            primary,
            secondary,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
        })
    }

    /// Primary session first, then the secondary one if any
    pub fn sessions(&self) -> impl Iterator<Item = Session> + '_ {
        std::iter::once(self.primary).chain(self.secondary)
    }
}

fn positive_enrollment(value: i64) -> AssignmentServiceResult<i32> {
    match i32::try_from(value) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AssignmentServiceError::InvalidEnrollment),
    }
}

/// Schedule facts the conflict checks read.
///
/// `exclude` names an assignment to ignore, the one being edited.
pub(crate) trait ScheduleLookup {
    /// `None` when the section does not exist, otherwise whether it is active
    async fn section_active(&mut self, section_id: i32) -> Result<Option<bool>, sqlx::Error>;

    async fn time_block_active(&mut self, time_block_id: i32)
        -> Result<Option<bool>, sqlx::Error>;

    async fn classroom(
        &mut self,
        classroom_id: i32,
    ) -> Result<Option<(ClassroomStatus, i32)>, sqlx::Error>;

    async fn classroom_taken(
        &mut self,
        session: Session,
        exclude: Option<i32>,
    ) -> Result<bool, sqlx::Error>;

    async fn teacher_busy(
        &mut self,
        teacher_id: i32,
        time_block_id: i32,
        exclude: Option<i32>,
    ) -> Result<bool, sqlx::Error>;

    async fn course_section_scheduled(
        &mut self,
        course_id: i32,
        section_id: i32,
        time_block_id: i32,
        exclude: Option<i32>,
    ) -> Result<bool, sqlx::Error>;
}

/// Runs the checks in order and stops at the first failure
pub(crate) async fn check_plan<P: ScheduleLookup>(
    schedule: &mut P,
    plan: &AssignmentPlan,
    exclude: Option<i32>,
) -> AssignmentServiceResult<()> {
    match schedule.section_active(plan.section_id).await? {
        None => return Err(AssignmentServiceError::SectionNotFound(plan.section_id)),
        Some(false) => return Err(AssignmentServiceError::SectionInactive(plan.section_id)),
        Some(true) => {}
    }

    for session in plan.sessions() {
        match schedule.time_block_active(session.time_block_id).await? {
            None => {
                return Err(AssignmentServiceError::TimeBlockNotFound(
                    session.time_block_id,
                ))
            }
            Some(false) => {
                return Err(AssignmentServiceError::TimeBlockInactive(
                    session.time_block_id,
                ))
            }
            Some(true) => {}
        }
    }

    for session in plan.sessions() {
        let (status, capacity) = schedule
            .classroom(session.classroom_id)
            .await?
            .ok_or(AssignmentServiceError::ClassroomNotFound(session.classroom_id))?;

        if status != ClassroomStatus::Operational {
            return Err(AssignmentServiceError::ClassroomNotOperational(
                session.classroom_id,
            ));
        }
        if plan.expected_enrollment > capacity {
            return Err(AssignmentServiceError::CapacityExceeded {
                classroom_id: session.classroom_id,
                capacity,
                requested: plan.expected_enrollment,
            });
        }
    }

    for session in plan.sessions() {
        if schedule.classroom_taken(session, exclude).await? {
            return Err(AssignmentServiceError::ClassroomOccupied);
        }
        if schedule
            .teacher_busy(plan.teacher_id, session.time_block_id, exclude)
            .await?
        {
            return Err(AssignmentServiceError::TeacherBusy);
        }
        if schedule
            .course_section_scheduled(
                plan.course_id,
                plan.section_id,
                session.time_block_id,
                exclude,
            )
            .await?
        {
            return Err(AssignmentServiceError::DuplicateAssignment);
        }
    }

    Ok(())
}

/// Reads schedule facts through the connection of the running transaction
pub(crate) struct PgScheduleLookup<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgScheduleLookup<'c> {
    pub(crate) fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

impl ScheduleLookup for PgScheduleLookup<'_> {
    async fn section_active(&mut self, section_id: i32) -> Result<Option<bool>, sqlx::Error> {
        let status: Option<RecordStatus> =
            sqlx::query_scalar("SELECT status FROM sections WHERE id = $1")
                .bind(section_id)
                .fetch_optional(&mut *self.conn)
                .await?;
        Ok(status.map(|s| s == RecordStatus::Active))
    }

    async fn time_block_active(
        &mut self,
        time_block_id: i32,
    ) -> Result<Option<bool>, sqlx::Error> {
        let status: Option<RecordStatus> =
            sqlx::query_scalar("SELECT status FROM time_blocks WHERE id = $1")
                .bind(time_block_id)
                .fetch_optional(&mut *self.conn)
                .await?;
        Ok(status.map(|s| s == RecordStatus::Active))
    }

    async fn classroom(
        &mut self,
        classroom_id: i32,
    ) -> Result<Option<(ClassroomStatus, i32)>, sqlx::Error> {
        sqlx::query_as("SELECT status, capacity FROM classrooms WHERE id = $1")
            .bind(classroom_id)
            .fetch_optional(&mut *self.conn)
            .await
    }

    async fn classroom_taken(
        &mut self,
        session: Session,
        exclude: Option<i32>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM assignments
                WHERE time_block_id = $1 AND classroom_id = $2
                  AND ($3::INTEGER IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(session.time_block_id)
        .bind(session.classroom_id)
        .bind(exclude)
        .fetch_one(&mut *self.conn)
        .await
    }

    async fn teacher_busy(
        &mut self,
        teacher_id: i32,
        time_block_id: i32,
        exclude: Option<i32>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM assignments
                WHERE time_block_id = $1 AND teacher_id = $2
                  AND ($3::INTEGER IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(time_block_id)
        .bind(teacher_id)
        .bind(exclude)
        .fetch_one(&mut *self.conn)
        .await
    }

    async fn course_section_scheduled(
        &mut self,
        course_id: i32,
        section_id: i32,
        time_block_id: i32,
        exclude: Option<i32>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM assignments
                WHERE course_id = $1 AND section_id = $2 AND time_block_id = $3
                  AND ($4::INTEGER IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(course_id)
        .bind(section_id)
        .bind(time_block_id)
        .bind(exclude)
        .fetch_one(&mut *self.conn)
        .await
    }
}

const ASSIGNMENT_SELECT: &str = r#"
    SELECT a.id, a.course_id, c.code AS course_code, c.name AS course_name,
           a.section_id, s.code AS section_code,
           a.teacher_id, p.first_names || ' ' || p.last_names AS teacher_name,
           a.time_block_id, tb.block_code, tb.day, tb.start_time, tb.end_time,
           a.classroom_id, cl.name AS classroom, pv.name AS pavilion,
           a.expected_enrollment, a.notes
    FROM assignments a
    JOIN courses c ON c.id = a.course_id
    JOIN sections s ON s.id = a.section_id
    JOIN teachers t ON t.id = a.teacher_id
    JOIN persons p ON p.id = t.person_id
    JOIN time_blocks tb ON tb.id = a.time_block_id
    JOIN classrooms cl ON cl.id = a.classroom_id
    JOIN pavilions pv ON pv.id = cl.pavilion_id
"#;

async fn insert_session(
    conn: &mut PgConnection,
    plan: &AssignmentPlan,
    session: Session,
) -> AssignmentServiceResult<i32> {
    sqlx::query_scalar(
        r#"
        INSERT INTO assignments
            (course_id, section_id, teacher_id, time_block_id, classroom_id, expected_enrollment, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(plan.course_id)
    .bind(plan.section_id)
    .bind(plan.teacher_id)
    .bind(session.time_block_id)
    .bind(session.classroom_id)
    .bind(plan.expected_enrollment)
    .bind(&plan.notes)
    .fetch_one(conn)
    .await
    .map_err(AssignmentServiceError::from_write)
}

#[derive(Clone)]
pub struct AssignmentService {
    db_pool: PgPool,
}

impl AssignmentService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Check and insert a proposal; both sessions commit or neither does
    pub async fn create_assignment(
        &self,
        request: CreateAssignmentRequest,
    ) -> AssignmentServiceResult<CreateAssignmentResponse> {
        let plan = AssignmentPlan::from_request(request)?;

        let mut tx = self.db_pool.begin().await?;

        if let Err(e) = check_plan(&mut PgScheduleLookup::new(&mut tx), &plan, None).await {
            warn!("Assignment for course {} rejected: {}", plan.course_id, e);
            return Err(e);
        }

        let mut assignment_ids = Vec::with_capacity(2);
        for session in plan.sessions() {
            assignment_ids.push(insert_session(&mut tx, &plan, session).await?);
        }

        tx.commit().await?;

        info!(
            "Assignments {:?} created for course {} section {}",
            assignment_ids, plan.course_id, plan.section_id
        );
        Ok(CreateAssignmentResponse { assignment_ids })
    }

    pub async fn list_assignments(&self) -> AssignmentServiceResult<Vec<AssignmentDetail>> {
        let query = format!("{} ORDER BY tb.day, tb.start_time, c.code", ASSIGNMENT_SELECT);
        let assignments = sqlx::query_as::<_, AssignmentDetail>(&query)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(assignments)
    }

    pub async fn get_assignment(
        &self,
        assignment_id: i32,
    ) -> AssignmentServiceResult<AssignmentDetail> {
        let query = format!("{} WHERE a.id = $1", ASSIGNMENT_SELECT);
        sqlx::query_as::<_, AssignmentDetail>(&query)
            .bind(assignment_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(AssignmentServiceError::AssignmentNotFound)
    }

    /// Edit one assignment row; conflict checks ignore the row itself
    pub async fn update_assignment(
        &self,
        assignment_id: i32,
        request: UpdateAssignmentRequest,
    ) -> AssignmentServiceResult<AssignmentDetail> {
        let mut tx = self.db_pool.begin().await?;

        let current: Option<(i32, i32, i32, i32, i32, i32, Option<String>)> = sqlx::query_as(
            r#"
            SELECT course_id, section_id, teacher_id, time_block_id, classroom_id,
                   expected_enrollment, notes
            FROM assignments WHERE id = $1
            "#,
        )
        .bind(assignment_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (course_id, section_id, teacher_id, time_block_id, classroom_id, enrollment, notes) =
            current.ok_or(AssignmentServiceError::AssignmentNotFound)?;

        let plan = AssignmentPlan {
            course_id: request.course_id.unwrap_or(course_id),
            section_id: request.section_id.unwrap_or(section_id),
            teacher_id: request.teacher_id.unwrap_or(teacher_id),
            expected_enrollment: match request.expected_enrollment {
                Some(value) => positive_enrollment(value)?,
                None => enrollment,
            },
            primary: Session {
                time_block_id: request.time_block_id.unwrap_or(time_block_id),
                classroom_id: request.classroom_id.unwrap_or(classroom_id),
            },
            secondary: None,
            notes: request.notes.or(notes),
        };

        if let Err(e) =
            check_plan(&mut PgScheduleLookup::new(&mut tx), &plan, Some(assignment_id)).await
        {
            warn!("Update of assignment {} rejected: {}", assignment_id, e);
            return Err(e);
        }

        sqlx::query(
            r#"
            UPDATE assignments
            SET course_id = $1, section_id = $2, teacher_id = $3, time_block_id = $4,
                classroom_id = $5, expected_enrollment = $6, notes = $7
            WHERE id = $8
            "#,
        )
        .bind(plan.course_id)
        .bind(plan.section_id)
        .bind(plan.teacher_id)
        .bind(plan.primary.time_block_id)
        .bind(plan.primary.classroom_id)
        .bind(plan.expected_enrollment)
        .bind(&plan.notes)
        .bind(assignment_id)
        .execute(&mut *tx)
        .await
        .map_err(AssignmentServiceError::from_write)?;

        tx.commit().await?;

        info!("Assignment {} updated", assignment_id);
        self.get_assignment(assignment_id).await
    }

    /// Delete an assignment; its enrollments go with it
    pub async fn delete_assignment(&self, assignment_id: i32) -> AssignmentServiceResult<()> {
        let mut tx = self.db_pool.begin().await?;

        let enrolled: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM enrollments WHERE assignment_id = a.id)
            FROM assignments a WHERE a.id = $1
            "#,
        )
        .bind(assignment_id)
        .fetch_optional(&mut *tx)
        .await?;
        let enrolled = enrolled.ok_or(AssignmentServiceError::AssignmentNotFound)?;

        sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(assignment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Assignment {} deleted together with {} enrollments",
            assignment_id, enrolled
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fixtures::{self, AssignedCourse};
    use std::collections::HashMap;

    /// In-memory schedule that behaves like the tables behind `PgScheduleLookup`
    #[derive(Default)]
    struct FakeSchedule {
        sections: HashMap<i32, bool>,
        time_blocks: HashMap<i32, bool>,
        classrooms: HashMap<i32, (ClassroomStatus, i32)>,
        rows: Vec<(i32, AssignmentPlan, Session)>,
    }

    impl FakeSchedule {
        fn campus() -> Self {
            let mut schedule = Self::default();
            schedule.sections.insert(2, true);
            schedule.sections.insert(9, false);
            schedule.time_blocks.insert(3, true);
            schedule.time_blocks.insert(4, true);
            schedule.time_blocks.insert(8, false);
            schedule.classrooms.insert(1, (ClassroomStatus::Operational, 30));
            schedule.classrooms.insert(6, (ClassroomStatus::Operational, 60));
            schedule.classrooms.insert(7, (ClassroomStatus::Maintenance, 60));
            schedule
        }

        /// Same sequence as `create_assignment`, against the in-memory rows
        async fn create(&mut self, request: CreateAssignmentRequest) -> Result<Vec<i32>, AppError> {
            let plan = AssignmentPlan::from_request(request)?;
            check_plan(self, &plan, None).await?;

            let mut ids = Vec::new();
            for session in plan.sessions() {
                let id = self.rows.len() as i32 + 1;
                self.rows.push((id, plan.clone(), session));
                ids.push(id);
            }
            Ok(ids)
        }

        fn others(&self, exclude: Option<i32>) -> impl Iterator<Item = &(i32, AssignmentPlan, Session)> {
            self.rows.iter().filter(move |(id, _, _)| Some(*id) != exclude)
        }
    }

    impl ScheduleLookup for FakeSchedule {
        async fn section_active(&mut self, section_id: i32) -> Result<Option<bool>, sqlx::Error> {
            Ok(self.sections.get(&section_id).copied())
        }

        async fn time_block_active(
            &mut self,
            time_block_id: i32,
        ) -> Result<Option<bool>, sqlx::Error> {
            Ok(self.time_blocks.get(&time_block_id).copied())
        }

        async fn classroom(
            &mut self,
            classroom_id: i32,
        ) -> Result<Option<(ClassroomStatus, i32)>, sqlx::Error> {
            Ok(self.classrooms.get(&classroom_id).copied())
        }

        async fn classroom_taken(
            &mut self,
            session: Session,
            exclude: Option<i32>,
        ) -> Result<bool, sqlx::Error> {
            Ok(self.others(exclude).any(|(_, _, s)| *s == session))
        }

        async fn teacher_busy(
            &mut self,
            teacher_id: i32,
            time_block_id: i32,
            exclude: Option<i32>,
        ) -> Result<bool, sqlx::Error> {
            Ok(self.others(exclude).any(|(_, plan, s)| {
                plan.teacher_id == teacher_id && s.time_block_id == time_block_id
            }))
        }

        async fn course_section_scheduled(
            &mut self,
            course_id: i32,
            section_id: i32,
            time_block_id: i32,
            exclude: Option<i32>,
        ) -> Result<bool, sqlx::Error> {
            Ok(self.others(exclude).any(|(_, plan, s)| {
                plan.course_id == course_id
                    && plan.section_id == section_id
                    && s.time_block_id == time_block_id
            }))
        }
    }

    fn request(json: &str) -> CreateAssignmentRequest {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_capacity_exceeded_is_rejected_without_insert() {
        let mut schedule = FakeSchedule::campus();

        let err = schedule
            .create(request(
                r#"{"curso_id": 5, "seccion_id": 2, "docente_id": 7, "estudiantes": 40,
                    "horario_id": 3, "aula_id": 1}"#,
            ))
            .await
            .unwrap_err();

        assert_eq!(err.status_code().as_u16(), 400);
        assert!(err.to_string().contains("capacidad"));
        assert!(schedule.rows.is_empty());
    }

    #[tokio::test]
    async fn test_occupied_classroom_is_rejected() {
        let mut schedule = FakeSchedule::campus();

        let first = schedule
            .create(request(
                r#"{"curso_id": 5, "seccion_id": 2, "docente_id": 7, "estudiantes": 25,
                    "horario_id": 3, "aula_id": 1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(first, vec![1]);

        let err = schedule
            .create(request(
                r#"{"curso_id": 6, "seccion_id": 2, "docente_id": 8, "estudiantes": 25,
                    "horario_id": 3, "aula_id": 1}"#,
            ))
            .await
            .unwrap_err();

        assert_eq!(err.status_code().as_u16(), 400);
        assert!(err.to_string().contains("ocupada"));
        assert_eq!(schedule.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_teacher_and_course_section_overlaps() {
        let mut schedule = FakeSchedule::campus();
        schedule
            .create(request(
                r#"{"course_id": 5, "section_id": 2, "teacher_id": 7, "expected_enrollment": 20,
                    "time_block_id": 3, "classroom_id": 1}"#,
            ))
            .await
            .unwrap();

        let mut plan = AssignmentPlan::from_request(request(
            r#"{"course_id": 6, "section_id": 2, "teacher_id": 7, "expected_enrollment": 20,
                "time_block_id": 3, "classroom_id": 6}"#,
        ))
        .unwrap();
        assert!(matches!(
            check_plan(&mut schedule, &plan, None).await,
            Err(AssignmentServiceError::TeacherBusy)
        ));

        plan.course_id = 5;
        plan.teacher_id = 8;
        assert!(matches!(
            check_plan(&mut schedule, &plan, None).await,
            Err(AssignmentServiceError::DuplicateAssignment)
        ));

        // Editing the existing row against itself is not a conflict
        let own = schedule.rows[0].1.clone();
        assert!(check_plan(&mut schedule, &own, Some(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_secondary_session_is_checked_and_inserted() {
        let mut schedule = FakeSchedule::campus();

        let ids = schedule
            .create(request(
                r#"{"curso_id": 5, "seccion_id": 2, "docente_id": 7, "estudiantes": 25,
                    "horario_id": 3, "aula_id": 1, "horario_id_2": 4, "aula_id_2": 6}"#,
            ))
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(
            schedule.rows[1].2,
            Session {
                time_block_id: 4,
                classroom_id: 6
            }
        );

        let err = schedule
            .create(request(
                r#"{"curso_id": 6, "seccion_id": 2, "docente_id": 8, "estudiantes": 25,
                    "horario_id": 3, "aula_id": 6, "horario_id_2": 4, "aula_id_2": 6}"#,
            ))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ocupada"));
        assert_eq!(schedule.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_status_checks_run_in_order() {
        let mut schedule = FakeSchedule::campus();
        let base = r#""curso_id": 5, "docente_id": 7, "estudiantes": 10"#;

        let inactive_section =
            AssignmentPlan::from_request(request(&format!(
                r#"{{{}, "seccion_id": 9, "horario_id": 8, "aula_id": 7}}"#,
                base
            )))
            .unwrap();
        assert!(matches!(
            check_plan(&mut schedule, &inactive_section, None).await,
            Err(AssignmentServiceError::SectionInactive(9))
        ));

        let inactive_block = AssignmentPlan::from_request(request(&format!(
            r#"{{{}, "seccion_id": 2, "horario_id": 8, "aula_id": 7}}"#,
            base
        )))
        .unwrap();
        assert!(matches!(
            check_plan(&mut schedule, &inactive_block, None).await,
            Err(AssignmentServiceError::TimeBlockInactive(8))
        ));

        let maintenance = AssignmentPlan::from_request(request(&format!(
            r#"{{{}, "seccion_id": 2, "horario_id": 3, "aula_id": 7}}"#,
            base
        )))
        .unwrap();
        assert!(matches!(
            check_plan(&mut schedule, &maintenance, None).await,
            Err(AssignmentServiceError::ClassroomNotOperational(7))
        ));
    }

    #[test]
    fn test_plan_field_checks() {
        let err = AssignmentPlan::from_request(request(r#"{"curso_id": 5, "aula_id": 1}"#))
            .unwrap_err();
        match err {
            AssignmentServiceError::MissingFields(fields) => {
                assert!(fields.contains("section_id"));
                assert!(fields.contains("time_block_id"));
                assert!(!fields.contains("course_id"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let zero = request(
            r#"{"curso_id": 5, "seccion_id": 2, "docente_id": 7, "estudiantes": 0,
                "horario_id": 3, "aula_id": 1}"#,
        );
        assert!(matches!(
            AssignmentPlan::from_request(zero),
            Err(AssignmentServiceError::InvalidEnrollment)
        ));

        let repeated = request(
            r#"{"curso_id": 5, "seccion_id": 2, "docente_id": 7, "estudiantes": 10,
                "horario_id": 3, "aula_id": 1, "horario_id_2": 3}"#,
        );
        assert!(matches!(
            AssignmentPlan::from_request(repeated),
            Err(AssignmentServiceError::RepeatedTimeBlock)
        ));

        let secondary_default = AssignmentPlan::from_request(request(
            r#"{"curso_id": 5, "seccion_id": 2, "docente_id": 7, "estudiantes": 10,
                "horario_id": 3, "aula_id": 1, "horario_id_2": 4}"#,
        ))
        .unwrap();
        assert_eq!(secondary_default.secondary.unwrap().classroom_id, 1);
    }

    #[test]
    fn test_double_booking_maps_to_bad_request() {
        for err in [
            AssignmentServiceError::ClassroomOccupied,
            AssignmentServiceError::TeacherBusy,
            AssignmentServiceError::DuplicateAssignment,
        ] {
            assert_eq!(AppError::from(err).status_code().as_u16(), 400);
        }
    }

    // ------------------------------------------------------------------
    // Against the database
    // ------------------------------------------------------------------

    fn plan_for(course: &AssignedCourse) -> AssignmentPlan {
        AssignmentPlan {
            course_id: course.course_id,
            section_id: course.section_id,
            teacher_id: course.teacher_id,
            expected_enrollment: 20,
            primary: Session {
                time_block_id: course.time_block_id,
                classroom_id: course.classroom_id,
            },
            secondary: None,
            notes: None,
        }
    }

    #[sqlx::test]
    async fn test_pg_lookup_reads_schedule_tables(pool: PgPool) {
        let course = fixtures::assigned_course(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut schedule = PgScheduleLookup::new(&mut conn);
        let session = plan_for(&course).primary;

        assert_eq!(schedule.section_active(course.section_id).await.unwrap(), Some(true));
        assert_eq!(schedule.section_active(9999).await.unwrap(), None);
        assert_eq!(
            schedule.time_block_active(course.time_block_id).await.unwrap(),
            Some(true)
        );
        assert_eq!(
            schedule.classroom(course.classroom_id).await.unwrap(),
            Some((ClassroomStatus::Operational, 40))
        );

        assert!(schedule.classroom_taken(session, None).await.unwrap());
        assert!(!schedule
            .classroom_taken(session, Some(course.assignment_id))
            .await
            .unwrap());
        assert!(schedule
            .teacher_busy(course.teacher_id, course.time_block_id, None)
            .await
            .unwrap());
        assert!(!schedule
            .teacher_busy(course.teacher_id, course.time_block_id, Some(course.assignment_id))
            .await
            .unwrap());
        assert!(schedule
            .course_section_scheduled(
                course.course_id,
                course.section_id,
                course.time_block_id,
                None
            )
            .await
            .unwrap());
        assert!(!schedule
            .course_section_scheduled(course.course_id, course.section_id, 9999, None)
            .await
            .unwrap());
    }

    #[sqlx::test]
    async fn test_inactive_rows_are_reported(pool: PgPool) {
        let course = fixtures::assigned_course(&pool).await;
        sqlx::query("UPDATE sections SET status = 'INACTIVE' WHERE id = $1")
            .bind(course.section_id)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE classrooms SET status = 'MAINTENANCE' WHERE id = $1")
            .bind(course.classroom_id)
            .execute(&pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut schedule = PgScheduleLookup::new(&mut conn);
        assert_eq!(schedule.section_active(course.section_id).await.unwrap(), Some(false));
        assert_eq!(
            schedule.classroom(course.classroom_id).await.unwrap(),
            Some((ClassroomStatus::Maintenance, 40))
        );
    }

    /// A row that slipped in after the checks fails on insert with the
    /// error the check reports
    #[sqlx::test]
    async fn test_insert_race_matches_precheck(pool: PgPool) {
        let course = fixtures::assigned_course(&pool).await;
        let other_course = fixtures::insert_course(&pool, "INF202").await;
        let other_teacher = fixtures::insert_teacher(&pool, "87654321").await;
        let other_classroom = fixtures::insert_classroom(&pool, "B-202", 40).await;
        let mut conn = pool.acquire().await.unwrap();

        let mut same_classroom = plan_for(&course);
        same_classroom.course_id = other_course;
        same_classroom.teacher_id = other_teacher;

        let mut same_teacher = plan_for(&course);
        same_teacher.course_id = other_course;
        same_teacher.primary.classroom_id = other_classroom;

        let mut same_course_section = plan_for(&course);
        same_course_section.teacher_id = other_teacher;
        same_course_section.primary.classroom_id = other_classroom;

        for plan in [same_classroom, same_teacher, same_course_section] {
            let checked = check_plan(&mut PgScheduleLookup::new(&mut conn), &plan, None)
                .await
                .unwrap_err();
            let inserted = insert_session(&mut conn, &plan, plan.primary)
                .await
                .unwrap_err();
            assert_eq!(
                std::mem::discriminant(&checked),
                std::mem::discriminant(&inserted),
                "{checked:?} vs {inserted:?}"
            );
            assert!(matches!(
                inserted,
                AssignmentServiceError::ClassroomOccupied
                    | AssignmentServiceError::TeacherBusy
                    | AssignmentServiceError::DuplicateAssignment
            ));
        }

        let mut unknown_teacher = plan_for(&course);
        unknown_teacher.teacher_id = 9999;
        unknown_teacher.primary.time_block_id =
            fixtures::insert_time_block(&pool, "MARTES", "10:00", "12:00").await;
        assert!(matches!(
            insert_session(&mut conn, &unknown_teacher, unknown_teacher.primary).await,
            Err(AssignmentServiceError::ReferenceNotFound)
        ));
    }

    #[sqlx::test]
    async fn test_conflicting_secondary_session_inserts_nothing(pool: PgPool) {
        let course = fixtures::assigned_course(&pool).await;
        let other_course = fixtures::insert_course(&pool, "INF202").await;
        let other_teacher = fixtures::insert_teacher(&pool, "87654321").await;
        let free_block = fixtures::insert_time_block(&pool, "MARTES", "10:00", "12:00").await;
        let service = AssignmentService::new(pool.clone());

        // second session lands on the occupied classroom and block
        let err = service
            .create_assignment(CreateAssignmentRequest {
                course_id: Some(other_course),
                section_id: Some(course.section_id),
                teacher_id: Some(other_teacher),
                expected_enrollment: Some(20),
                time_block_id: Some(free_block),
                classroom_id: Some(course.classroom_id),
                secondary_time_block_id: Some(course.time_block_id),
                secondary_classroom_id: None,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentServiceError::ClassroomOccupied));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assignments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let created = service
            .create_assignment(CreateAssignmentRequest {
                course_id: Some(other_course),
                section_id: Some(course.section_id),
                teacher_id: Some(other_teacher),
                expected_enrollment: Some(20),
                time_block_id: Some(free_block),
                classroom_id: Some(course.classroom_id),
                secondary_time_block_id: None,
                secondary_classroom_id: None,
                notes: None,
            })
            .await
            .unwrap();
        assert_eq!(created.assignment_ids.len(), 1);
    }
}
