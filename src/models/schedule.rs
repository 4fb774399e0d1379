//! Scheduling Models
//!
//! Time blocks, sections, classrooms, assignments and timetable rows.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::common::RecordStatus;

/// Day of the week a time block falls on; ordered Monday first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "weekday")]
pub enum Weekday {
    #[sqlx(rename = "LUNES")]
    #[serde(rename = "Lunes", alias = "LUNES")]
    Monday,
    #[sqlx(rename = "MARTES")]
    #[serde(rename = "Martes", alias = "MARTES")]
    Tuesday,
    #[sqlx(rename = "MIERCOLES")]
    #[serde(rename = "Miércoles", alias = "Miercoles", alias = "MIERCOLES")]
    Wednesday,
    #[sqlx(rename = "JUEVES")]
    #[serde(rename = "Jueves", alias = "JUEVES")]
    Thursday,
    #[sqlx(rename = "VIERNES")]
    #[serde(rename = "Viernes", alias = "VIERNES")]
    Friday,
    #[sqlx(rename = "SABADO")]
    #[serde(rename = "Sábado", alias = "Sabado", alias = "SABADO")]
    Saturday,
    #[sqlx(rename = "DOMINGO")]
    #[serde(rename = "Domingo", alias = "DOMINGO")]
    Sunday,
}

impl Weekday {
    /// Three-letter prefix used in block codes
    pub fn code_prefix(&self) -> &'static str {
        match self {
            Weekday::Monday => "LUN",
            Weekday::Tuesday => "MAR",
            Weekday::Wednesday => "MIE",
            Weekday::Thursday => "JUE",
            Weekday::Friday => "VIE",
            Weekday::Saturday => "SAB",
            Weekday::Sunday => "DOM",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Weekday::Monday => "Lunes",
            Weekday::Tuesday => "Martes",
            Weekday::Wednesday => "Miércoles",
            Weekday::Thursday => "Jueves",
            Weekday::Friday => "Viernes",
            Weekday::Saturday => "Sábado",
            Weekday::Sunday => "Domingo",
        };
        f.write_str(label)
    }
}

/// Teaching shift derived from a block's start time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Shift {
    Morning,
    Afternoon,
    Night,
}

impl Shift {
    /// Before noon is morning, before 19:00 afternoon, anything later night
    pub fn for_start(start: NaiveTime) -> Self {
        match start.hour() {
            h if h < 12 => Shift::Morning,
            h if h < 19 => Shift::Afternoon,
            _ => Shift::Night,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Shift::Morning => 'M',
            Shift::Afternoon => 'T',
            Shift::Night => 'N',
        }
    }
}

// ---------------------------------------------------------------------------
// Time blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimeBlock {
    pub id: i32,
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: RecordStatus,
    pub block_code: String,
}

/// Payload for creating or updating a time block; times are `HH:MM`
#[derive(Debug, Clone, Deserialize)]
pub struct TimeBlockRequest {
    #[serde(alias = "dia")]
    pub day: Option<Weekday>,
    #[serde(alias = "hora_inicio")]
    pub start_time: Option<String>,
    #[serde(alias = "hora_fin")]
    pub end_time: Option<String>,
    #[serde(alias = "estado")]
    pub status: Option<RecordStatus>,
}

/// Query for previewing the code a new block would receive
#[derive(Debug, Clone, Deserialize)]
pub struct NextCodeQuery {
    #[serde(alias = "dia")]
    pub day: Weekday,
    #[serde(alias = "hora_inicio")]
    pub start_time: String,
}

#[derive(Debug, Serialize)]
pub struct NextCodeResponse {
    pub block_code: String,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Section {
    pub id: i32,
    pub code: String,
    pub academic_cycle: String,
    pub period: String,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SectionRequest {
    #[validate(length(min = 1, max = 10, message = "El código de sección es obligatorio"))]
    pub code: String,

    #[validate(length(min = 1, max = 10, message = "El ciclo académico es obligatorio"))]
    pub academic_cycle: String,

    #[validate(length(min = 1, max = 10, message = "El periodo es obligatorio"))]
    pub period: String,

    pub status: Option<RecordStatus>,
}

// ---------------------------------------------------------------------------
// Classrooms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "classroom_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassroomStatus {
    #[serde(alias = "OPERATIVO")]
    Operational,
    #[serde(alias = "MANTENIMIENTO")]
    Maintenance,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Classroom {
    pub id: i32,
    pub name: String,
    pub capacity: i32,
    pub status: ClassroomStatus,
    pub classroom_type_id: i32,
    pub classroom_type: String,
    pub pavilion_id: i32,
    pub pavilion: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClassroomRequest {
    #[validate(length(min = 1, max = 40, message = "El nombre del aula es obligatorio"))]
    pub name: String,

    #[validate(range(min = 1, max = 1000, message = "La capacidad debe ser mayor que cero"))]
    pub capacity: i32,

    pub status: Option<ClassroomStatus>,
    pub classroom_type_id: i32,
    pub pavilion_id: i32,
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Assignment {
    pub id: i32,
    pub course_id: i32,
    pub section_id: i32,
    pub teacher_id: i32,
    pub time_block_id: i32,
    pub classroom_id: i32,
    pub expected_enrollment: i32,
    pub notes: Option<String>,
}

/// Assignment with every foreign key resolved for display
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssignmentDetail {
    pub id: i32,
    pub course_id: i32,
    pub course_code: String,
    pub course_name: String,
    pub section_id: i32,
    pub section_code: String,
    pub teacher_id: i32,
    pub teacher_name: String,
    pub time_block_id: i32,
    pub block_code: String,
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub classroom_id: i32,
    pub classroom: String,
    pub pavilion: String,
    pub expected_enrollment: i32,
    pub notes: Option<String>,
}

/// Proposed assignment, optionally with a second weekly session.
///
/// Every field is optional on the wire so missing ones can be reported
/// together instead of failing deserialization on the first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAssignmentRequest {
    #[serde(alias = "curso_id")]
    pub course_id: Option<i32>,
    #[serde(alias = "seccion_id")]
    pub section_id: Option<i32>,
    #[serde(alias = "docente_id")]
    pub teacher_id: Option<i32>,
    #[serde(alias = "estudiantes", alias = "cantidad_estudiantes")]
    pub expected_enrollment: Option<i64>,
    #[serde(alias = "horario_id", alias = "bloque_id")]
    pub time_block_id: Option<i32>,
    #[serde(alias = "aula_id")]
    pub classroom_id: Option<i32>,
    #[serde(alias = "horario_id_2", alias = "bloque_id_2")]
    pub secondary_time_block_id: Option<i32>,
    #[serde(alias = "aula_id_2")]
    pub secondary_classroom_id: Option<i32>,
    #[serde(alias = "notas", alias = "observaciones")]
    pub notes: Option<String>,
}

/// Edit of a single assignment row
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAssignmentRequest {
    #[serde(alias = "curso_id")]
    pub course_id: Option<i32>,
    #[serde(alias = "seccion_id")]
    pub section_id: Option<i32>,
    #[serde(alias = "docente_id")]
    pub teacher_id: Option<i32>,
    #[serde(alias = "estudiantes", alias = "cantidad_estudiantes")]
    pub expected_enrollment: Option<i64>,
    #[serde(alias = "horario_id", alias = "bloque_id")]
    pub time_block_id: Option<i32>,
    #[serde(alias = "aula_id")]
    pub classroom_id: Option<i32>,
    #[serde(alias = "notas", alias = "observaciones")]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAssignmentResponse {
    pub assignment_ids: Vec<i32>,
}

/// One row of a weekly timetable
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimetableEntry {
    pub assignment_id: i32,
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub block_code: String,
    pub course_id: i32,
    pub course_code: String,
    pub course_name: String,
    pub section_code: String,
    pub classroom: String,
    pub pavilion: String,
    pub teacher_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_boundaries() {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(Shift::for_start(at(7, 0)), Shift::Morning);
        assert_eq!(Shift::for_start(at(11, 59)), Shift::Morning);
        assert_eq!(Shift::for_start(at(12, 0)), Shift::Afternoon);
        assert_eq!(Shift::for_start(at(18, 59)), Shift::Afternoon);
        assert_eq!(Shift::for_start(at(19, 0)), Shift::Night);
        assert_eq!(Shift::Afternoon.letter(), 'T');
    }

    #[test]
    fn test_weekday_order_and_labels() {
        assert!(Weekday::Monday < Weekday::Wednesday);
        assert!(Weekday::Saturday < Weekday::Sunday);
        assert_eq!(Weekday::Wednesday.code_prefix(), "MIE");
        let day: Weekday = serde_json::from_str("\"Miercoles\"").unwrap();
        assert_eq!(day, Weekday::Wednesday);
        assert_eq!(serde_json::to_string(&Weekday::Saturday).unwrap(), "\"Sábado\"");
    }

    #[test]
    fn test_assignment_request_legacy_keys() {
        let request: CreateAssignmentRequest = serde_json::from_str(
            r#"{"curso_id": 5, "seccion_id": 2, "docente_id": 7, "estudiantes": 40,
                "horario_id": 3, "aula_id": 1}"#,
        )
        .unwrap();
        assert_eq!(request.course_id, Some(5));
        assert_eq!(request.expected_enrollment, Some(40));
        assert_eq!(request.time_block_id, Some(3));
        assert_eq!(request.classroom_id, Some(1));
        assert!(request.secondary_time_block_id.is_none());
    }

    #[test]
    fn test_classroom_status_aliases() {
        let status: ClassroomStatus = serde_json::from_str("\"MANTENIMIENTO\"").unwrap();
        assert_eq!(status, ClassroomStatus::Maintenance);
    }
}
