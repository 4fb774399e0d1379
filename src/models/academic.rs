//! Academic Record Models
//!
//! Grades, attendance, teaching materials and enrollments.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{common::RecordStatus, schedule::Weekday};

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "grade_outcome", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradeOutcome {
    Aprobado,
    Desaprobado,
}

/// Stored grade row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Grade {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub teacher_id: i32,
    pub practice: f64,
    pub midterm: f64,
    pub final_exam: f64,
    pub makeup: Option<f64>,
    pub deferred: Option<f64>,
    pub average: f64,
    pub outcome: GradeOutcome,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Grade joined with the student's identity, for course rosters
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CourseGrade {
    pub student_id: i32,
    pub university_code: String,
    pub student_name: String,
    pub practice: Option<f64>,
    pub midterm: Option<f64>,
    pub final_exam: Option<f64>,
    pub makeup: Option<f64>,
    pub deferred: Option<f64>,
    pub average: Option<f64>,
    pub outcome: Option<GradeOutcome>,
}

/// Grade joined with the course, for a student's transcript
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentGrade {
    pub course_id: i32,
    pub course_code: String,
    pub course_name: String,
    pub practice: f64,
    pub midterm: f64,
    pub final_exam: f64,
    pub makeup: Option<f64>,
    pub deferred: Option<f64>,
    pub average: f64,
    pub outcome: GradeOutcome,
}

/// Component scores submitted by a teacher; every score is on a 0-20 scale
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GradeRequest {
    #[serde(alias = "estudiante_id")]
    pub student_id: i32,

    #[serde(alias = "curso_id")]
    pub course_id: i32,

    #[serde(alias = "docente_id")]
    pub teacher_id: i32,

    #[serde(alias = "practicas", default)]
    #[validate(range(min = 0.0, max = 20.0, message = "Las notas deben estar entre 0 y 20"))]
    pub practice: f64,

    #[serde(alias = "parcial", default)]
    #[validate(range(min = 0.0, max = 20.0, message = "Las notas deben estar entre 0 y 20"))]
    pub midterm: f64,

    #[serde(alias = "final", default)]
    #[validate(range(min = 0.0, max = 20.0, message = "Las notas deben estar entre 0 y 20"))]
    pub final_exam: f64,

    #[serde(alias = "sustitutorio")]
    #[validate(range(min = 0.0, max = 20.0, message = "Las notas deben estar entre 0 y 20"))]
    pub makeup: Option<f64>,

    #[serde(alias = "aplazado")]
    #[validate(range(min = 0.0, max = 20.0, message = "Las notas deben estar entre 0 y 20"))]
    pub deferred: Option<f64>,
}

/// Result of a grade upsert
#[derive(Debug, Serialize)]
pub struct GradeUpsertResponse {
    pub grade: Grade,
    /// `true` when a new row was created, `false` when an existing one was updated
    pub created: bool,
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[serde(alias = "PRESENTE")]
    Presente,
    #[serde(alias = "AUSENTE")]
    Ausente,
    #[serde(alias = "TARDANZA")]
    Tardanza,
}

/// One student's mark for a class date
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceEntry {
    #[serde(alias = "estudiante_id")]
    pub student_id: i32,
    #[serde(alias = "estado")]
    pub status: AttendanceStatus,
    #[serde(alias = "observaciones")]
    pub notes: Option<String>,
}

/// Marks for a whole class session
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceRequest {
    #[serde(alias = "curso_id")]
    pub course_id: i32,
    #[serde(alias = "docente_id")]
    pub teacher_id: i32,
    #[serde(alias = "fecha_clase")]
    pub class_date: NaiveDate,
    #[serde(alias = "asistencias")]
    pub entries: Vec<AttendanceEntry>,
}

/// Running attendance of a student in a course after a session was recorded
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceSummary {
    pub student_id: i32,
    pub attended: i64,
    pub total: i64,
    pub percentage: f64,
    /// Below the minimum attendance ratio
    pub alert: bool,
}

#[derive(Debug, Serialize)]
pub struct AttendanceRecordedResponse {
    pub class_date: NaiveDate,
    pub recorded: usize,
    pub summaries: Vec<AttendanceSummary>,
}

/// Stored mark joined with the student's identity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: i32,
    pub student_id: i32,
    pub student_name: String,
    pub class_date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

/// Marks of a course grouped per class date
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceDay {
    pub class_date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
}

/// Optional date window for attendance listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    #[serde(alias = "fecha_inicio")]
    pub from: Option<NaiveDate>,
    #[serde(alias = "fecha_fin")]
    pub to: Option<NaiveDate>,
}

/// A student's own marks across courses
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentAttendance {
    pub course_id: i32,
    pub course_name: String,
    pub class_date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Teaching material
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Material {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub course_id: i32,
    pub unit: Option<String>,
    pub teacher_id: i32,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub content_type: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Metadata fields that accompany an uploaded file
#[derive(Debug, Clone, Default, Validate)]
pub struct MaterialUpload {
    pub course_id: Option<i32>,
    pub teacher_id: Option<i32>,

    #[validate(length(min = 1, max = 200, message = "El título es obligatorio"))]
    pub title: String,

    pub description: Option<String>,

    #[validate(length(max = 50))]
    pub unit: Option<String>,
}

// ---------------------------------------------------------------------------
// Enrollment and teacher views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Enrollment {
    pub id: i32,
    pub student_id: i32,
    pub assignment_id: i32,
    pub status: RecordStatus,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollRequest {
    #[serde(alias = "estudiante_id")]
    pub student_id: i32,
    #[serde(alias = "asignacion_id")]
    pub assignment_id: i32,
}

/// Assignment offered to a student, or one the student is enrolled in
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OfferedAssignment {
    pub assignment_id: i32,
    pub enrollment_id: Option<i32>,
    pub course_id: i32,
    pub course_code: String,
    pub course_name: String,
    pub credits: i16,
    pub section_code: String,
    pub teacher_name: String,
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub classroom: String,
    pub capacity: i32,
    pub enrolled: i64,
}

/// Course taught by a teacher, one row per assignment
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeacherCourse {
    pub assignment_id: i32,
    pub course_id: i32,
    pub course_code: String,
    pub course_name: String,
    pub section_code: String,
    pub block_code: String,
    pub enrolled: i64,
}

/// Student enrolled in one of a teacher's assignments
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EnrolledStudent {
    pub student_id: i32,
    pub university_code: String,
    pub first_names: String,
    pub last_names: String,
    pub email: String,
    pub assignment_id: i32,
    pub course_id: i32,
    pub course_name: String,
}

/// Teacher audit trail entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub teacher_id: i32,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<i32>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Teacher reports
// ---------------------------------------------------------------------------

/// Course identity shown at the top of every report
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReportCourse {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub credits: i16,
}

/// Aggregates over the grades a teacher recorded in a course
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GradeStats {
    pub average: Option<f64>,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
    pub passed: i64,
    pub failed: i64,
    pub recorded: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseSummaryReport {
    pub course: ReportCourse,
    pub enrolled_students: i64,
    pub materials: i64,
    pub grades: GradeStats,
    pub class_sessions: i64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Failing average and low attendance
    Critico,
    /// Only one of the two
    Alerta,
}

/// Enrolled student with their average and attendance, before classification
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentStanding {
    pub student_id: i32,
    pub university_code: String,
    pub student_name: String,
    pub email: String,
    pub average: Option<f64>,
    pub attended: i64,
    pub sessions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtRiskStudent {
    pub student_id: i32,
    pub university_code: String,
    pub student_name: String,
    pub email: String,
    pub average: f64,
    pub attendance_percentage: f64,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct LowPerformanceReport {
    pub total: usize,
    pub students: Vec<AtRiskStudent>,
    pub generated_at: DateTime<Utc>,
}

/// Enrolled student with their recorded scores; students without a grade
/// count as 0
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GradeDetailRow {
    pub student_id: i32,
    pub university_code: String,
    pub student_name: String,
    pub email: String,
    pub practice: Option<f64>,
    pub midterm: Option<f64>,
    pub final_exam: Option<f64>,
    pub makeup: Option<f64>,
    pub deferred: Option<f64>,
    pub average: f64,
    pub outcome: GradeOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeDetailReport {
    pub course: ReportCourse,
    pub students: Vec<GradeDetailRow>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_request_range() {
        let request: GradeRequest = serde_json::from_str(
            r#"{"estudiante_id": 1, "curso_id": 2, "docente_id": 3,
                "practicas": 15, "parcial": 8, "final": 21}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_attendance_request_legacy_keys() {
        let request: AttendanceRequest = serde_json::from_str(
            r#"{"curso_id": 2, "docente_id": 3, "fecha_clase": "2026-04-06",
                "asistencias": [{"estudiante_id": 9, "estado": "tardanza"}]}"#,
        )
        .unwrap();
        assert_eq!(request.entries.len(), 1);
        assert_eq!(request.entries[0].status, AttendanceStatus::Tardanza);
        assert_eq!(
            request.class_date,
            NaiveDate::from_ymd_opt(2026, 4, 6).unwrap()
        );
    }
}
