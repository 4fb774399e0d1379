//! Attendance Service
//!
//! Teachers record one mark per student and class date. Late arrivals count
//! as attended; a student whose running attendance falls below the minimum is
//! flagged in the response.

use std::collections::HashSet;

use log::{info, warn};
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;

use crate::models::{
    AttendanceDay, AttendanceRecord, AttendanceRecordedResponse, AttendanceRequest,
    AttendanceSummary, DateRangeQuery, StudentAttendance,
};
use crate::service::audit::{self, AuditAction};
use crate::utils::error::{is_foreign_key_violation, AppError};

/// Attendance percentage below which a student is flagged
pub const MIN_ATTENDANCE_PERCENT: f64 = 70.0;

#[derive(Error, Debug)]
pub enum AttendanceServiceError {
    #[error("No attendance entries were sent")]
    EmptySession,

    #[error("Student {0} appears more than once")]
    RepeatedStudent(i32),

    #[error("Start date is after end date")]
    InvalidRange,

    #[error("Student, course or teacher not found")]
    ReferenceNotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl AttendanceServiceError {
    fn from_write(err: sqlx::Error) -> Self {
        if is_foreign_key_violation(&err) {
            Self::ReferenceNotFound
        } else {
            Self::DatabaseError(err)
        }
    }
}

impl From<AttendanceServiceError> for AppError {
    fn from(err: AttendanceServiceError) -> Self {
        match err {
            AttendanceServiceError::EmptySession => {
                AppError::Validation("La lista de asistencias está vacía".to_string())
            }
            AttendanceServiceError::RepeatedStudent(id) => AppError::Validation(format!(
                "El estudiante {} aparece más de una vez",
                id
            )),
            AttendanceServiceError::InvalidRange => AppError::Validation(
                "La fecha de inicio no puede ser posterior a la fecha de fin".to_string(),
            ),
            AttendanceServiceError::ReferenceNotFound => {
                AppError::NotFound("Estudiante, curso o docente no encontrado".to_string())
            }
            AttendanceServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type AttendanceServiceResult<T> = Result<T, AttendanceServiceError>;

/// Percentage of attended sessions, rounded to two decimals
pub fn summarize(student_id: i32, attended: i64, total: i64) -> AttendanceSummary {
    let percentage = if total > 0 {
        ((attended as f64 / total as f64) * 10_000.0).round() / 100.0
    } else {
        0.0
    };

    AttendanceSummary {
        student_id,
        attended,
        total,
        percentage,
        alert: total > 0 && percentage < MIN_ATTENDANCE_PERCENT,
    }
}

/// Groups records that arrive ordered by date
pub fn group_by_date(records: Vec<AttendanceRecord>) -> Vec<AttendanceDay> {
    let mut days: Vec<AttendanceDay> = Vec::new();
    for record in records {
        match days.last_mut() {
            Some(day) if day.class_date == record.class_date => day.records.push(record),
            _ => days.push(AttendanceDay {
                class_date: record.class_date,
                records: vec![record],
            }),
        }
    }
    days
}

#[derive(Clone)]
pub struct AttendanceService {
    db_pool: PgPool,
}

impl AttendanceService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Store the marks of one class session and report running percentages
    pub async fn record_session(
        &self,
        request: AttendanceRequest,
    ) -> AttendanceServiceResult<AttendanceRecordedResponse> {
        if request.entries.is_empty() {
            return Err(AttendanceServiceError::EmptySession);
        }
        let mut seen = HashSet::new();
        if let Some(repeated) = request.entries.iter().find(|e| !seen.insert(e.student_id)) {
            return Err(AttendanceServiceError::RepeatedStudent(repeated.student_id));
        }

        let mut tx = self.db_pool.begin().await?;

        for entry in &request.entries {
            let (record_id, inserted): (i32, bool) = sqlx::query_as(
                r#"
                INSERT INTO attendance (student_id, course_id, teacher_id, class_date, status, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT ON CONSTRAINT attendance_student_course_date_key DO UPDATE
                SET status = EXCLUDED.status,
                    notes = EXCLUDED.notes,
                    teacher_id = EXCLUDED.teacher_id,
                    recorded_at = NOW()
                RETURNING id, (xmax = 0)
                "#,
            )
            .bind(entry.student_id)
            .bind(request.course_id)
            .bind(request.teacher_id)
            .bind(request.class_date)
            .bind(entry.status)
            .bind(&entry.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(AttendanceServiceError::from_write)?;

            audit::record(
                &mut tx,
                request.teacher_id,
                if inserted {
                    AuditAction::Insert
                } else {
                    AuditAction::Update
                },
                "attendance",
                Some(record_id),
                json!({
                    "student_id": entry.student_id,
                    "course_id": request.course_id,
                    "class_date": request.class_date,
                    "status": entry.status,
                }),
            )
            .await?;
        }

        let mut summaries = Vec::with_capacity(request.entries.len());
        for entry in &request.entries {
            let (attended, total): (i64, i64) = sqlx::query_as(
                r#"
                SELECT COUNT(*) FILTER (WHERE status IN ('PRESENTE', 'TARDANZA')),
                       COUNT(*)
                FROM attendance
                WHERE student_id = $1 AND course_id = $2
                "#,
            )
            .bind(entry.student_id)
            .bind(request.course_id)
            .fetch_one(&mut *tx)
            .await?;

            let summary = summarize(entry.student_id, attended, total);
            if summary.alert {
                warn!(
                    "Student {} is at {:.2}% attendance in course {}",
                    summary.student_id, summary.percentage, request.course_id
                );
            }
            summaries.push(summary);
        }

        tx.commit().await?;

        info!(
            "Attendance for course {} on {} recorded ({} students)",
            request.course_id,
            request.class_date,
            request.entries.len()
        );

        Ok(AttendanceRecordedResponse {
            class_date: request.class_date,
            recorded: request.entries.len(),
            summaries,
        })
    }

    /// Marks of a course, grouped per class date, optionally within a date window
    pub async fn course_attendance(
        &self,
        course_id: i32,
        range: DateRangeQuery,
    ) -> AttendanceServiceResult<Vec<AttendanceDay>> {
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(AttendanceServiceError::InvalidRange);
            }
        }

        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT at.id, at.student_id,
                   p.last_names || ', ' || p.first_names AS student_name,
                   at.class_date, at.status, at.notes
            FROM attendance at
            JOIN students s ON s.id = at.student_id
            JOIN persons p ON p.id = s.person_id
            WHERE at.course_id = $1
              AND ($2::DATE IS NULL OR at.class_date >= $2)
              AND ($3::DATE IS NULL OR at.class_date <= $3)
            ORDER BY at.class_date, student_name
            "#,
        )
        .bind(course_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(group_by_date(records))
    }

    pub async fn student_attendance(
        &self,
        student_id: i32,
    ) -> AttendanceServiceResult<Vec<StudentAttendance>> {
        let records = sqlx::query_as::<_, StudentAttendance>(
            r#"
            SELECT at.course_id, c.name AS course_name, at.class_date, at.status, at.notes
            FROM attendance at
            JOIN courses c ON c.id = at.course_id
            WHERE at.student_id = $1
            ORDER BY at.class_date DESC, c.name
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceEntry, AttendanceStatus};
    use chrono::NaiveDate;

    fn record(id: i32, date: NaiveDate) -> AttendanceRecord {
        AttendanceRecord {
            id,
            student_id: id,
            student_name: format!("Alumno {}", id),
            class_date: date,
            status: AttendanceStatus::Presente,
            notes: None,
        }
    }

    #[test]
    fn test_summary_threshold() {
        let ok = summarize(1, 7, 10);
        assert_eq!(ok.percentage, 70.0);
        assert!(!ok.alert);

        let low = summarize(2, 2, 3);
        assert_eq!(low.percentage, 66.67);
        assert!(low.alert);

        let empty = summarize(3, 0, 0);
        assert_eq!(empty.percentage, 0.0);
        assert!(!empty.alert);
    }

    #[test]
    fn test_group_by_date() {
        let d1 = NaiveDate::from_ymd_opt(2026, 4, 6).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 4, 13).unwrap();

        let days = group_by_date(vec![record(1, d1), record(2, d1), record(1, d2)]);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].class_date, d1);
        assert_eq!(days[0].records.len(), 2);
        assert_eq!(days[1].records.len(), 1);

        assert!(group_by_date(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_session_is_checked_before_touching_the_database() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let service = AttendanceService::new(pool);
        let date = NaiveDate::from_ymd_opt(2026, 4, 6).unwrap();
        let entry = |student_id| AttendanceEntry {
            student_id,
            status: AttendanceStatus::Ausente,
            notes: None,
        };

        let empty = AttendanceRequest {
            course_id: 1,
            teacher_id: 1,
            class_date: date,
            entries: Vec::new(),
        };
        assert!(matches!(
            service.record_session(empty).await,
            Err(AttendanceServiceError::EmptySession)
        ));

        let repeated = AttendanceRequest {
            course_id: 1,
            teacher_id: 1,
            class_date: date,
            entries: vec![entry(4), entry(5), entry(4)],
        };
        assert!(matches!(
            service.record_session(repeated).await,
            Err(AttendanceServiceError::RepeatedStudent(4))
        ));

        let backwards = DateRangeQuery {
            from: Some(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()),
            to: Some(date),
        };
        assert!(matches!(
            service.course_attendance(1, backwards).await,
            Err(AttendanceServiceError::InvalidRange)
        ));
    }
}
