//! Course Models
//!
//! Courses and the prerequisite graph between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::RecordStatus;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Course {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub credits: i16,
    pub cycle: i16,
    pub theory_hours: i16,
    pub practice_hours: i16,
    pub course_type: String,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating or updating a course
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CourseRequest {
    #[validate(length(min = 1, max = 20, message = "El código del curso es obligatorio"))]
    pub code: String,

    #[validate(length(min = 1, max = 150, message = "El nombre del curso es obligatorio"))]
    pub name: String,

    #[validate(range(min = 1, max = 10, message = "Los créditos deben estar entre 1 y 10"))]
    pub credits: i16,

    #[validate(range(min = 1, max = 10, message = "El ciclo debe estar entre 1 y 10"))]
    pub cycle: i16,

    #[validate(range(min = 0, max = 20))]
    #[serde(default)]
    pub theory_hours: i16,

    #[validate(range(min = 0, max = 20))]
    #[serde(default)]
    pub practice_hours: i16,

    #[validate(length(min = 1, max = 20, message = "El tipo de curso es obligatorio"))]
    pub course_type: String,

    pub status: Option<RecordStatus>,

    /// Account that registers the course
    pub created_by: Option<i32>,
}

/// `?ciclo=` / `?cycle=` filter for course listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseQuery {
    #[serde(alias = "ciclo")]
    pub cycle: Option<i16>,
}

/// Prerequisite edge with the required course resolved
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Prerequisite {
    pub id: i32,
    pub course_id: i32,
    pub required_course_id: i32,
    pub required_code: String,
    pub required_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrerequisiteRequest {
    #[serde(alias = "id_curso")]
    pub course_id: i32,

    #[serde(alias = "id_curso_requerido")]
    pub required_course_id: i32,
}

/// A course together with everything it requires
#[derive(Debug, Clone, Serialize)]
pub struct CourseWithPrerequisites {
    pub course_id: i32,
    pub code: String,
    pub name: String,
    pub prerequisites: Vec<Prerequisite>,
}

/// Flat row used to build [`CourseWithPrerequisites`]
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PrerequisiteRow {
    pub course_id: i32,
    pub course_code: String,
    pub course_name: String,
    pub id: i32,
    pub required_course_id: i32,
    pub required_code: String,
    pub required_name: String,
}

/// Groups consecutive rows by course; rows must be ordered by course
pub(crate) fn group_prerequisites(rows: Vec<PrerequisiteRow>) -> Vec<CourseWithPrerequisites> {
    let mut grouped: Vec<CourseWithPrerequisites> = Vec::new();

    for row in rows {
        let edge = Prerequisite {
            id: row.id,
            course_id: row.course_id,
            required_course_id: row.required_course_id,
            required_code: row.required_code,
            required_name: row.required_name,
        };

        match grouped.last_mut() {
            Some(last) if last.course_id == row.course_id => last.prerequisites.push(edge),
            _ => grouped.push(CourseWithPrerequisites {
                course_id: row.course_id,
                code: row.course_code,
                name: row.course_name,
                prerequisites: vec![edge],
            }),
        }
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(course_id: i32, id: i32, required: i32) -> PrerequisiteRow {
        PrerequisiteRow {
            course_id,
            course_code: format!("{}", 1000 + course_id),
            course_name: format!("Curso {}", course_id),
            id,
            required_course_id: required,
            required_code: format!("{}", 1000 + required),
            required_name: format!("Curso {}", required),
        }
    }

    #[test]
    fn test_group_prerequisites() {
        let grouped = group_prerequisites(vec![row(3, 1, 1), row(3, 2, 2), row(5, 3, 3)]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].course_id, 3);
        assert_eq!(grouped[0].prerequisites.len(), 2);
        assert_eq!(grouped[1].prerequisites[0].required_course_id, 3);
    }

    #[test]
    fn test_course_request_bounds() {
        let request = CourseRequest {
            code: "1001".to_string(),
            name: "Programación I".to_string(),
            credits: 11,
            cycle: 1,
            theory_hours: 2,
            practice_hours: 2,
            course_type: "Obligatorio".to_string(),
            status: None,
            created_by: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_prerequisite_request_legacy_keys() {
        let request: PrerequisiteRequest =
            serde_json::from_str(r#"{"id_curso": 4, "id_curso_requerido": 2}"#).unwrap();
        assert_eq!(request.course_id, 4);
        assert_eq!(request.required_course_id, 2);
    }
}
