//! Time Block Service
//!
//! Weekly teaching slots. Each block gets a code such as `LUN-M3`: the day
//! prefix, the shift letter and a sequence number that is one more than the
//! highest already used for that day and shift.

use chrono::{Duration, NaiveTime};
use log::info;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use crate::models::{NextCodeQuery, NextCodeResponse, Shift, TimeBlock, TimeBlockRequest, Weekday};
use crate::utils::{
    error::{is_foreign_key_violation, violated_constraint, AppError},
    validation::{messages, parse_clock_time},
};

/// Longest block that may be scheduled
pub const MAX_BLOCK_HOURS: i64 = 6;

#[derive(Error, Debug)]
pub enum TimeBlockServiceError {
    #[error("Time block not found")]
    TimeBlockNotFound,

    #[error("An identical time block already exists")]
    DuplicateSlot,

    #[error("Block code already taken")]
    DuplicateCode,

    #[error("End time must be after start time and at most 6 hours later")]
    InvalidSpan,

    #[error("Time block is used by assignments")]
    TimeBlockInUse,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl TimeBlockServiceError {
    fn from_write(err: sqlx::Error) -> Self {
        match violated_constraint(&err) {
            Some("time_blocks_slot_key") => Self::DuplicateSlot,
            Some("time_blocks_block_code_key") => Self::DuplicateCode,
            Some("time_blocks_span_check") => Self::InvalidSpan,
            _ if is_foreign_key_violation(&err) => Self::TimeBlockInUse,
            _ => Self::DatabaseError(err),
        }
    }
}

impl From<TimeBlockServiceError> for AppError {
    fn from(err: TimeBlockServiceError) -> Self {
        match err {
            TimeBlockServiceError::TimeBlockNotFound => {
                AppError::NotFound("Bloque horario no encontrado".to_string())
            }
            TimeBlockServiceError::DuplicateSlot => AppError::Conflict(
                "Ya existe un bloque con el mismo día, hora de inicio y hora de fin".to_string(),
            ),
            TimeBlockServiceError::DuplicateCode => AppError::Conflict(
                "El código de bloque generado ya existe, intente nuevamente".to_string(),
            ),
            TimeBlockServiceError::InvalidSpan => AppError::Validation(
                "La hora de fin debe ser posterior a la de inicio y el bloque no puede superar 6 horas"
                    .to_string(),
            ),
            TimeBlockServiceError::TimeBlockInUse => {
                AppError::Dependency("El bloque horario tiene asignaciones registradas".to_string())
            }
            TimeBlockServiceError::ValidationError(msg) => AppError::Validation(msg),
            TimeBlockServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type TimeBlockServiceResult<T> = Result<T, TimeBlockServiceError>;

fn parse_time(value: &str) -> TimeBlockServiceResult<NaiveTime> {
    parse_clock_time(value)
        .ok_or_else(|| TimeBlockServiceError::ValidationError(messages::INVALID_TIME.to_string()))
}

/// Checks that a block ends after it starts and lasts at most six hours
pub fn check_span(start: NaiveTime, end: NaiveTime) -> TimeBlockServiceResult<()> {
    if end <= start || end - start > Duration::hours(MAX_BLOCK_HOURS) {
        return Err(TimeBlockServiceError::InvalidSpan);
    }
    Ok(())
}

/// Code prefix shared by every block of a day and shift, e.g. `MIE-T`
pub fn code_prefix(day: Weekday, shift: Shift) -> String {
    format!("{}-{}", day.code_prefix(), shift.letter())
}

/// Sequence number that follows the highest one among `existing` codes with `prefix`
pub fn next_sequence<'a, I>(prefix: &str, existing: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    existing
        .into_iter()
        .filter_map(|code| code.strip_prefix(prefix))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

#[derive(Clone)]
pub struct TimeBlockService {
    db_pool: PgPool,
}

impl TimeBlockService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// All blocks, Monday first, then by start time
    pub async fn list_time_blocks(&self) -> TimeBlockServiceResult<Vec<TimeBlock>> {
        let blocks = sqlx::query_as::<_, TimeBlock>(
            r#"
            SELECT id, day, start_time, end_time, status, block_code
            FROM time_blocks
            ORDER BY day, start_time
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(blocks)
    }

    pub async fn get_time_block(&self, block_id: i32) -> TimeBlockServiceResult<TimeBlock> {
        sqlx::query_as::<_, TimeBlock>(
            "SELECT id, day, start_time, end_time, status, block_code FROM time_blocks WHERE id = $1",
        )
        .bind(block_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(TimeBlockServiceError::TimeBlockNotFound)
    }

    pub async fn create_time_block(
        &self,
        request: TimeBlockRequest,
    ) -> TimeBlockServiceResult<TimeBlock> {
        let (day, start, end) = match (request.day, &request.start_time, &request.end_time) {
            (Some(day), Some(start), Some(end)) => (day, parse_time(start)?, parse_time(end)?),
            _ => {
                return Err(TimeBlockServiceError::ValidationError(
                    "Día, hora de inicio y hora de fin son obligatorios".to_string(),
                ))
            }
        };
        check_span(start, end)?;

        let mut tx = self.db_pool.begin().await?;

        let block_code = generate_code(&mut tx, day, Shift::for_start(start), None).await?;

        let block = sqlx::query_as::<_, TimeBlock>(
            r#"
            INSERT INTO time_blocks (day, start_time, end_time, status, block_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, day, start_time, end_time, status, block_code
            "#,
        )
        .bind(day)
        .bind(start)
        .bind(end)
        .bind(request.status.unwrap_or_default())
        .bind(&block_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(TimeBlockServiceError::from_write)?;

        tx.commit().await?;

        info!("Time block {} created", block.block_code);
        Ok(block)
    }

    /// Partial update; the code is regenerated when the day or shift changes
    pub async fn update_time_block(
        &self,
        block_id: i32,
        request: TimeBlockRequest,
    ) -> TimeBlockServiceResult<TimeBlock> {
        let current = self.get_time_block(block_id).await?;

        let day = request.day.unwrap_or(current.day);
        let start = match &request.start_time {
            Some(value) => parse_time(value)?,
            None => current.start_time,
        };
        let end = match &request.end_time {
            Some(value) => parse_time(value)?,
            None => current.end_time,
        };
        check_span(start, end)?;

        let mut tx = self.db_pool.begin().await?;

        let shift = Shift::for_start(start);
        let block_code =
            if day != current.day || shift != Shift::for_start(current.start_time) {
                generate_code(&mut tx, day, shift, Some(block_id)).await?
            } else {
                current.block_code
            };

        let block = sqlx::query_as::<_, TimeBlock>(
            r#"
            UPDATE time_blocks
            SET day = $1, start_time = $2, end_time = $3, status = $4, block_code = $5
            WHERE id = $6
            RETURNING id, day, start_time, end_time, status, block_code
            "#,
        )
        .bind(day)
        .bind(start)
        .bind(end)
        .bind(request.status.unwrap_or(current.status))
        .bind(&block_code)
        .bind(block_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(TimeBlockServiceError::from_write)?
        .ok_or(TimeBlockServiceError::TimeBlockNotFound)?;

        tx.commit().await?;

        info!("Time block {} updated ({})", block_id, block.block_code);
        Ok(block)
    }

    pub async fn delete_time_block(&self, block_id: i32) -> TimeBlockServiceResult<()> {
        let result = sqlx::query("DELETE FROM time_blocks WHERE id = $1")
            .bind(block_id)
            .execute(&self.db_pool)
            .await
            .map_err(TimeBlockServiceError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(TimeBlockServiceError::TimeBlockNotFound);
        }

        info!("Time block {} deleted", block_id);
        Ok(())
    }

    /// Code a block starting at the given day and time would receive now
    pub async fn preview_next_code(
        &self,
        query: NextCodeQuery,
    ) -> TimeBlockServiceResult<NextCodeResponse> {
        let start = parse_time(&query.start_time)?;
        let mut conn = self.db_pool.acquire().await?;
        let block_code = generate_code(&mut conn, query.day, Shift::for_start(start), None).await?;

        Ok(NextCodeResponse { block_code })
    }
}

/// Next free code for a day and shift, ignoring the block being edited
async fn generate_code(
    conn: &mut PgConnection,
    day: Weekday,
    shift: Shift,
    exclude_id: Option<i32>,
) -> TimeBlockServiceResult<String> {
    let prefix = code_prefix(day, shift);

    let codes: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT block_code FROM time_blocks
        WHERE block_code LIKE $1 || '%'
          AND ($2::INTEGER IS NULL OR id <> $2)
        "#,
    )
    .bind(&prefix)
    .bind(exclude_id)
    .fetch_all(conn)
    .await?;

    let n = next_sequence(&prefix, codes.iter().map(String::as_str));
    Ok(format!("{}{}", prefix, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_span_limits() {
        assert!(check_span(at(8, 0), at(10, 0)).is_ok());
        assert!(check_span(at(8, 0), at(14, 0)).is_ok());
        assert!(matches!(
            check_span(at(8, 0), at(14, 1)),
            Err(TimeBlockServiceError::InvalidSpan)
        ));
        assert!(check_span(at(10, 0), at(10, 0)).is_err());
        assert!(check_span(at(10, 0), at(9, 0)).is_err());
    }

    #[test]
    fn test_code_prefix() {
        assert_eq!(code_prefix(Weekday::Monday, Shift::for_start(at(7, 0))), "LUN-M");
        assert_eq!(code_prefix(Weekday::Wednesday, Shift::for_start(at(14, 0))), "MIE-T");
        assert_eq!(code_prefix(Weekday::Saturday, Shift::for_start(at(19, 30))), "SAB-N");
    }

    #[test]
    fn test_next_sequence_follows_highest() {
        let existing = ["LUN-M1", "LUN-M3", "LUN-T7", "MAR-M9"];
        assert_eq!(next_sequence("LUN-M", existing), 4);
        assert_eq!(next_sequence("LUN-N", existing), 1);
        assert_eq!(next_sequence("LUN-M", ["LUN-M9", "LUN-M10"]), 11);
    }

    #[test]
    fn test_invalid_time_format() {
        assert!(matches!(
            parse_time("8am"),
            Err(TimeBlockServiceError::ValidationError(_))
        ));
        assert_eq!(parse_time("08:30").unwrap(), at(8, 30));
    }
}
