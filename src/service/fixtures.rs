//! Rows shared by the database-backed service tests.
//!
//! Inserts go straight through SQL so each test only exercises the service
//! under test. Catalog ids refer to the reference data migration.

use sqlx::PgPool;

use crate::models::AttendanceStatus;
use crate::utils::security::hash_password_with_cost;

pub const TEST_PASSWORD: &str = "Clave2025";

const TEST_BCRYPT_COST: u32 = 4;
const SCHOOL_ID: i32 = 1;
const CLASSROOM_TYPE_ID: i32 = 1;
const PAVILION_ID: i32 = 1;

/// A course with one assignment, and the rows the assignment points to
#[derive(Debug, Clone, Copy)]
pub struct AssignedCourse {
    pub course_id: i32,
    pub section_id: i32,
    pub teacher_id: i32,
    pub time_block_id: i32,
    pub classroom_id: i32,
    pub assignment_id: i32,
}

/// Account holding `role`, with [`TEST_PASSWORD`] as its password
pub async fn insert_account(pool: &PgPool, email: &str, role: &str) -> i32 {
    let hash = hash_password_with_cost(TEST_PASSWORD, TEST_BCRYPT_COST).unwrap();
    let user_id: i32 =
        sqlx::query_scalar("INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id")
            .bind(email)
            .bind(hash)
            .fetch_one(pool)
            .await
            .unwrap();

    sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2::user_role)")
        .bind(user_id)
        .bind(role)
        .execute(pool)
        .await
        .unwrap();

    user_id
}

async fn insert_person(pool: &PgPool, user_id: i32, dni: &str) -> i32 {
    sqlx::query_scalar(
        r#"
        INSERT INTO persons (user_id, first_names, last_names, dni)
        VALUES ($1, 'Prueba', $2, $3)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(format!("Persona {}", dni))
    .bind(dni)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_teacher(pool: &PgPool, dni: &str) -> i32 {
    let user_id = insert_account(pool, &format!("docente{}@unfv.edu.pe", dni), "DOCENTE").await;
    let person_id = insert_person(pool, user_id, dni).await;

    sqlx::query_scalar("INSERT INTO teachers (person_id, school_id) VALUES ($1, $2) RETURNING id")
        .bind(person_id)
        .bind(SCHOOL_ID)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn insert_student(pool: &PgPool, dni: &str, code: &str) -> i32 {
    let user_id = insert_account(pool, &format!("{}@unfv.edu.pe", code), "ALUMNO").await;
    let person_id = insert_person(pool, user_id, dni).await;

    sqlx::query_scalar(
        r#"
        INSERT INTO students (person_id, university_code, school_id)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(person_id)
    .bind(code)
    .bind(SCHOOL_ID)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_course(pool: &PgPool, code: &str) -> i32 {
    sqlx::query_scalar(
        r#"
        INSERT INTO courses (code, name, credits, cycle, course_type)
        VALUES ($1, $2, 4, 1, 'OBLIGATORIO')
        RETURNING id
        "#,
    )
    .bind(code)
    .bind(format!("Curso {}", code))
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_section(pool: &PgPool, code: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO sections (code, academic_cycle, period) VALUES ($1, 'I', '2025-1') RETURNING id",
    )
    .bind(code)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// `day` is a weekday label such as `LUNES`; times are `HH:MM`
pub async fn insert_time_block(pool: &PgPool, day: &str, start: &str, end: &str) -> i32 {
    sqlx::query_scalar(
        r#"
        INSERT INTO time_blocks (day, start_time, end_time, block_code)
        VALUES ($1::weekday, $2::TIME, $3::TIME, $4)
        RETURNING id
        "#,
    )
    .bind(day)
    .bind(start)
    .bind(end)
    .bind(format!("{}-{}", &day[..3], &start[..2]))
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_classroom(pool: &PgPool, name: &str, capacity: i32) -> i32 {
    sqlx::query_scalar(
        r#"
        INSERT INTO classrooms (name, capacity, classroom_type_id, pavilion_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(capacity)
    .bind(CLASSROOM_TYPE_ID)
    .bind(PAVILION_ID)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_assignment(
    pool: &PgPool,
    course_id: i32,
    section_id: i32,
    teacher_id: i32,
    time_block_id: i32,
    classroom_id: i32,
) -> i32 {
    sqlx::query_scalar(
        r#"
        INSERT INTO assignments
            (course_id, section_id, teacher_id, time_block_id, classroom_id, expected_enrollment)
        VALUES ($1, $2, $3, $4, $5, 30)
        RETURNING id
        "#,
    )
    .bind(course_id)
    .bind(section_id)
    .bind(teacher_id)
    .bind(time_block_id)
    .bind(classroom_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Course `INF101` taught by a fresh teacher on Monday 08:00-10:00 in `A-101`
pub async fn assigned_course(pool: &PgPool) -> AssignedCourse {
    let course_id = insert_course(pool, "INF101").await;
    let section_id = insert_section(pool, "A").await;
    let teacher_id = insert_teacher(pool, "12345678").await;
    let time_block_id = insert_time_block(pool, "LUNES", "08:00", "10:00").await;
    let classroom_id = insert_classroom(pool, "A-101", 40).await;
    let assignment_id = insert_assignment(
        pool,
        course_id,
        section_id,
        teacher_id,
        time_block_id,
        classroom_id,
    )
    .await;

    AssignedCourse {
        course_id,
        section_id,
        teacher_id,
        time_block_id,
        classroom_id,
        assignment_id,
    }
}

pub async fn enroll(pool: &PgPool, student_id: i32, assignment_id: i32) {
    sqlx::query("INSERT INTO enrollments (student_id, assignment_id) VALUES ($1, $2)")
        .bind(student_id)
        .bind(assignment_id)
        .execute(pool)
        .await
        .unwrap();
}

/// `class_date` is `YYYY-MM-DD`
pub async fn mark_attendance(
    pool: &PgPool,
    student_id: i32,
    course: &AssignedCourse,
    class_date: &str,
    status: AttendanceStatus,
) {
    sqlx::query(
        r#"
        INSERT INTO attendance (student_id, course_id, teacher_id, class_date, status)
        VALUES ($1, $2, $3, $4::DATE, $5)
        "#,
    )
    .bind(student_id)
    .bind(course.course_id)
    .bind(course.teacher_id)
    .bind(class_date)
    .bind(status)
    .execute(pool)
    .await
    .unwrap();
}
