//! Catalog Models
//!
//! Reference data: schools, geography, formations, specialties, pavilions
//! and classroom types.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct School {
    pub id: i32,
    pub name: String,
    pub faculty: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SchoolRequest {
    #[validate(length(min = 1, max = 150, message = "El nombre de la escuela es obligatorio"))]
    pub name: String,

    #[validate(length(min = 1, max = 150, message = "La facultad es obligatoria"))]
    pub faculty: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Department {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Province {
    pub id: i32,
    pub department_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct District {
    pub id: i32,
    pub province_id: i32,
    pub name: String,
}

/// Generic id/name pair for formations, specialties and classroom types
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NamedItem {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PavilionRequest {
    #[validate(length(min = 1, max = 80, message = "El nombre del pabellón es obligatorio"))]
    pub name: String,
}
