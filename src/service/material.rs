//! Teaching Material Service
//!
//! Uploaded files live on disk under `<upload dir>/<course id>/` with a
//! random prefix; the database row keeps the original name for downloads.

use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::config::UploadConfig;
use crate::models::{Material, MaterialUpload};
use crate::service::audit::{self, AuditAction};
use crate::utils::error::{is_foreign_key_violation, AppError};

/// Extensions accepted for upload
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "ppt", "pptx"];

#[derive(Error, Debug)]
pub enum MaterialServiceError {
    #[error("Material not found")]
    MaterialNotFound,

    #[error("Stored file for material {0} is missing")]
    FileMissing(i32),

    #[error("No file was uploaded")]
    MissingFile,

    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("File type not allowed")]
    ExtensionNotAllowed,

    #[error("File exceeds {max} bytes")]
    TooLarge { max: usize },

    #[error("Course or teacher not found")]
    ReferenceNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<MaterialServiceError> for AppError {
    fn from(err: MaterialServiceError) -> Self {
        match err {
            MaterialServiceError::MaterialNotFound => {
                AppError::NotFound("Material no encontrado".to_string())
            }
            MaterialServiceError::FileMissing(_) => {
                AppError::NotFound("El archivo del material no existe".to_string())
            }
            MaterialServiceError::MissingFile => {
                AppError::Validation("No se envió ningún archivo".to_string())
            }
            MaterialServiceError::MissingFields(fields) => {
                AppError::Validation(format!("Faltan campos obligatorios: {}", fields))
            }
            MaterialServiceError::ExtensionNotAllowed => AppError::Validation(format!(
                "Tipo de archivo no permitido. Extensiones válidas: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )),
            MaterialServiceError::TooLarge { max } => AppError::PayloadTooLarge(format!(
                "El archivo supera el tamaño máximo de {} MB",
                max / (1024 * 1024)
            )),
            MaterialServiceError::ReferenceNotFound => {
                AppError::NotFound("Curso o docente no encontrado".to_string())
            }
            MaterialServiceError::ValidationError(msg) => AppError::Validation(msg),
            MaterialServiceError::StorageError(e) => AppError::Storage(e),
            MaterialServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type MaterialServiceResult<T> = Result<T, MaterialServiceError>;

/// File part of a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Lower-cased extension if it is one of the accepted ones
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Last path component with anything outside `[A-Za-z0-9._-]` replaced by `_`
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "archivo".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}

/// Write the file under `<dir>/<course_id>/<uuid>_<name>` and return its path
pub async fn store_file(
    dir: &Path,
    course_id: i32,
    sanitized_name: &str,
    bytes: &[u8],
) -> io::Result<PathBuf> {
    let course_dir = dir.join(course_id.to_string());
    tokio::fs::create_dir_all(&course_dir).await?;

    let path = course_dir.join(format!("{}_{}", Uuid::new_v4(), sanitized_name));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

async fn remove_stored(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

const MATERIAL_COLUMNS: &str = "id, title, description, course_id, unit, teacher_id, \
     file_name, file_path, content_type, file_size, uploaded_at";

#[derive(Clone)]
pub struct MaterialService {
    db_pool: PgPool,
    uploads: UploadConfig,
}

impl MaterialService {
    pub fn new(db_pool: PgPool, uploads: UploadConfig) -> Self {
        Self { db_pool, uploads }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.uploads.max_bytes
    }

    /// Check, store and register an uploaded file
    pub async fn upload(
        &self,
        upload: MaterialUpload,
        file: Option<UploadedFile>,
    ) -> MaterialServiceResult<Material> {
        let file = file.ok_or(MaterialServiceError::MissingFile)?;

        let (course_id, teacher_id) = match (upload.course_id, upload.teacher_id) {
            (Some(course), Some(teacher)) => (course, teacher),
            (course, _) => {
                let missing = if course.is_none() {
                    "course_id"
                } else {
                    "teacher_id"
                };
                return Err(MaterialServiceError::MissingFields(missing.to_string()));
            }
        };
        upload
            .validate()
            .map_err(|e| MaterialServiceError::ValidationError(e.to_string()))?;

        let extension =
            allowed_extension(&file.file_name).ok_or(MaterialServiceError::ExtensionNotAllowed)?;
        if file.bytes.len() > self.uploads.max_bytes {
            return Err(MaterialServiceError::TooLarge {
                max: self.uploads.max_bytes,
            });
        }

        let original_name = sanitize_file_name(&file.file_name);
        let path = store_file(&self.uploads.dir, course_id, &original_name, &file.bytes).await?;

        match self
            .register(&upload, course_id, teacher_id, &original_name, &extension, &path, file.bytes.len())
            .await
        {
            Ok(material) => {
                info!(
                    "Material {} uploaded by teacher {} for course {}",
                    material.id, teacher_id, course_id
                );
                Ok(material)
            }
            Err(e) => {
                remove_stored(&path).await;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn register(
        &self,
        upload: &MaterialUpload,
        course_id: i32,
        teacher_id: i32,
        file_name: &str,
        extension: &str,
        path: &Path,
        size: usize,
    ) -> MaterialServiceResult<Material> {
        let mut tx = self.db_pool.begin().await?;

        let query = format!(
            r#"
            INSERT INTO teaching_materials
                (title, description, course_id, unit, teacher_id, file_name, file_path, content_type, file_size)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            MATERIAL_COLUMNS
        );
        let material = sqlx::query_as::<_, Material>(&query)
            .bind(upload.title.trim())
            .bind(&upload.description)
            .bind(course_id)
            .bind(&upload.unit)
            .bind(teacher_id)
            .bind(file_name)
            .bind(path.to_string_lossy().as_ref())
            .bind(content_type_for(extension))
            .bind(size as i64)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    MaterialServiceError::ReferenceNotFound
                } else {
                    MaterialServiceError::DatabaseError(e)
                }
            })?;

        audit::record(
            &mut tx,
            teacher_id,
            AuditAction::Insert,
            "teaching_materials",
            Some(material.id),
            json!({ "course_id": course_id, "file_name": material.file_name }),
        )
        .await?;

        tx.commit().await?;
        Ok(material)
    }

    pub async fn list_for_teacher(&self, teacher_id: i32) -> MaterialServiceResult<Vec<Material>> {
        let query = format!(
            "SELECT {} FROM teaching_materials WHERE teacher_id = $1 ORDER BY uploaded_at DESC",
            MATERIAL_COLUMNS
        );
        let materials = sqlx::query_as::<_, Material>(&query)
            .bind(teacher_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(materials)
    }

    /// Material of every course the student is actively enrolled in
    pub async fn list_for_student(&self, student_id: i32) -> MaterialServiceResult<Vec<Material>> {
        let query = format!(
            r#"
            SELECT {} FROM teaching_materials
            WHERE course_id IN (
                SELECT a.course_id
                FROM enrollments e
                JOIN assignments a ON a.id = e.assignment_id
                WHERE e.student_id = $1 AND e.status = 'ACTIVE'
            )
            ORDER BY course_id, uploaded_at DESC
            "#,
            MATERIAL_COLUMNS
        );
        let materials = sqlx::query_as::<_, Material>(&query)
            .bind(student_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(materials)
    }

    /// Remove the row, then the stored file
    pub async fn delete(&self, material_id: i32) -> MaterialServiceResult<()> {
        let mut tx = self.db_pool.begin().await?;

        let query = format!(
            "DELETE FROM teaching_materials WHERE id = $1 RETURNING {}",
            MATERIAL_COLUMNS
        );
        let material = sqlx::query_as::<_, Material>(&query)
            .bind(material_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(MaterialServiceError::MaterialNotFound)?;

        audit::record(
            &mut tx,
            material.teacher_id,
            AuditAction::Delete,
            "teaching_materials",
            Some(material.id),
            json!({ "course_id": material.course_id, "file_name": material.file_name }),
        )
        .await?;

        tx.commit().await?;

        remove_stored(Path::new(&material.file_path)).await;
        info!("Material {} deleted", material_id);
        Ok(())
    }

    /// Row and file contents for a download
    pub async fn download(&self, material_id: i32) -> MaterialServiceResult<(Material, Vec<u8>)> {
        let query = format!(
            "SELECT {} FROM teaching_materials WHERE id = $1",
            MATERIAL_COLUMNS
        );
        let material = sqlx::query_as::<_, Material>(&query)
            .bind(material_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(MaterialServiceError::MaterialNotFound)?;

        match tokio::fs::read(&material.file_path).await {
            Ok(bytes) => Ok((material, bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Material {} points at missing file {}",
                    material.id, material.file_path
                );
                Err(MaterialServiceError::FileMissing(material.id))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(max_bytes: usize) -> MaterialService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        MaterialService::new(
            pool,
            UploadConfig {
                dir: std::env::temp_dir().join("academic-service-tests"),
                max_bytes,
            },
        )
    }

    fn upload() -> MaterialUpload {
        MaterialUpload {
            course_id: Some(3),
            teacher_id: Some(4),
            title: "Semana 1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_allowed_extensions() {
        assert_eq!(allowed_extension("silabo.PDF").as_deref(), Some("pdf"));
        assert_eq!(allowed_extension("clase.pptx").as_deref(), Some("pptx"));
        assert!(allowed_extension("script.sh").is_none());
        assert!(allowed_extension("sin_extension").is_none());
        assert_eq!(content_type_for("pdf"), "application/pdf");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\Unidad 1.pdf"), "Unidad_1.pdf");
        assert_eq!(sanitize_file_name("clase ñandú.docx"), "clase__and_.docx");
        assert_eq!(sanitize_file_name("..."), "archivo");
    }

    #[tokio::test]
    async fn test_store_file_layout() {
        let dir = std::env::temp_dir().join(format!("materials-{}", Uuid::new_v4()));
        let path = store_file(&dir, 12, "guia.pdf", b"%PDF-1.4").await.unwrap();

        assert_eq!(path.parent().unwrap(), dir.join("12"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("_guia.pdf"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.4");

        remove_stored(&path).await;
        assert!(!path.exists());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let svc = service(8);

        assert!(matches!(
            svc.upload(upload(), None).await,
            Err(MaterialServiceError::MissingFile)
        ));

        let script = UploadedFile {
            file_name: "virus.exe".to_string(),
            bytes: vec![0; 4],
        };
        assert!(matches!(
            svc.upload(upload(), Some(script)).await,
            Err(MaterialServiceError::ExtensionNotAllowed)
        ));

        let big = UploadedFile {
            file_name: "tema.pdf".to_string(),
            bytes: vec![0; 9],
        };
        let err = svc.upload(upload(), Some(big)).await.unwrap_err();
        assert!(matches!(err, MaterialServiceError::TooLarge { max: 8 }));
        assert_eq!(AppError::from(err).status_code().as_u16(), 413);

        let mut no_course = upload();
        no_course.course_id = None;
        let file = UploadedFile {
            file_name: "tema.pdf".to_string(),
            bytes: vec![0; 4],
        };
        assert!(matches!(
            svc.upload(no_course, Some(file)).await,
            Err(MaterialServiceError::MissingFields(_))
        ));
    }
}
