// src/models/subject.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'subjects' table in the database.
/// Subjects are owned by the catalog service; this crate only reads them.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,

    /// Human-readable unique code (e.g., "MA3251").
    pub subject_code: String,

    pub title: String,
}

/// How a caller names the subject a submission belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectRef {
    /// Canonical identifier, used as is.
    Id(i64),
    /// Subject code, looked up through a `SubjectResolver`.
    Code(String),
}
