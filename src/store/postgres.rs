// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{ProgressStore, RecordMutation, SubjectResolver};
use crate::{
    error::AppError,
    models::{
        progress::{AttemptWindow, ProgressRecord, TopicKey},
        subject::Subject,
    },
};

const SELECT_PROGRESS: &str = r#"
    SELECT
        user_id,
        subject_id,
        topic,
        total_questions,
        correct_questions,
        recent_attempts,
        recent_accuracy,
        mastery_score,
        current_difficulty,
        last_practiced
    FROM topic_progress
"#;

/// Raw 'topic_progress' row.
#[derive(Debug, FromRow)]
struct ProgressRow {
    user_id: i64,
    subject_id: i64,
    topic: String,
    total_questions: i64,
    correct_questions: i64,
    recent_attempts: Vec<bool>,
    recent_accuracy: f64,
    mastery_score: f64,
    current_difficulty: String,
    last_practiced: Option<DateTime<Utc>>,
}

impl TryFrom<ProgressRow> for ProgressRecord {
    type Error = AppError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        Ok(ProgressRecord {
            user_id: row.user_id,
            subject_id: row.subject_id,
            topic: row.topic,
            total_questions: row.total_questions,
            correct_questions: row.correct_questions,
            recent_attempts: AttemptWindow::from(row.recent_attempts),
            recent_accuracy: row.recent_accuracy,
            mastery_score: row.mastery_score,
            current_difficulty: row.current_difficulty.parse()?,
            last_practiced: row.last_practiced,
        })
    }
}

/// Record store on the 'topic_progress' table.
///
/// Writes run in a transaction holding the row lock (`SELECT ... FOR UPDATE`)
/// between load and save, so racing submissions on one triple serialize.
#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn find(&self, key: &TopicKey) -> Result<Option<ProgressRecord>, AppError> {
        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "{SELECT_PROGRESS} WHERE user_id = $1 AND subject_id = $2 AND topic = $3"
        ))
        .bind(key.user_id)
        .bind(key.subject_id)
        .bind(&key.topic)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch progress for {}: {:?}", key, e);
            AppError::from(e)
        })?;

        row.map(ProgressRecord::try_from).transpose()
    }

    async fn find_by_subject(
        &self,
        user_id: i64,
        subject_id: i64,
    ) -> Result<Vec<ProgressRecord>, AppError> {
        let rows = sqlx::query_as::<_, ProgressRow>(&format!(
            "{SELECT_PROGRESS} WHERE user_id = $1 AND subject_id = $2"
        ))
        .bind(user_id)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to list progress for user {} / subject {}: {:?}",
                user_id,
                subject_id,
                e
            );
            AppError::from(e)
        })?;

        rows.into_iter().map(ProgressRecord::try_from).collect()
    }

    async fn upsert_with(
        &self,
        key: &TopicKey,
        mutation: RecordMutation<'_>,
    ) -> Result<ProgressRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Materialize the row with column defaults if this is the first submission
        sqlx::query(
            r#"
            INSERT INTO topic_progress (user_id, subject_id, topic)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, subject_id, topic) DO NOTHING
            "#,
        )
        .bind(key.user_id)
        .bind(key.subject_id)
        .bind(&key.topic)
        .execute(&mut *tx)
        .await?;

        // 2. Lock it until commit
        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "{SELECT_PROGRESS} WHERE user_id = $1 AND subject_id = $2 AND topic = $3 FOR UPDATE"
        ))
        .bind(key.user_id)
        .bind(key.subject_id)
        .bind(&key.topic)
        .fetch_one(&mut *tx)
        .await?;

        let mut record = ProgressRecord::try_from(row)?;
        mutation(&mut record);

        // 3. Write back
        sqlx::query(
            r#"
            UPDATE topic_progress SET
                total_questions = $4,
                correct_questions = $5,
                recent_attempts = $6,
                recent_accuracy = $7,
                mastery_score = $8,
                current_difficulty = $9,
                last_practiced = $10,
                updated_at = NOW()
            WHERE user_id = $1 AND subject_id = $2 AND topic = $3
            "#,
        )
        .bind(key.user_id)
        .bind(key.subject_id)
        .bind(&key.topic)
        .bind(record.total_questions)
        .bind(record.correct_questions)
        .bind(record.recent_attempts.to_vec())
        .bind(record.recent_accuracy)
        .bind(record.mastery_score)
        .bind(record.current_difficulty.as_str())
        .bind(record.last_practiced)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(record)
    }
}

/// Reads the 'subjects' table.
#[derive(Clone)]
pub struct PgSubjectResolver {
    pool: PgPool,
}

impl PgSubjectResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectResolver for PgSubjectResolver {
    async fn resolve_code(&self, code: &str) -> Result<Option<Subject>, AppError> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT id, subject_code, title FROM subjects WHERE subject_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to resolve subject code {}: {:?}", code, e);
            AppError::from(e)
        })?;

        Ok(subject)
    }

    async fn find(&self, subject_id: i64) -> Result<Option<Subject>, AppError> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT id, subject_code, title FROM subjects WHERE id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch subject {}: {:?}", subject_id, e);
            AppError::from(e)
        })?;

        Ok(subject)
    }
}
