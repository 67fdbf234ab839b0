// src/services/tracker.rs

use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::MAX_TOPIC_LENGTH,
    error::AppError,
    models::{
        progress::{ProgressRecord, SubjectProgress, SubjectSummary, TopicKey},
        subject::{Subject, SubjectRef},
    },
    store::{ProgressStore, SubjectResolver},
};

/// Owns topic-level mastery for every learner.
///
/// Each submission is one atomic read-modify-write on a single
/// (user, subject, topic) record; the store guarantees exclusivity per
/// triple. The tracker never retries and never spawns work of its own.
#[derive(Clone)]
pub struct MasteryTracker {
    store: Arc<dyn ProgressStore>,
    subjects: Arc<dyn SubjectResolver>,
}

impl MasteryTracker {
    pub fn new(store: Arc<dyn ProgressStore>, subjects: Arc<dyn SubjectResolver>) -> Self {
        Self { store, subjects }
    }

    /// Looks the referenced subject up in the catalog.
    ///
    /// Identifiers are checked for existence just like codes, so an unknown
    /// subject is `NotFound` regardless of the storage backend.
    pub async fn resolve_subject(&self, subject: &SubjectRef) -> Result<Subject, AppError> {
        match subject {
            SubjectRef::Id(id) => {
                validate_id("subject", *id)?;
                self.subjects.find(*id).await?.ok_or_else(|| {
                    tracing::warn!("Subject {} does not exist", id);
                    AppError::NotFound(format!("Subject {} not found", id))
                })
            }
            SubjectRef::Code(code) => self.subjects.resolve_code(code).await?.ok_or_else(|| {
                tracing::warn!("Subject code {} did not resolve", code);
                AppError::NotFound(format!("Subject with code {} not found", code))
            }),
        }
    }

    /// Folds a batch of graded results into the learner's record for a topic,
    /// creating the record on first use.
    ///
    /// Nothing is written if validation or subject resolution fails.
    pub async fn record_results(
        &self,
        user_id: i64,
        subject: &SubjectRef,
        topic: &str,
        results: &[bool],
    ) -> Result<ProgressRecord, AppError> {
        validate_id("user", user_id)?;
        validate_topic(topic)?;

        let subject = self.resolve_subject(subject).await?;
        let key = TopicKey::new(user_id, subject.id, topic);

        let now = Utc::now();
        let record = self
            .store
            .upsert_with(&key, &|record: &mut ProgressRecord| {
                record.apply_results(results, now)
            })
            .await?;

        tracing::info!(
            "Recorded {} result(s) for {}: mastery {:.3} ({})",
            results.len(),
            key,
            record.mastery_score,
            record.current_difficulty
        );

        Ok(record)
    }

    /// Every record of a user within a subject, ordered by topic.
    pub async fn records_for_subject(
        &self,
        user_id: i64,
        subject_id: i64,
    ) -> Result<Vec<ProgressRecord>, AppError> {
        validate_id("user", user_id)?;
        validate_id("subject", subject_id)?;

        let mut records = self.store.find_by_subject(user_id, subject_id).await?;
        records.sort_by(|a, b| a.topic.cmp(&b.topic));
        Ok(records)
    }

    /// Same records as [`Self::records_for_subject`], each carrying the
    /// subject's code and title for display.
    pub async fn subject_progress(
        &self,
        user_id: i64,
        subject_id: i64,
    ) -> Result<Vec<SubjectProgress>, AppError> {
        let records = self.records_for_subject(user_id, subject_id).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let subject = self.subjects.find(subject_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Subject {} not found", subject_id))
        })?;

        Ok(records
            .into_iter()
            .map(|record| SubjectProgress {
                record,
                subject: subject.clone(),
            })
            .collect())
    }

    pub async fn record(
        &self,
        user_id: i64,
        subject_id: i64,
        topic: &str,
    ) -> Result<ProgressRecord, AppError> {
        validate_id("user", user_id)?;
        validate_id("subject", subject_id)?;

        let key = TopicKey::new(user_id, subject_id, topic);
        self.store
            .find(&key)
            .await?
            .ok_or_else(|| AppError::NotFound("No progress found for this topic".to_string()))
    }

    /// Aggregate mastery over a subject plus the weakest topic to practice next.
    pub async fn subject_summary(
        &self,
        user_id: i64,
        subject_id: i64,
    ) -> Result<SubjectSummary, AppError> {
        let records = self.records_for_subject(user_id, subject_id).await?;
        Ok(SubjectSummary::from_records(user_id, subject_id, &records))
    }
}

fn validate_id(what: &str, id: i64) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::InvalidArgument(format!("Invalid {} id {}", what, id)));
    }
    Ok(())
}

/// Topics must not be blank and are at most [`MAX_TOPIC_LENGTH`] characters.
/// They are otherwise kept exactly as given.
pub fn validate_topic(topic: &str) -> Result<(), AppError> {
    if topic.trim().is_empty() {
        return Err(AppError::InvalidArgument("Topic must not be empty".to_string()));
    }
    if topic.chars().count() > MAX_TOPIC_LENGTH {
        return Err(AppError::InvalidArgument(format!(
            "Topic must be at most {} characters",
            MAX_TOPIC_LENGTH
        )));
    }
    Ok(())
}
