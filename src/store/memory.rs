// src/store/memory.rs

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::{ProgressStore, RecordMutation, SubjectResolver};
use crate::{
    error::AppError,
    models::{
        progress::{ProgressRecord, TopicKey},
        subject::Subject,
    },
};

/// `None` until the first write on the triple completes.
type Slot = Arc<Mutex<Option<ProgressRecord>>>;

/// Process-local record store.
///
/// The outer lock only guards the slot map; each triple is mutated under its
/// own slot mutex, so writers on different triples do not wait on each other.
#[derive(Default)]
pub struct MemoryProgressStore {
    slots: RwLock<HashMap<TopicKey, Slot>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &TopicKey) -> Slot {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn find(&self, key: &TopicKey) -> Result<Option<ProgressRecord>, AppError> {
        let slot = self.slots.read().await.get(key).cloned();
        match slot {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(None),
        }
    }

    async fn find_by_subject(
        &self,
        user_id: i64,
        subject_id: i64,
    ) -> Result<Vec<ProgressRecord>, AppError> {
        let slots: Vec<Slot> = self
            .slots
            .read()
            .await
            .iter()
            .filter(|(k, _)| k.user_id == user_id && k.subject_id == subject_id)
            .map(|(_, slot)| slot.clone())
            .collect();

        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(record) = slot.lock().await.as_ref() {
                records.push(record.clone());
            }
        }
        Ok(records)
    }

    async fn upsert_with(
        &self,
        key: &TopicKey,
        mutation: RecordMutation<'_>,
    ) -> Result<ProgressRecord, AppError> {
        let slot = self.slot(key).await;
        let mut guard = slot.lock().await;

        let mut record = guard.take().unwrap_or_else(|| ProgressRecord::new(key));
        mutation(&mut record);
        *guard = Some(record.clone());

        Ok(record)
    }
}

/// Process-local subject catalog keyed by identifier.
#[derive(Default)]
pub struct MemorySubjectResolver {
    subjects: RwLock<HashMap<i64, Subject>>,
}

impl MemorySubjectResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a subject.
    pub async fn insert(&self, subject: Subject) {
        self.subjects.write().await.insert(subject.id, subject);
    }
}

#[async_trait]
impl SubjectResolver for MemorySubjectResolver {
    async fn resolve_code(&self, code: &str) -> Result<Option<Subject>, AppError> {
        Ok(self
            .subjects
            .read()
            .await
            .values()
            .find(|s| s.subject_code == code)
            .cloned())
    }

    async fn find(&self, subject_id: i64) -> Result<Option<Subject>, AppError> {
        Ok(self.subjects.read().await.get(&subject_id).cloned())
    }
}
