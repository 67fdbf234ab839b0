// src/store/mod.rs

//! Persistence seams of the tracker.
//!
//! `ProgressStore` owns progress records; `SubjectResolver` reads the subject
//! catalog. Each has a Postgres and an in-memory backend, and both backends
//! agree on what exists: a subject unknown to the resolver is `NotFound`
//! whether it is named by code or by id.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        progress::{ProgressRecord, TopicKey},
        subject::Subject,
    },
};

pub use memory::{MemoryProgressStore, MemorySubjectResolver};
pub use postgres::{PgProgressStore, PgSubjectResolver};

/// A mutation applied to a record while its triple is exclusively held.
pub type RecordMutation<'a> = &'a (dyn Fn(&mut ProgressRecord) + Send + Sync);

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Loads the record for one triple.
    async fn find(&self, key: &TopicKey) -> Result<Option<ProgressRecord>, AppError>;

    /// Loads every record of a user within a subject, in no particular order.
    async fn find_by_subject(
        &self,
        user_id: i64,
        subject_id: i64,
    ) -> Result<Vec<ProgressRecord>, AppError>;

    /// Creates the record if missing, applies `mutation` and persists the
    /// result as one atomic step.
    ///
    /// Implementations must hold the triple exclusively from load to save so
    /// that concurrent calls on the same triple never lose an update.
    async fn upsert_with(
        &self,
        key: &TopicKey,
        mutation: RecordMutation<'_>,
    ) -> Result<ProgressRecord, AppError>;
}

#[async_trait]
pub trait SubjectResolver: Send + Sync {
    /// Looks a subject up by its code.
    async fn resolve_code(&self, code: &str) -> Result<Option<Subject>, AppError>;

    /// Looks a subject up by its identifier.
    async fn find(&self, subject_id: i64) -> Result<Option<Subject>, AppError>;
}
