// src/handlers/progress.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError, models::progress::RecordResultsRequest, services::MasteryTracker,
};

/// Folds a graded batch into the user's topic record.
///
/// * Body: `{ "subject_id" | "subject_code", "topic", "results": [bool] }`.
/// * Malformed bodies (e.g., numeric results) are rejected with
///   `400 Bad Request`.
/// * Returns the updated record.
pub async fn calculate_topic_mastery(
    State(tracker): State<MasteryTracker>,
    Path(user_id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let req: RecordResultsRequest = serde_json::from_value(body)?;
    req.validate()?;
    let subject = req.subject_ref()?;

    let record = tracker
        .record_results(user_id, &subject, &req.topic, &req.results)
        .await?;

    Ok(Json(record))
}

/// Lists progress for every topic the user practiced in a subject, ordered by topic.
/// Each entry carries the subject's code and title.
pub async fn get_subject_progress(
    State(tracker): State<MasteryTracker>,
    Path((user_id, subject_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let records = tracker.subject_progress(user_id, subject_id).await?;
    Ok(Json(records))
}

/// Aggregated mastery for a subject with the recommended topic to practice next.
pub async fn get_subject_summary(
    State(tracker): State<MasteryTracker>,
    Path((user_id, subject_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let summary = tracker.subject_summary(user_id, subject_id).await?;
    Ok(Json(summary))
}

/// Progress for one topic. 404 if the topic was never practiced.
pub async fn get_topic_progress(
    State(tracker): State<MasteryTracker>,
    Path((user_id, subject_id, topic)): Path<(i64, i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    let record = tracker.record(user_id, subject_id, &topic).await?;
    Ok(Json(record))
}
