// src/models/progress.rs

use std::{collections::VecDeque, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    config::{
        HARD_THRESHOLD, MEDIUM_THRESHOLD, NEUTRAL_MASTERY, OVERALL_WEIGHT, RECENT_WEIGHT,
        RECENT_WINDOW_SIZE,
    },
    error::AppError,
    models::subject::{Subject, SubjectRef},
    services::tracker,
};

/// Difficulty tier used by content generators to calibrate questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Half-open tiers: `[0, 0.5)` easy, `[0.5, 0.8)` medium, `[0.8, 1]` hard.
    pub fn from_mastery(score: f64) -> Self {
        if score < MEDIUM_THRESHOLD {
            Difficulty::Easy
        } else if score >= HARD_THRESHOLD {
            Difficulty::Hard
        } else {
            Difficulty::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(AppError::InternalServerError(format!(
                "Unknown difficulty '{}'",
                other
            ))),
        }
    }
}

/// The most recent correctness results for one topic, oldest first.
///
/// Capacity is fixed at [`RECENT_WINDOW_SIZE`]; pushing onto a full window
/// evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<bool>", into = "Vec<bool>")]
pub struct AttemptWindow {
    entries: VecDeque<bool>,
}

impl AttemptWindow {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }

    pub fn push(&mut self, correct: bool) {
        if self.entries.len() == RECENT_WINDOW_SIZE {
            self.entries.pop_front();
        }
        self.entries.push_back(correct);
    }

    pub fn extend<I: IntoIterator<Item = bool>>(&mut self, results: I) {
        for correct in results {
            self.push(correct);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn correct_count(&self) -> usize {
        self.entries.iter().filter(|&&c| c).count()
    }

    /// Fraction of correct entries, 0 when empty.
    pub fn accuracy(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.correct_count() as f64 / self.entries.len() as f64
        }
    }

    pub fn to_vec(&self) -> Vec<bool> {
        self.entries.iter().copied().collect()
    }
}

impl Default for AttemptWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps only the most recent entries when given more than fit.
impl From<Vec<bool>> for AttemptWindow {
    fn from(results: Vec<bool>) -> Self {
        let mut window = AttemptWindow::new();
        window.extend(results);
        window
    }
}

impl From<AttemptWindow> for Vec<bool> {
    fn from(window: AttemptWindow) -> Self {
        window.entries.into()
    }
}

/// Identifies one progress record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicKey {
    pub user_id: i64,
    pub subject_id: i64,
    pub topic: String,
}

impl TopicKey {
    pub fn new(user_id: i64, subject_id: i64, topic: impl Into<String>) -> Self {
        Self {
            user_id,
            subject_id,
            topic: topic.into(),
        }
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user {} / subject {} / topic '{}'",
            self.user_id, self.subject_id, self.topic
        )
    }
}

/// Mastery state of one user on one topic of one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: i64,
    pub subject_id: i64,
    pub topic: String,

    /// Lifetime number of graded questions.
    pub total_questions: i64,

    /// Lifetime number of correct answers, never above `total_questions`.
    pub correct_questions: i64,

    pub recent_attempts: AttemptWindow,
    pub recent_accuracy: f64,

    /// Blend of recent and lifetime accuracy in `[0, 1]`.
    pub mastery_score: f64,

    pub current_difficulty: Difficulty,

    /// Unset until the first submission.
    pub last_practiced: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// A never-practiced record with the neutral prior.
    pub fn new(key: &TopicKey) -> Self {
        Self {
            user_id: key.user_id,
            subject_id: key.subject_id,
            topic: key.topic.clone(),
            total_questions: 0,
            correct_questions: 0,
            recent_attempts: AttemptWindow::new(),
            recent_accuracy: 0.0,
            mastery_score: NEUTRAL_MASTERY,
            current_difficulty: Difficulty::Medium,
            last_practiced: None,
        }
    }

    /// Lifetime accuracy, 0 before any question was recorded.
    pub fn overall_accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            0.0
        } else {
            self.correct_questions as f64 / self.total_questions as f64
        }
    }

    /// Folds a batch of graded results into the record.
    ///
    /// Results are appended in order to the rolling window, lifetime counters
    /// grow by the batch size, and the mastery score and difficulty are
    /// recomputed from scratch. An empty batch still recomputes the scores and
    /// stamps `last_practiced`.
    pub fn apply_results(&mut self, results: &[bool], now: DateTime<Utc>) {
        self.recent_attempts.extend(results.iter().copied());

        let correct = results.iter().filter(|&&c| c).count() as i64;
        self.total_questions += results.len() as i64;
        self.correct_questions += correct;

        self.recent_accuracy = self.recent_attempts.accuracy();
        self.mastery_score = (RECENT_WEIGHT * self.recent_accuracy
            + OVERALL_WEIGHT * self.overall_accuracy())
        .clamp(0.0, 1.0);
        self.current_difficulty = Difficulty::from_mastery(self.mastery_score);
        self.last_practiced = Some(now);
    }
}

/// Applies the tracker's topic rule at the request boundary.
fn validate_request_topic(topic: &str) -> Result<(), validator::ValidationError> {
    tracker::validate_topic(topic).map_err(|e| {
        validator::ValidationError::new("invalid_topic").with_message(e.to_string().into())
    })
}

/// DTO for submitting graded results for one topic.
///
/// Exactly one of `subject_id` or `subject_code` must be present.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordResultsRequest {
    pub subject_id: Option<i64>,
    pub subject_code: Option<String>,
    #[validate(custom(function = validate_request_topic))]
    pub topic: String,
    pub results: Vec<bool>,
}

impl RecordResultsRequest {
    pub fn subject_ref(&self) -> Result<SubjectRef, AppError> {
        match (self.subject_id, &self.subject_code) {
            (Some(id), None) => Ok(SubjectRef::Id(id)),
            (None, Some(code)) => Ok(SubjectRef::Code(code.clone())),
            (Some(_), Some(_)) => Err(AppError::InvalidArgument(
                "Specify either subject_id or subject_code, not both".to_string(),
            )),
            (None, None) => Err(AppError::InvalidArgument(
                "Missing subject_id or subject_code".to_string(),
            )),
        }
    }
}

/// A topic record listed together with the subject it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectProgress {
    #[serde(flatten)]
    pub record: ProgressRecord,
    pub subject: Subject,
}

/// The weakest topic of a subject, suggested for the next practice session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicRecommendation {
    pub topic: String,
    pub mastery_score: f64,
    pub difficulty: Difficulty,
}

/// Aggregated progress of one user over every practiced topic of a subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectSummary {
    pub user_id: i64,
    pub subject_id: i64,
    pub topics_practiced: usize,
    pub total_questions: i64,
    pub correct_questions: i64,
    /// Mean topic mastery, absent when nothing has been practiced.
    pub average_mastery: Option<f64>,
    pub recommended_topic: Option<TopicRecommendation>,
}

impl SubjectSummary {
    pub fn from_records(user_id: i64, subject_id: i64, records: &[ProgressRecord]) -> Self {
        let total_questions = records.iter().map(|r| r.total_questions).sum();
        let correct_questions = records.iter().map(|r| r.correct_questions).sum();

        let average_mastery = if records.is_empty() {
            None
        } else {
            let sum: f64 = records.iter().map(|r| r.mastery_score).sum();
            Some(sum / records.len() as f64)
        };

        // Lowest mastery first; ties go to the alphabetically first topic.
        let recommended_topic = records
            .iter()
            .min_by(|a, b| {
                a.mastery_score
                    .total_cmp(&b.mastery_score)
                    .then_with(|| a.topic.cmp(&b.topic))
            })
            .map(|r| TopicRecommendation {
                topic: r.topic.clone(),
                mastery_score: r.mastery_score,
                difficulty: r.current_difficulty,
            });

        Self {
            user_id,
            subject_id,
            topics_practiced: records.len(),
            total_questions,
            correct_questions,
            average_mastery,
            recommended_topic,
        }
    }
}
