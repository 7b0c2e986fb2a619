use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transitions pending -> reviewed exactly once. A second review attempt on
/// an already-reviewed payload is rejected; from then on the payload is
/// read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Reviewed,
}

/// Per-sub-answer verdict recorded by a reviewer on a grammar or
/// sentence-writing attempt. `corrected_text` is only kept for incorrect
/// answers; corrections supplied alongside a correct verdict are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceReview {
    pub index: usize,
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_text: Option<String>,
    pub reviewed_at: DateTime<Utc>,
    pub reviewed_by: String,
}

/// Holistic verdict on a summary attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReview {
    pub feedback: String,
    pub is_acceptable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_version: Option<String>,
    pub reviewed_at: DateTime<Utc>,
    pub reviewed_by: String,
}

/// Reviewer input for one sentence; the index is taken from its position in
/// the submitted list. Serialize is needed by the request DTO's `length`
/// validation, which echoes the offending value into the error params.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceJudgment {
    pub is_correct: bool,
    #[serde(default)]
    pub corrected_text: Option<String>,
}

/// Reviewer input for a summary attempt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryJudgment {
    pub feedback: String,
    pub is_acceptable: bool,
    #[serde(default)]
    pub corrected_version: Option<String>,
}

/// Filter for the reviewer work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewFilter {
    #[default]
    Pending,
    Reviewed,
    All,
}

impl ReviewFilter {
    pub fn matches(&self, status: ReviewStatus) -> bool {
        match self {
            ReviewFilter::Pending => status == ReviewStatus::Pending,
            ReviewFilter::Reviewed => status == ReviewStatus::Reviewed,
            ReviewFilter::All => true,
        }
    }
}

/// Review score for a list of per-sentence verdicts.
pub fn review_score(correct: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    (100.0 * correct as f64 / total as f64).round() as i32
}
