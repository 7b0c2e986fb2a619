use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::drill::DrillType;
use super::review::{ReviewStatus, SentenceReview, SummaryReview};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyItemResult {
    pub word: String,
    pub attempts: u32,
    pub best_score: i32,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyResults {
    pub items: Vec<VocabularyItemResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    pub text: String,
    pub attempts: u32,
    pub best_score: i32,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneResult {
    pub title: String,
    pub learner_turns: Vec<TurnResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleplayResults {
    pub scenes: Vec<SceneResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingResults {
    pub correct_pairs: u32,
    pub total_pairs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionResults {
    pub correct_count: u32,
    pub total_count: u32,
}

/// A sentence the learner wrote, awaiting or carrying review. Used by both
/// grammar and sentence-writing drills; `prompt` is the grammar pattern or
/// the target word respectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenSentence {
    pub prompt: String,
    pub sentence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarResults {
    pub sentences: Vec<WrittenSentence>,
    pub review_status: ReviewStatus,
    #[serde(default)]
    pub reviews: Vec<SentenceReview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceResults {
    pub sentences: Vec<WrittenSentence>,
    pub review_status: ReviewStatus,
    #[serde(default)]
    pub reviews: Vec<SentenceReview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResults {
    pub summary_text: String,
    pub review_status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<SummaryReview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListeningResults {
    pub correct_count: u32,
    pub total_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBlankResults {
    pub correct_count: u32,
    pub total_count: u32,
}

/// Exactly one type-specific results payload per attempt, keyed by the
/// drill's type. The tag-payload correspondence is validated at the attempt
/// store boundary instead of being trusted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DrillResults {
    #[serde(rename = "vocabularyResults")]
    Vocabulary(VocabularyResults),
    #[serde(rename = "roleplayResults")]
    Roleplay(RoleplayResults),
    #[serde(rename = "matchingResults")]
    Matching(MatchingResults),
    #[serde(rename = "definitionResults")]
    Definition(DefinitionResults),
    #[serde(rename = "grammarResults")]
    Grammar(GrammarResults),
    #[serde(rename = "sentenceResults")]
    Sentence(SentenceResults),
    #[serde(rename = "summaryResults")]
    Summary(SummaryResults),
    #[serde(rename = "listeningResults")]
    Listening(ListeningResults),
    #[serde(rename = "fillBlankResults")]
    FillBlank(FillBlankResults),
}

impl DrillResults {
    /// The drill type this payload belongs to.
    pub fn drill_type(&self) -> DrillType {
        match self {
            DrillResults::Vocabulary(_) => DrillType::Vocabulary,
            DrillResults::Roleplay(_) => DrillType::Roleplay,
            DrillResults::Matching(_) => DrillType::Matching,
            DrillResults::Definition(_) => DrillType::Definition,
            DrillResults::Grammar(_) => DrillType::Grammar,
            DrillResults::Sentence(_) => DrillType::SentenceWriting,
            DrillResults::Summary(_) => DrillType::Summary,
            DrillResults::Listening(_) => DrillType::Listening,
            DrillResults::FillBlank(_) => DrillType::FillBlank,
        }
    }

    /// Review status for subjective payloads, `None` for objective ones.
    pub fn review_status(&self) -> Option<ReviewStatus> {
        match self {
            DrillResults::Grammar(r) => Some(r.review_status),
            DrillResults::Sentence(r) => Some(r.review_status),
            DrillResults::Summary(r) => Some(r.review_status),
            _ => None,
        }
    }
}

/// One learner submission against one assignment. Immutable once created,
/// except that the review pipeline fills in the embedded review payload of
/// subjective results. Multiple attempts may exist per assignment; "latest"
/// is the one with the greatest `(completed_at, created_at)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub assignment_id: String,
    pub learner_id: String,
    pub drill_id: String,
    pub drill_type: DrillType,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Seconds spent in the practice session.
    pub time_spent: i64,
    pub score: i32,
    pub max_score: i32,
    pub results: DrillResults,
    pub created_at: DateTime<Utc>,
}
