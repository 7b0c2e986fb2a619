use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exercise kind. Determines both the content payload shape and which results
/// payload an attempt must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillType {
    Vocabulary,
    Roleplay,
    Matching,
    Definition,
    Grammar,
    SentenceWriting,
    Summary,
    Listening,
    FillBlank,
}

impl DrillType {
    /// Subjective drill types go through the review pipeline; objective ones
    /// self-grade during practice.
    pub fn is_subjective(&self) -> bool {
        matches!(
            self,
            DrillType::Grammar | DrillType::SentenceWriting | DrillType::Summary
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DrillType::Vocabulary => "vocabulary",
            DrillType::Roleplay => "roleplay",
            DrillType::Matching => "matching",
            DrillType::Definition => "definition",
            DrillType::Grammar => "grammar",
            DrillType::SentenceWriting => "sentence_writing",
            DrillType::Summary => "summary",
            DrillType::Listening => "listening",
            DrillType::FillBlank => "fill_blank",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// One vocabulary entry. When `sentence` is present the practice machine runs
/// a second gated phase for it after the word itself is passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyItem {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnSpeaker {
    System,
    Learner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueTurn {
    pub speaker: TurnSpeaker,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleplayScene {
    pub title: String,
    pub turns: Vec<DialogueTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionItem {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarPattern {
    pub pattern: String,
    /// How many sentences the learner must write for this pattern.
    pub sentence_count: u32,
    #[serde(default)]
    pub example_sentences: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentencePrompt {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPassage {
    pub passage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListeningItem {
    pub audio_url: String,
    pub transcript: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBlankItem {
    pub sentence: String,
    pub answer: String,
}

/// Type-specific drill content. Exactly one shape per drill; the tag must
/// agree with [`Drill::drill_type`], checked at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrillContent {
    Vocabulary { items: Vec<VocabularyItem> },
    Roleplay { scenes: Vec<RoleplayScene> },
    Matching { pairs: Vec<MatchingPair> },
    Definition { items: Vec<DefinitionItem> },
    Grammar { patterns: Vec<GrammarPattern> },
    SentenceWriting { prompts: Vec<SentencePrompt> },
    Summary { passage: SummaryPassage },
    Listening { items: Vec<ListeningItem> },
    FillBlank { items: Vec<FillBlankItem> },
}

impl DrillContent {
    pub fn drill_type(&self) -> DrillType {
        match self {
            DrillContent::Vocabulary { .. } => DrillType::Vocabulary,
            DrillContent::Roleplay { .. } => DrillType::Roleplay,
            DrillContent::Matching { .. } => DrillType::Matching,
            DrillContent::Definition { .. } => DrillType::Definition,
            DrillContent::Grammar { .. } => DrillType::Grammar,
            DrillContent::SentenceWriting { .. } => DrillType::SentenceWriting,
            DrillContent::Summary { .. } => DrillType::Summary,
            DrillContent::Listening { .. } => DrillType::Listening,
            DrillContent::FillBlank { .. } => DrillType::FillBlank,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DrillContent::Vocabulary { items } => items.is_empty(),
            DrillContent::Roleplay { scenes } => scenes.is_empty(),
            DrillContent::Matching { pairs } => pairs.is_empty(),
            DrillContent::Definition { items } => items.is_empty(),
            DrillContent::Grammar { patterns } => patterns.is_empty(),
            DrillContent::SentenceWriting { prompts } => prompts.is_empty(),
            DrillContent::Summary { passage } => passage.passage.is_empty(),
            DrillContent::Listening { items } => items.is_empty(),
            DrillContent::FillBlank { items } => items.is_empty(),
        }
    }
}

/// Immutable-per-version exercise template. Corrective edits may fan out new
/// assignments for newly added learners but never duplicate existing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drill {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub drill_type: DrillType,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub duration_days: i64,
    pub content: DrillContent,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Opaque reference to a drill. Upstream callers sometimes send the bare id
/// and sometimes the populated object; both collapse through [`DrillRef::resolve`]
/// at the storage-access boundary so only one representation reaches the
/// business logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DrillRef {
    Id(String),
    Populated {
        #[serde(rename = "_id", alias = "id")]
        id: String,
    },
}

impl DrillRef {
    pub fn resolve(&self) -> &str {
        match self {
            DrillRef::Id(id) => id,
            DrillRef::Populated { id } => id,
        }
    }
}

impl From<&str> for DrillRef {
    fn from(id: &str) -> Self {
        DrillRef::Id(id.to_string())
    }
}

impl PartialEq for DrillRef {
    fn eq(&self, other: &Self) -> bool {
        self.resolve() == other.resolve()
    }
}
