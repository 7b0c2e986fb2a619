use thiserror::Error;

use crate::models::attempt::{
    DefinitionResults, DrillResults, FillBlankResults, GrammarResults, ListeningResults,
    MatchingResults, RoleplayResults, SceneResult, SentenceResults, SummaryResults, TurnResult,
    VocabularyItemResult, VocabularyResults, WrittenSentence,
};
use crate::models::drill::{Drill, DrillContent, DrillType, TurnSpeaker};
use crate::models::review::ReviewStatus;

use super::oracle::{OracleError, PronunciationScorer};

/// Minimum oracle confidence to clear a gated stage.
pub const PASS_THRESHOLD: i32 = 65;

#[derive(Debug, Error)]
pub enum PracticeError {
    #[error("session has not been started")]
    NotStarted,

    #[error("session is already finished")]
    Finished,

    #[error("current stage does not accept this action")]
    WrongStage,

    #[error("a scoring call is in flight; wait for it to resolve")]
    ScoringInFlight,

    #[error("session is not ready to submit")]
    NotReadyToSubmit,

    #[error("roleplay scenes cannot be skipped")]
    SkipNotAllowed,

    #[error("item {0} is not reachable")]
    ItemUnreachable(usize),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Per-stage gate. `Scored` is the instant after the oracle resolves, before
/// the threshold decision routes back to `Attempting` or on to `Passed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Attempting,
    Scored,
    Passed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    InProgress,
    ReadyToSubmit,
    Submitted,
}

/// Recording and playback are mutually exclusive; starting one stops the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    Idle,
    Recording,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OracleState {
    Idle,
    Pending,
}

/// What the learner has to do at one stage of an item.
#[derive(Debug, Clone)]
pub enum StageTask {
    /// Speak the reference text; gated on the oracle's confidence.
    Pronounce { reference_text: String },
    /// System speaks; auto-advances once playback completes.
    ListenOnly { text: String },
    /// Write free text; grading is deferred to the review pipeline.
    WriteText { prompt: String },
    /// Objective non-speech answer; the client reports correct/incorrect.
    SelfCheck { prompt: String },
}

#[derive(Debug)]
pub struct Stage {
    pub task: StageTask,
    pub gate: GateState,
    pub attempts: u32,
    pub best_score: i32,
    entered_text: Option<String>,
}

impl Stage {
    fn new(task: StageTask) -> Self {
        Self {
            task,
            gate: GateState::Locked,
            attempts: 0,
            best_score: 0,
            entered_text: None,
        }
    }

    fn is_resolved(&self) -> bool {
        matches!(self.gate, GateState::Passed | GateState::Skipped)
    }
}

#[derive(Debug)]
pub struct PracticeItem {
    pub label: String,
    pub stages: Vec<Stage>,
}

impl PracticeItem {
    fn passed(&self) -> bool {
        self.stages.iter().all(|s| s.gate == GateState::Passed)
    }

    fn resolved(&self) -> bool {
        self.stages.iter().all(Stage::is_resolved)
    }

    fn total_attempts(&self) -> u32 {
        self.stages.iter().map(|s| s.attempts).sum()
    }

    /// The binding constraint across phases: both must clear the threshold,
    /// so the item's best is the weakest phase's best.
    fn binding_best_score(&self) -> i32 {
        self.stages
            .iter()
            .filter(|s| matches!(s.task, StageTask::Pronounce { .. }))
            .map(|s| s.best_score)
            .min()
            .unwrap_or(0)
    }
}

/// Proof that a scoring call was started against the current session state.
/// Navigating away bumps the generation, so a late oracle result carrying a
/// stale ticket is discarded instead of mutating the wrong stage.
#[derive(Debug, Clone, Copy)]
pub struct ScoringTicket {
    generation: u64,
    item: usize,
    stage: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutcome {
    Passed { score: i32 },
    Retry { score: i32 },
    /// The learner navigated away before the oracle resolved.
    Discarded,
}

#[derive(Debug)]
pub struct SubmissionOutcome {
    pub score: i32,
    pub results: DrillResults,
}

/// Client-session-scoped state machine driving a learner through a drill's
/// ordered items. Nothing here is persisted; abandoning the session simply
/// drops it, and only [`PracticeSession::submit`] produces data that crosses
/// into the attempt store.
pub struct PracticeSession {
    drill_type: DrillType,
    items: Vec<PracticeItem>,
    phase: SessionPhase,
    media: MediaState,
    oracle: OracleState,
    generation: u64,
    current_item: usize,
    current_stage: usize,
    pass_threshold: i32,
}

impl PracticeSession {
    pub fn new(drill: &Drill) -> Self {
        Self::with_threshold(drill, PASS_THRESHOLD)
    }

    pub fn with_threshold(drill: &Drill, pass_threshold: i32) -> Self {
        Self {
            drill_type: drill.drill_type,
            items: build_items(&drill.content),
            phase: SessionPhase::NotStarted,
            media: MediaState::Idle,
            oracle: OracleState::Idle,
            generation: 0,
            current_item: 0,
            current_stage: 0,
            pass_threshold,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn media(&self) -> MediaState {
        self.media
    }

    pub fn scoring_in_flight(&self) -> bool {
        self.oracle == OracleState::Pending
    }

    pub fn items(&self) -> &[PracticeItem] {
        &self.items
    }

    pub fn current_position(&self) -> (usize, usize) {
        (self.current_item, self.current_stage)
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.items
            .get(self.current_item)
            .and_then(|item| item.stages.get(self.current_stage))
    }

    pub fn start(&mut self) -> Result<(), PracticeError> {
        match self.phase {
            SessionPhase::NotStarted => {
                self.phase = SessionPhase::InProgress;
                if let Some(stage) = self.stage_mut(0, 0) {
                    stage.gate = GateState::Attempting;
                }
                Ok(())
            }
            _ => Err(PracticeError::Finished),
        }
    }

    /// Start capturing audio. Stops any in-flight playback.
    pub fn start_recording(&mut self) -> Result<(), PracticeError> {
        self.ensure_in_progress()?;
        self.ensure_oracle_idle()?;
        match self.current_stage().map(|s| (&s.task, s.gate)) {
            Some((StageTask::Pronounce { .. }, GateState::Attempting)) => {
                self.media = MediaState::Recording;
                Ok(())
            }
            _ => Err(PracticeError::WrongStage),
        }
    }

    /// Play reference audio or a system turn. Stops any in-flight recording.
    pub fn start_playback(&mut self) -> Result<(), PracticeError> {
        self.ensure_in_progress()?;
        self.ensure_oracle_idle()?;
        self.media = MediaState::Playing;
        Ok(())
    }

    /// Playback completed. A system turn that was waiting on playback passes
    /// and yields control to the next turn.
    pub fn playback_finished(&mut self) -> Result<(), PracticeError> {
        self.ensure_in_progress()?;
        self.media = MediaState::Idle;
        if let Some(stage) = self.stage_mut(self.current_item, self.current_stage) {
            if matches!(stage.task, StageTask::ListenOnly { .. })
                && stage.gate == GateState::Attempting
            {
                stage.gate = GateState::Passed;
                self.advance();
            }
        }
        Ok(())
    }

    /// Hand the recorded utterance to the oracle. While the returned ticket
    /// is unresolved every state-mutating control stays disabled.
    pub fn begin_scoring(&mut self) -> Result<ScoringTicket, PracticeError> {
        self.ensure_in_progress()?;
        self.ensure_oracle_idle()?;
        match self.current_stage().map(|s| (&s.task, s.gate)) {
            Some((StageTask::Pronounce { .. }, GateState::Attempting)) => {
                self.media = MediaState::Idle;
                self.oracle = OracleState::Pending;
                Ok(ScoringTicket {
                    generation: self.generation,
                    item: self.current_item,
                    stage: self.current_stage,
                })
            }
            _ => Err(PracticeError::WrongStage),
        }
    }

    /// The oracle resolved with a confidence number.
    pub fn apply_score(&mut self, ticket: ScoringTicket, score: i32) -> ScoreOutcome {
        self.oracle = OracleState::Idle;
        if ticket.generation != self.generation {
            return ScoreOutcome::Discarded;
        }

        let threshold = self.pass_threshold;
        let Some(stage) = self.stage_mut(ticket.item, ticket.stage) else {
            return ScoreOutcome::Discarded;
        };

        stage.attempts += 1;
        stage.best_score = stage.best_score.max(score);
        stage.gate = GateState::Scored;

        if score >= threshold {
            stage.gate = GateState::Passed;
            self.advance();
            ScoreOutcome::Passed { score }
        } else {
            // No retry cap; the learner may try again indefinitely.
            stage.gate = GateState::Attempting;
            ScoreOutcome::Retry { score }
        }
    }

    /// The oracle call failed in transport. The stage stays attemptable.
    pub fn scoring_failed(&mut self, _ticket: ScoringTicket) {
        self.oracle = OracleState::Idle;
    }

    /// Record, score, and apply in one step.
    pub async fn score_current(
        &mut self,
        scorer: &dyn PronunciationScorer,
        audio: &[u8],
    ) -> Result<ScoreOutcome, PracticeError> {
        let reference = match self.current_stage().map(|s| &s.task) {
            Some(StageTask::Pronounce { reference_text }) => reference_text.clone(),
            _ => return Err(PracticeError::WrongStage),
        };

        let ticket = self.begin_scoring()?;
        match scorer.score(&reference, audio).await {
            Ok(verdict) => Ok(self.apply_score(ticket, verdict.pronunciation)),
            Err(err) => {
                self.scoring_failed(ticket);
                Err(err.into())
            }
        }
    }

    /// Submit written text for a writing stage. Grading is deferred to the
    /// review pipeline, so any non-empty text passes the gate.
    pub fn submit_text(&mut self, text: &str) -> Result<(), PracticeError> {
        self.ensure_in_progress()?;
        self.ensure_oracle_idle()?;
        match self.stage_mut(self.current_item, self.current_stage) {
            Some(stage)
                if matches!(stage.task, StageTask::WriteText { .. })
                    && stage.gate == GateState::Attempting =>
            {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(PracticeError::WrongStage);
                }
                stage.attempts += 1;
                stage.entered_text = Some(trimmed.to_string());
                stage.gate = GateState::Passed;
                self.advance();
                Ok(())
            }
            _ => Err(PracticeError::WrongStage),
        }
    }

    /// Report an objective answer for a self-check stage. Incorrect answers
    /// keep the stage attemptable.
    pub fn submit_answer(&mut self, correct: bool) -> Result<ScoreOutcome, PracticeError> {
        self.ensure_in_progress()?;
        self.ensure_oracle_idle()?;
        match self.stage_mut(self.current_item, self.current_stage) {
            Some(stage)
                if matches!(stage.task, StageTask::SelfCheck { .. })
                    && stage.gate == GateState::Attempting =>
            {
                stage.attempts += 1;
                if correct {
                    stage.best_score = 100;
                    stage.gate = GateState::Passed;
                    self.advance();
                    Ok(ScoreOutcome::Passed { score: 100 })
                } else {
                    Ok(ScoreOutcome::Retry { score: 0 })
                }
            }
            _ => Err(PracticeError::WrongStage),
        }
    }

    /// Give up on the current item and move on. Roleplay disallows this:
    /// every learner turn must be passed before the session can be
    /// submitted.
    pub fn skip_item(&mut self) -> Result<(), PracticeError> {
        self.ensure_in_progress()?;
        self.ensure_oracle_idle()?;
        if self.drill_type == DrillType::Roleplay {
            return Err(PracticeError::SkipNotAllowed);
        }

        self.generation += 1;
        if let Some(item) = self.items.get_mut(self.current_item) {
            for stage in item.stages.iter_mut() {
                if !stage.is_resolved() {
                    stage.gate = GateState::Skipped;
                }
            }
        }
        self.advance();
        Ok(())
    }

    /// Navigate back to a previously reached item. Discards any in-flight
    /// oracle result.
    pub fn select_item(&mut self, index: usize) -> Result<(), PracticeError> {
        self.ensure_in_progress()?;
        let reachable = self
            .items
            .get(index)
            .is_some_and(|item| item.stages.first().is_some_and(|s| s.gate != GateState::Locked));
        if !reachable {
            return Err(PracticeError::ItemUnreachable(index));
        }

        self.generation += 1;
        self.oracle = OracleState::Idle;
        self.media = MediaState::Idle;
        self.current_item = index;
        self.current_stage = self.items[index]
            .stages
            .iter()
            .position(|s| !s.is_resolved())
            .unwrap_or(0);
        Ok(())
    }

    /// Drop the session. Nothing was persisted, nothing will be.
    pub fn abandon(self) {
        tracing::debug!("practice session abandoned before submission");
    }

    /// Close the session and produce the aggregated results payload.
    /// Objective drills self-grade from passed items; subjective drills
    /// submit a placeholder score and defer to the review pipeline.
    pub fn submit(&mut self) -> Result<SubmissionOutcome, PracticeError> {
        if self.phase != SessionPhase::ReadyToSubmit {
            return Err(PracticeError::NotReadyToSubmit);
        }
        self.phase = SessionPhase::Submitted;

        let results = self.build_results();
        let score = if self.drill_type.is_subjective() {
            0
        } else {
            let passed = self.items.iter().filter(|item| item.passed()).count();
            aggregate_score(passed, self.items.len())
        };

        Ok(SubmissionOutcome { score, results })
    }

    fn ensure_in_progress(&self) -> Result<(), PracticeError> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            SessionPhase::NotStarted => Err(PracticeError::NotStarted),
            _ => Err(PracticeError::Finished),
        }
    }

    fn ensure_oracle_idle(&self) -> Result<(), PracticeError> {
        if self.oracle == OracleState::Pending {
            return Err(PracticeError::ScoringInFlight);
        }
        Ok(())
    }

    fn stage_mut(&mut self, item: usize, stage: usize) -> Option<&mut Stage> {
        self.items.get_mut(item).and_then(|i| i.stages.get_mut(stage))
    }

    /// Unlock the next stage in order, or flip to ReadyToSubmit when every
    /// stage is resolved.
    fn advance(&mut self) {
        let mut item_idx = self.current_item;
        let mut stage_idx = self.current_stage + 1;

        loop {
            match self.items.get(item_idx) {
                Some(item) if stage_idx < item.stages.len() => {
                    // Step over stages that were already passed or skipped.
                    if item.stages[stage_idx].is_resolved() {
                        stage_idx += 1;
                        continue;
                    }
                    break;
                }
                Some(_) => {
                    item_idx += 1;
                    stage_idx = 0;
                }
                None => {
                    if self.items.iter().all(PracticeItem::resolved) {
                        self.phase = SessionPhase::ReadyToSubmit;
                    }
                    return;
                }
            }
        }

        self.current_item = item_idx;
        self.current_stage = stage_idx;
        let stage = &mut self.items[item_idx].stages[stage_idx];
        if stage.gate == GateState::Locked {
            stage.gate = GateState::Attempting;
        }
    }

    fn build_results(&self) -> DrillResults {
        match self.drill_type {
            DrillType::Vocabulary => DrillResults::Vocabulary(VocabularyResults {
                items: self
                    .items
                    .iter()
                    .map(|item| VocabularyItemResult {
                        word: item.label.clone(),
                        attempts: item.total_attempts(),
                        best_score: item.binding_best_score(),
                        passed: item.passed(),
                    })
                    .collect(),
            }),
            DrillType::Roleplay => DrillResults::Roleplay(RoleplayResults {
                scenes: self
                    .items
                    .iter()
                    .map(|item| SceneResult {
                        title: item.label.clone(),
                        learner_turns: item
                            .stages
                            .iter()
                            .filter_map(|stage| match &stage.task {
                                StageTask::Pronounce { reference_text } => Some(TurnResult {
                                    text: reference_text.clone(),
                                    attempts: stage.attempts,
                                    best_score: stage.best_score,
                                    passed: stage.gate == GateState::Passed,
                                }),
                                _ => None,
                            })
                            .collect(),
                    })
                    .collect(),
            }),
            DrillType::Matching => DrillResults::Matching(MatchingResults {
                correct_pairs: self.passed_item_count(),
                total_pairs: self.items.len() as u32,
            }),
            DrillType::Definition => DrillResults::Definition(DefinitionResults {
                correct_count: self.passed_item_count(),
                total_count: self.items.len() as u32,
            }),
            DrillType::Listening => DrillResults::Listening(ListeningResults {
                correct_count: self.passed_item_count(),
                total_count: self.items.len() as u32,
            }),
            DrillType::FillBlank => DrillResults::FillBlank(FillBlankResults {
                correct_count: self.passed_item_count(),
                total_count: self.items.len() as u32,
            }),
            DrillType::Grammar => DrillResults::Grammar(GrammarResults {
                sentences: self.written_sentences(),
                review_status: ReviewStatus::Pending,
                reviews: vec![],
            }),
            DrillType::SentenceWriting => DrillResults::Sentence(SentenceResults {
                sentences: self.written_sentences(),
                review_status: ReviewStatus::Pending,
                reviews: vec![],
            }),
            DrillType::Summary => DrillResults::Summary(SummaryResults {
                summary_text: self
                    .items
                    .iter()
                    .flat_map(|item| item.stages.iter())
                    .find_map(|stage| stage.entered_text.clone())
                    .unwrap_or_default(),
                review_status: ReviewStatus::Pending,
                review: None,
            }),
        }
    }

    fn passed_item_count(&self) -> u32 {
        self.items.iter().filter(|item| item.passed()).count() as u32
    }

    fn written_sentences(&self) -> Vec<WrittenSentence> {
        self.items
            .iter()
            .flat_map(|item| item.stages.iter())
            .filter_map(|stage| match &stage.task {
                StageTask::WriteText { prompt } => Some(WrittenSentence {
                    prompt: prompt.clone(),
                    sentence: stage.entered_text.clone().unwrap_or_default(),
                }),
                _ => None,
            })
            .collect()
    }
}

fn aggregate_score(passed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    (100.0 * passed as f64 / total as f64).round() as i32
}

fn build_items(content: &DrillContent) -> Vec<PracticeItem> {
    match content {
        DrillContent::Vocabulary { items } => items
            .iter()
            .map(|entry| {
                let mut stages = vec![Stage::new(StageTask::Pronounce {
                    reference_text: entry.word.clone(),
                })];
                // The sentence phase stays locked until the word phase passes.
                if let Some(sentence) = &entry.sentence {
                    stages.push(Stage::new(StageTask::Pronounce {
                        reference_text: sentence.clone(),
                    }));
                }
                PracticeItem {
                    label: entry.word.clone(),
                    stages,
                }
            })
            .collect(),
        DrillContent::Roleplay { scenes } => scenes
            .iter()
            .map(|scene| PracticeItem {
                label: scene.title.clone(),
                stages: scene
                    .turns
                    .iter()
                    .map(|turn| {
                        Stage::new(match turn.speaker {
                            TurnSpeaker::System => StageTask::ListenOnly {
                                text: turn.text.clone(),
                            },
                            TurnSpeaker::Learner => StageTask::Pronounce {
                                reference_text: turn.text.clone(),
                            },
                        })
                    })
                    .collect(),
            })
            .collect(),
        DrillContent::Matching { pairs } => pairs
            .iter()
            .map(|pair| PracticeItem {
                label: pair.left.clone(),
                stages: vec![Stage::new(StageTask::SelfCheck {
                    prompt: pair.left.clone(),
                })],
            })
            .collect(),
        DrillContent::Definition { items } => items
            .iter()
            .map(|item| PracticeItem {
                label: item.term.clone(),
                stages: vec![Stage::new(StageTask::SelfCheck {
                    prompt: item.term.clone(),
                })],
            })
            .collect(),
        DrillContent::Listening { items } => items
            .iter()
            .map(|item| PracticeItem {
                label: item.transcript.clone(),
                stages: vec![Stage::new(StageTask::SelfCheck {
                    prompt: item.transcript.clone(),
                })],
            })
            .collect(),
        DrillContent::FillBlank { items } => items
            .iter()
            .map(|item| PracticeItem {
                label: item.sentence.clone(),
                stages: vec![Stage::new(StageTask::SelfCheck {
                    prompt: item.sentence.clone(),
                })],
            })
            .collect(),
        DrillContent::Grammar { patterns } => patterns
            .iter()
            .map(|pattern| PracticeItem {
                label: pattern.pattern.clone(),
                stages: (0..pattern.sentence_count.max(1))
                    .map(|_| {
                        Stage::new(StageTask::WriteText {
                            prompt: pattern.pattern.clone(),
                        })
                    })
                    .collect(),
            })
            .collect(),
        DrillContent::SentenceWriting { prompts } => prompts
            .iter()
            .map(|prompt| PracticeItem {
                label: prompt.word.clone(),
                stages: vec![Stage::new(StageTask::WriteText {
                    prompt: prompt.word.clone(),
                })],
            })
            .collect(),
        DrillContent::Summary { passage } => vec![PracticeItem {
            label: "summary".to_string(),
            stages: vec![Stage::new(StageTask::WriteText {
                prompt: passage
                    .guidance
                    .clone()
                    .unwrap_or_else(|| "Summarize the passage".to_string()),
            })],
        }],
    }
}
