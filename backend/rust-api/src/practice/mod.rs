//! Client-session practice flow: the gated progression machine and the
//! pronunciation oracle it scores against. Sessions live entirely in memory;
//! only a submitted session's results ever reach the attempt store.

pub mod oracle;
pub mod session;

pub use oracle::{HttpPronunciationScorer, OracleError, PronunciationScore, PronunciationScorer};
pub use session::{
    GateState, MediaState, PracticeError, PracticeSession, ScoreOutcome, ScoringTicket,
    SessionPhase, StageTask, SubmissionOutcome, PASS_THRESHOLD,
};
