use std::sync::Arc;

use chrono::Utc;

use crate::error::EngineError;
use crate::metrics::REVIEWS_COMPLETED_TOTAL;
use crate::models::attempt::{Attempt, DrillResults};
use crate::models::review::{
    review_score, ReviewStatus, SentenceJudgment, SentenceReview, SummaryJudgment, SummaryReview,
};
use crate::models::DrillType;
use crate::services::notification_service::{Notification, NotificationKind, Notifier};
use crate::store::{EngineStore, UserDirectory};

/// Converts pending subjective submissions into scored, reviewed records.
///
/// Review is a one-shot holistic judgment: the score is recomputed from
/// scratch on every call and an already-reviewed attempt refuses a second
/// review instead of silently overwriting.
pub struct ReviewService {
    store: Arc<dyn EngineStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<Notifier>,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn EngineStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
        }
    }

    pub async fn review_sentence(
        &self,
        attempt_id: &str,
        reviewer_id: &str,
        judgments: Vec<SentenceJudgment>,
    ) -> Result<Attempt, EngineError> {
        let mut attempt = self
            .fetch_for_review(attempt_id, DrillType::SentenceWriting)
            .await?;

        let (score, all_correct) = match &mut attempt.results {
            DrillResults::Sentence(results) => {
                ensure_pending(results.review_status)?;
                ensure_counts_match(judgments.len(), results.sentences.len())?;
                let (reviews, score, all_correct) = judge_sentences(&judgments, reviewer_id);
                results.reviews = reviews;
                results.review_status = ReviewStatus::Reviewed;
                (score, all_correct)
            }
            _ => return Err(missing_payload(attempt_id, DrillType::SentenceWriting)),
        };

        self.finish_review(attempt, score, all_correct).await
    }

    pub async fn review_grammar(
        &self,
        attempt_id: &str,
        reviewer_id: &str,
        judgments: Vec<SentenceJudgment>,
    ) -> Result<Attempt, EngineError> {
        let mut attempt = self
            .fetch_for_review(attempt_id, DrillType::Grammar)
            .await?;

        let (score, all_correct) = match &mut attempt.results {
            DrillResults::Grammar(results) => {
                ensure_pending(results.review_status)?;
                ensure_counts_match(judgments.len(), results.sentences.len())?;
                let (reviews, score, all_correct) = judge_sentences(&judgments, reviewer_id);
                results.reviews = reviews;
                results.review_status = ReviewStatus::Reviewed;
                (score, all_correct)
            }
            _ => return Err(missing_payload(attempt_id, DrillType::Grammar)),
        };

        self.finish_review(attempt, score, all_correct).await
    }

    pub async fn review_summary(
        &self,
        attempt_id: &str,
        reviewer_id: &str,
        judgment: SummaryJudgment,
    ) -> Result<Attempt, EngineError> {
        let mut attempt = self
            .fetch_for_review(attempt_id, DrillType::Summary)
            .await?;

        let (score, all_correct) = match &mut attempt.results {
            DrillResults::Summary(results) => {
                ensure_pending(results.review_status)?;
                let acceptable = judgment.is_acceptable;
                results.review = Some(SummaryReview {
                    feedback: judgment.feedback,
                    is_acceptable: acceptable,
                    // Corrections only make sense for rejected summaries.
                    corrected_version: if acceptable {
                        None
                    } else {
                        judgment.corrected_version
                    },
                    reviewed_at: Utc::now(),
                    reviewed_by: reviewer_id.to_string(),
                });
                results.review_status = ReviewStatus::Reviewed;
                (if acceptable { 100 } else { 0 }, acceptable)
            }
            _ => return Err(missing_payload(attempt_id, DrillType::Summary)),
        };

        self.finish_review(attempt, score, all_correct).await
    }

    /// Fetch the attempt and verify it matches the endpoint's expected drill
    /// type. A grammar-review call pointed at a non-grammar attempt is a
    /// reviewer-UI bug surfaced as a Validation error.
    async fn fetch_for_review(
        &self,
        attempt_id: &str,
        expected: DrillType,
    ) -> Result<Attempt, EngineError> {
        let attempt = self
            .store
            .get_attempt(attempt_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("attempt {}", attempt_id)))?;

        if attempt.drill_type != expected {
            return Err(EngineError::validation(format!(
                "attempt {} is a {} attempt, not {}",
                attempt_id,
                attempt.drill_type.as_str(),
                expected.as_str()
            )));
        }
        Ok(attempt)
    }

    /// Persist the reviewed attempt with its recomputed score, then notify
    /// the learner over every channel. The write is conditional on the
    /// stored status still being pending; `ensure_pending` on the fetched
    /// copy is only a fast path and cannot exclude a concurrent reviewer.
    async fn finish_review(
        &self,
        mut attempt: Attempt,
        score: i32,
        all_correct: bool,
    ) -> Result<Attempt, EngineError> {
        attempt.score = score;
        if !self.store.mark_reviewed(&attempt).await? {
            return Err(EngineError::validation("attempt is already reviewed"));
        }

        REVIEWS_COMPLETED_TOTAL
            .with_label_values(&[attempt.drill_type.as_str()])
            .inc();

        match self.directory.find_by_id(&attempt.learner_id).await {
            Ok(Some(learner)) => {
                self.notifier.dispatch(Notification {
                    kind: NotificationKind::Reviewed,
                    recipient_id: learner.id.clone(),
                    recipient_email: learner.email.clone(),
                    recipient_name: learner.full_name(),
                    subject: "Your submission has been reviewed".to_string(),
                    body: format!("Your submission was reviewed. Score: {}.", score),
                    payload: serde_json::json!({
                        "attemptId": attempt.id,
                        "score": score,
                        "allCorrect": all_correct,
                    }),
                });
            }
            Ok(None) => {
                tracing::warn!(
                    "learner {} not found, skipping review notification",
                    attempt.learner_id
                );
            }
            Err(err) => {
                tracing::error!(
                    "failed to look up learner {} for review notification: {}",
                    attempt.learner_id,
                    err
                );
            }
        }

        Ok(attempt)
    }
}

fn ensure_pending(status: ReviewStatus) -> Result<(), EngineError> {
    if status == ReviewStatus::Reviewed {
        return Err(EngineError::validation("attempt is already reviewed"));
    }
    Ok(())
}

fn ensure_counts_match(judgments: usize, sentences: usize) -> Result<(), EngineError> {
    if judgments != sentences {
        return Err(EngineError::validation(format!(
            "expected {} judgments, got {}",
            sentences, judgments
        )));
    }
    Ok(())
}

fn missing_payload(attempt_id: &str, expected: DrillType) -> EngineError {
    EngineError::validation(format!(
        "attempt {} does not carry a {} results payload",
        attempt_id,
        expected.as_str()
    ))
}

/// Turn reviewer judgments into persisted review entries and the recomputed
/// score. Corrections supplied alongside a correct verdict are dropped.
fn judge_sentences(
    judgments: &[SentenceJudgment],
    reviewer_id: &str,
) -> (Vec<SentenceReview>, i32, bool) {
    let now = Utc::now();
    let reviews: Vec<SentenceReview> = judgments
        .iter()
        .enumerate()
        .map(|(index, judgment)| SentenceReview {
            index,
            is_correct: judgment.is_correct,
            corrected_text: if judgment.is_correct {
                None
            } else {
                judgment.corrected_text.clone()
            },
            reviewed_at: now,
            reviewed_by: reviewer_id.to_string(),
        })
        .collect();

    let correct = reviews.iter().filter(|r| r.is_correct).count();
    let score = review_score(correct, reviews.len());
    let all_correct = correct == reviews.len();
    (reviews, score, all_correct)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judgment(is_correct: bool, correction: Option<&str>) -> SentenceJudgment {
        SentenceJudgment {
            is_correct,
            corrected_text: correction.map(str::to_string),
        }
    }

    #[test]
    fn judgments_score_and_drop_spurious_corrections() {
        let (reviews, score, all_correct) = judge_sentences(
            &[
                judgment(true, Some("should be dropped")),
                judgment(false, Some("the corrected one")),
                judgment(true, None),
            ],
            "rev-1",
        );

        assert_eq!(score, 67);
        assert!(!all_correct);
        assert_eq!(reviews[0].corrected_text, None);
        assert_eq!(
            reviews[1].corrected_text.as_deref(),
            Some("the corrected one")
        );
        assert_eq!(reviews[1].index, 1);
        assert_eq!(reviews[2].corrected_text, None);
    }

    #[test]
    fn all_correct_judgments() {
        let (_, score, all_correct) =
            judge_sentences(&[judgment(true, None), judgment(true, None)], "rev-1");
        assert_eq!(score, 100);
        assert!(all_correct);
    }

    #[test]
    fn pending_guard() {
        assert!(ensure_pending(ReviewStatus::Pending).is_ok());
        assert!(ensure_pending(ReviewStatus::Reviewed).is_err());
    }
}
