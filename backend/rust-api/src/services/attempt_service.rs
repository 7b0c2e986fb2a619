use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::EngineError;
use crate::metrics::ATTEMPTS_COMPLETED_TOTAL;
use crate::models::{
    Assignment, AssignmentStatus, Attempt, DrillResults, DrillRef, DrillType, ReviewFilter,
};
use crate::services::notification_service::{Notification, NotificationKind, Notifier};
use crate::store::{EngineStore, UserDirectory};

#[derive(Debug)]
pub struct ReviewQueuePage {
    pub attempts: Vec<Attempt>,
    pub total: u64,
}

/// Records completed attempts and flips assignments to completed. The only
/// code path allowed to set [`AssignmentStatus::Completed`].
pub struct AttemptService {
    store: Arc<dyn EngineStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<Notifier>,
}

impl AttemptService {
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

    /// Record a finished practice session as an attempt.
    ///
    /// Validation happens up front and aborts the whole call without side
    /// effects: drill and assignment must exist, the assignment must belong
    /// to the calling learner, and the resolved drill ids must agree. The
    /// completion notification at the end is best-effort; the assignment
    /// transition has already committed by the time it is dispatched.
    pub async fn complete_drill(
        &self,
        drill_ref: &DrillRef,
        assignment_id: &str,
        learner_id: &str,
        score: i32,
        time_spent: i64,
        results: DrillResults,
    ) -> Result<Attempt, EngineError> {
        let drill_id = drill_ref.resolve();

        let drill = self
            .store
            .get_drill(drill_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("drill {}", drill_id)))?;

        let assignment = self
            .store
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("assignment {}", assignment_id)))?;

        if assignment.learner_id != learner_id {
            // A guessed assignment id must not let one learner complete
            // another learner's work.
            return Err(EngineError::forbidden(
                "assignment does not belong to this learner",
            ));
        }

        // Compare resolved ids; the stored reference may be populated or raw.
        let assignment_drill_id = assignment.drill_id.resolve();
        if assignment_drill_id != drill_id {
            return Err(EngineError::validation(format!(
                "assignment {} is for drill {}, not {}",
                assignment_id, assignment_drill_id, drill_id
            )));
        }

        if results.drill_type() != drill.drill_type {
            return Err(EngineError::validation(format!(
                "results payload is for {} but drill {} is {}",
                results.drill_type().as_str(),
                drill_id,
                drill.drill_type.as_str()
            )));
        }

        let now = Utc::now();
        let attempt = Attempt {
            id: Uuid::new_v4().to_string(),
            assignment_id: assignment_id.to_string(),
            learner_id: learner_id.to_string(),
            drill_id: drill_id.to_string(),
            drill_type: drill.drill_type,
            started_at: now - Duration::seconds(time_spent.max(0)),
            completed_at: now,
            time_spent,
            score,
            max_score: 100,
            results,
            created_at: now,
        };
        self.store.insert_attempt(&attempt).await?;

        let completed = self
            .store
            .update_assignment_status(
                assignment_id,
                AssignmentStatus::Completed,
                Some(attempt.completed_at),
            )
            .await?
            .ok_or_else(|| EngineError::not_found(format!("assignment {}", assignment_id)))?;

        ATTEMPTS_COMPLETED_TOTAL
            .with_label_values(&[drill.drill_type.as_str()])
            .inc();

        self.notify_assigner(&drill.title, &completed, &attempt).await;

        Ok(attempt)
    }

    /// Completion notification to whoever assigned the drill. Failures are
    /// logged only; the attempt and the status transition stand regardless.
    async fn notify_assigner(&self, drill_title: &str, assignment: &Assignment, attempt: &Attempt) {
        let assigner = match self.directory.find_by_id(&assignment.assigned_by).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(
                    "assigner {} not found, skipping completion notification",
                    assignment.assigned_by
                );
                return;
            }
            Err(err) => {
                tracing::error!(
                    "failed to look up assigner {} for completion notification: {}",
                    assignment.assigned_by,
                    err
                );
                return;
            }
        };

        self.notifier.dispatch(Notification {
            kind: NotificationKind::Completed,
            recipient_id: assigner.id.clone(),
            recipient_email: assigner.email.clone(),
            recipient_name: assigner.full_name(),
            subject: format!("Drill completed: {}", drill_title),
            body: format!(
                "Learner {} completed \"{}\" with score {}.",
                attempt.learner_id, drill_title, attempt.score
            ),
            payload: serde_json::json!({
                "attemptId": attempt.id,
                "assignmentId": attempt.assignment_id,
                "score": attempt.score,
            }),
        });
    }

    /// Most recent attempt on an assignment, by `(completed_at, created_at)`.
    pub async fn latest_attempt(&self, assignment_id: &str) -> Result<Attempt, EngineError> {
        self.store
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("assignment {}", assignment_id)))?;

        self.store
            .latest_attempt_for_assignment(assignment_id)
            .await?
            .ok_or_else(|| {
                EngineError::not_found(format!("attempt for assignment {}", assignment_id))
            })
    }

    /// Reviewer work queue for one subjective drill type.
    pub async fn list_submissions_for_review(
        &self,
        drill_type: DrillType,
        filter: ReviewFilter,
        page: u64,
        per_page: u64,
    ) -> Result<ReviewQueuePage, EngineError> {
        if !drill_type.is_subjective() {
            return Err(EngineError::validation(format!(
                "{} drills are not reviewed",
                drill_type.as_str()
            )));
        }
        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);

        let (attempts, total) = self
            .store
            .list_attempts_for_review(drill_type, filter, page, per_page)
            .await?;
        Ok(ReviewQueuePage { attempts, total })
    }
}
