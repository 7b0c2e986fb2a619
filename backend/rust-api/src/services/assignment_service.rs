use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::EngineError;
use crate::metrics::ASSIGNMENTS_TOTAL;
use crate::models::drill::{Drill, DrillContent, DrillRef};
use crate::models::{Assignment, AssignmentStatus, UserRole};
use crate::services::notification_service::{Notification, NotificationKind, Notifier};
use crate::store::{AssignmentInsert, EngineStore, UserDirectory};

/// Outcome of a bulk assignment call. Skips and storage-level duplicate
/// conflicts are reported identically; the caller cares about totals, not
/// per-row diagnostics.
#[derive(Debug)]
pub struct BulkAssignOutcome {
    pub created: Vec<Assignment>,
    pub skipped: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct CreatedDrill {
    pub drill: Drill,
    pub assignment_count: usize,
}

pub struct NewDrill {
    pub title: String,
    pub difficulty: crate::models::drill::Difficulty,
    pub due_date: Option<DateTime<Utc>>,
    pub duration_days: i64,
    pub content: DrillContent,
}

/// Owns the assignment ledger: the mapping of `(drill, learner)` pairs to
/// lifecycle status.
pub struct AssignmentService {
    store: Arc<dyn EngineStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<Notifier>,
}

impl AssignmentService {
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

    /// Fan a drill out to many learners, at most one assignment per pair.
    ///
    /// Learners already holding an assignment are skipped and counted, never
    /// errors. Inserts are best-effort: rows that fail at the store are
    /// logged and excluded from `created`, the rest are kept. Duplicate-key
    /// conflicts from concurrent calls count as skipped.
    pub async fn assign_bulk(
        &self,
        drill_id: &str,
        learner_ids: &[String],
        assigned_by: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<BulkAssignOutcome, EngineError> {
        if learner_ids.is_empty() {
            return Err(EngineError::validation("learner list must not be empty"));
        }

        let drill = self
            .store
            .get_drill(drill_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("drill {}", drill_id)))?;

        // A learner named twice in one request is one assignment; the extra
        // mention counts as skipped.
        let assignees = dedupe_preserving_order(learner_ids);
        let repeat_mentions = learner_ids.len() - assignees.len();
        let learners = self.verified_learners(&assignees).await?;

        let due_date = resolve_due_date(due_date, &drill);

        // One existence query across all candidates. This is an optimization
        // only; the unique index catches whatever races past it.
        let already: HashSet<String> = self
            .store
            .find_assigned_learners(drill_id, &assignees)
            .await?
            .into_iter()
            .collect();

        let mut created = Vec::new();
        let mut skipped = already.len() + repeat_mentions;

        for learner in learners
            .iter()
            .filter(|learner| !already.contains(&learner.id))
        {
            let assignment = Assignment {
                id: Uuid::new_v4().to_string(),
                drill_id: DrillRef::Id(drill_id.to_string()),
                learner_id: learner.id.clone(),
                assigned_by: assigned_by.to_string(),
                assigned_at: Utc::now(),
                due_date,
                status: AssignmentStatus::Pending,
                completed_at: None,
            };

            match self.store.insert_assignment(&assignment).await {
                Ok(AssignmentInsert::Created) => {
                    ASSIGNMENTS_TOTAL.with_label_values(&["created"]).inc();
                    self.notifier.dispatch(Notification {
                        kind: NotificationKind::Assigned,
                        recipient_id: learner.id.clone(),
                        recipient_email: learner.email.clone(),
                        recipient_name: learner.full_name(),
                        subject: format!("New drill assigned: {}", drill.title),
                        body: format!(
                            "You have been assigned \"{}\", due {}.",
                            drill.title,
                            due_date.format("%Y-%m-%d")
                        ),
                        payload: serde_json::json!({
                            "drillId": drill_id,
                            "assignmentId": assignment.id,
                            "dueDate": due_date,
                        }),
                    });
                    created.push(assignment);
                }
                Ok(AssignmentInsert::Duplicate) => {
                    ASSIGNMENTS_TOTAL.with_label_values(&["skipped"]).inc();
                    skipped += 1;
                }
                Err(err) => {
                    // Best-effort: keep what was inserted, do not retry.
                    tracing::error!(
                        "failed to insert assignment for learner {} on drill {}: {}",
                        learner.id,
                        drill_id,
                        err
                    );
                }
            }
        }

        ASSIGNMENTS_TOTAL
            .with_label_values(&["skipped"])
            .inc_by((already.len() + repeat_mentions) as u64);

        tracing::info!(
            "bulk assign on drill {}: created={}, skipped={}, total={}",
            drill_id,
            created.len(),
            skipped,
            learner_ids.len()
        );

        Ok(BulkAssignOutcome {
            created,
            skipped,
            total: learner_ids.len(),
        })
    }

    /// Resolve the candidate ids against the user directory. Unknown ids and
    /// non-learners fail the whole call, naming the offenders.
    async fn verified_learners(
        &self,
        learner_ids: &[String],
    ) -> Result<Vec<crate::models::User>, EngineError> {
        let learners = self
            .directory
            .find_many_with_role(learner_ids, UserRole::Learner)
            .await?;
        if learners.len() != learner_ids.len() {
            let known: HashSet<&str> = learners.iter().map(|u| u.id.as_str()).collect();
            let missing: Vec<&str> = learner_ids
                .iter()
                .map(String::as_str)
                .filter(|id| !known.contains(id))
                .collect();
            return Err(EngineError::validation(format!(
                "not learners or unknown users: {}",
                missing.join(", ")
            )));
        }
        Ok(learners)
    }

    /// Create a drill and immediately assign it. The content payload must
    /// match the declared drill type and must not be empty. All validation,
    /// including the assignee check, runs before the drill is persisted so a
    /// rejected call leaves no state behind.
    pub async fn create_drill_with_assignments(
        &self,
        data: NewDrill,
        creator_id: &str,
        learner_ids: &[String],
    ) -> Result<CreatedDrill, EngineError> {
        if data.content.is_empty() {
            return Err(EngineError::validation("drill content must not be empty"));
        }
        if data.duration_days <= 0 && data.due_date.is_none() {
            return Err(EngineError::validation(
                "either a due date or a positive duration is required",
            ));
        }
        if !learner_ids.is_empty() {
            self.verified_learners(&dedupe_preserving_order(learner_ids))
                .await?;
        }

        let drill = Drill {
            id: Uuid::new_v4().to_string(),
            title: data.title,
            drill_type: data.content.drill_type(),
            difficulty: data.difficulty,
            due_date: data.due_date,
            duration_days: data.duration_days,
            content: data.content,
            created_by: creator_id.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_drill(&drill).await?;

        let assignment_count = if learner_ids.is_empty() {
            0
        } else {
            self.assign_bulk(&drill.id, learner_ids, creator_id, None)
                .await?
                .created
                .len()
        };

        Ok(CreatedDrill {
            drill,
            assignment_count,
        })
    }

    /// Manual status transition. `Completed` is reserved for the drill
    /// completion path; everything else (in-progress, overdue, skipped) may
    /// be set by callers such as a due-date sweeper.
    pub async fn update_status(
        &self,
        assignment_id: &str,
        status: AssignmentStatus,
    ) -> Result<Assignment, EngineError> {
        if status == AssignmentStatus::Completed {
            return Err(EngineError::validation(
                "completed is set by drill completion, not by status updates",
            ));
        }

        self.store
            .update_assignment_status(assignment_id, status, None)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("assignment {}", assignment_id)))
    }
}

/// Explicit date wins, then the drill's own due date, then assignment time
/// plus the drill's duration.
fn resolve_due_date(explicit: Option<DateTime<Utc>>, drill: &Drill) -> DateTime<Utc> {
    explicit
        .or(drill.due_date)
        .unwrap_or_else(|| Utc::now() + Duration::days(drill.duration_days))
}

/// First mention of each id wins. The Mongo directory answers `$in` queries
/// with one document per id, so duplicates must be collapsed before the
/// count-based role check.
fn dedupe_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
