use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::models::drill::DrillRef;
use crate::models::{
    Assignment, AssignmentStatus, Attempt, Drill, DrillType, ReviewFilter, ReviewStatus, User,
    UserRole,
};

use super::{AssignmentInsert, EngineStore, UserDirectory};

#[derive(Default)]
struct Inner {
    drills: HashMap<String, Drill>,
    assignments: HashMap<String, Assignment>,
    /// Mirrors the unique index on `(drill_id, learner_id)`.
    assignment_pairs: HashSet<(String, String)>,
    attempts: HashMap<String, Attempt>,
    users: HashMap<String, User>,
}

/// In-memory store implementing the same contracts as [`super::MongoStore`],
/// including the `(drill, learner)` uniqueness guarantee. Used by the test
/// suite and handy for local development without a database.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, user: User) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.users.insert(user.id.clone(), user);
    }

    pub fn seed_drill(&self, drill: Drill) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.drills.insert(drill.id.clone(), drill);
    }

    pub fn drill_count(&self) -> usize {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.drills.len()
    }

    pub fn assignment_count(&self) -> usize {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.assignments.len()
    }

    pub fn attempt_count(&self) -> usize {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.attempts.len()
    }
}

#[async_trait]
impl EngineStore for MemoryStore {
    async fn ping(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn insert_drill(&self, drill: &Drill) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.drills.insert(drill.id.clone(), drill.clone());
        Ok(())
    }

    async fn get_drill(&self, id: &str) -> Result<Option<Drill>, EngineError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.drills.get(id).cloned())
    }

    async fn find_assigned_learners(
        &self,
        drill_id: &str,
        learner_ids: &[String],
    ) -> Result<Vec<String>, EngineError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(learner_ids
            .iter()
            .filter(|learner| {
                inner
                    .assignment_pairs
                    .contains(&(drill_id.to_string(), (*learner).clone()))
            })
            .cloned()
            .collect())
    }

    async fn insert_assignment(
        &self,
        assignment: &Assignment,
    ) -> Result<AssignmentInsert, EngineError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let pair = (
            assignment.drill_id.resolve().to_string(),
            assignment.learner_id.clone(),
        );
        if !inner.assignment_pairs.insert(pair) {
            return Ok(AssignmentInsert::Duplicate);
        }

        let mut stored = assignment.clone();
        // Normalize the reference at the storage boundary.
        stored.drill_id = DrillRef::Id(assignment.drill_id.resolve().to_string());
        inner.assignments.insert(stored.id.clone(), stored);
        Ok(AssignmentInsert::Created)
    }

    async fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, EngineError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.assignments.get(id).cloned())
    }

    async fn update_assignment_status(
        &self,
        id: &str,
        status: AssignmentStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Assignment>, EngineError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let Some(assignment) = inner.assignments.get_mut(id) else {
            return Ok(None);
        };
        assignment.status = status;
        if completed_at.is_some() {
            assignment.completed_at = completed_at;
        }
        Ok(Some(assignment.clone()))
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    async fn get_attempt(&self, id: &str) -> Result<Option<Attempt>, EngineError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.attempts.get(id).cloned())
    }

    async fn mark_reviewed(&self, attempt: &Attempt) -> Result<bool, EngineError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let still_pending = inner
            .attempts
            .get(&attempt.id)
            .and_then(|stored| stored.results.review_status())
            == Some(ReviewStatus::Pending);
        if !still_pending {
            return Ok(false);
        }
        inner.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(true)
    }

    async fn latest_attempt_for_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Option<Attempt>, EngineError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .attempts
            .values()
            .filter(|attempt| attempt.assignment_id == assignment_id)
            .max_by_key(|attempt| (attempt.completed_at, attempt.created_at))
            .cloned())
    }

    async fn list_attempts_for_review(
        &self,
        drill_type: DrillType,
        filter: ReviewFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Attempt>, u64), EngineError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut matching: Vec<Attempt> = inner
            .attempts
            .values()
            .filter(|attempt| attempt.drill_type == drill_type)
            .filter(|attempt| {
                attempt
                    .results
                    .review_status()
                    .is_some_and(|status| filter.matches(status))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        let total = matching.len() as u64;
        let start = (page.saturating_sub(1) * per_page) as usize;
        let attempts = matching
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();
        Ok((attempts, total))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, EngineError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.users.get(id).cloned())
    }

    async fn find_many_with_role(
        &self,
        ids: &[String],
        role: UserRole,
    ) -> Result<Vec<User>, EngineError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id))
            .filter(|user| user.role == role)
            .cloned()
            .collect())
    }
}
