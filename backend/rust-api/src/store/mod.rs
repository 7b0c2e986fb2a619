use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::models::{
    Assignment, AssignmentStatus, Attempt, Drill, DrillType, ReviewFilter, User, UserRole,
};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Outcome of inserting an assignment. A duplicate `(drill, learner)` pair is
/// not an error: the unique index at the storage layer is the real race guard
/// for bulk assignment, and a conflicting insert means "already assigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentInsert {
    Created,
    Duplicate,
}

/// Durable state of the drill lifecycle engine. The engine itself is
/// request-scoped and stateless between calls; everything it needs to
/// remember lives behind this trait.
#[async_trait]
pub trait EngineStore: Send + Sync {
    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> Result<(), EngineError>;

    async fn insert_drill(&self, drill: &Drill) -> Result<(), EngineError>;

    async fn get_drill(&self, id: &str) -> Result<Option<Drill>, EngineError>;

    /// Which of `learner_ids` already hold an assignment for `drill_id`.
    /// One query across all candidates, not N point lookups.
    async fn find_assigned_learners(
        &self,
        drill_id: &str,
        learner_ids: &[String],
    ) -> Result<Vec<String>, EngineError>;

    async fn insert_assignment(
        &self,
        assignment: &Assignment,
    ) -> Result<AssignmentInsert, EngineError>;

    async fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, EngineError>;

    async fn update_assignment_status(
        &self,
        id: &str,
        status: AssignmentStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Assignment>, EngineError>;

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), EngineError>;

    async fn get_attempt(&self, id: &str) -> Result<Option<Attempt>, EngineError>;

    /// Persist a reviewed attempt, conditional on the stored review status
    /// still being pending. Returns false without writing when another
    /// reviewer won the race (or the attempt vanished); this conditional
    /// write is what makes the pending -> reviewed transition one-shot under
    /// concurrency.
    async fn mark_reviewed(&self, attempt: &Attempt) -> Result<bool, EngineError>;

    /// Latest attempt for an assignment, by greatest `(completed_at, created_at)`.
    async fn latest_attempt_for_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Option<Attempt>, EngineError>;

    /// Reviewer work queue: attempts of one subjective drill type, filtered by
    /// review status, newest first. Returns the page plus the total count.
    async fn list_attempts_for_review(
        &self,
        drill_type: DrillType,
        filter: ReviewFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Attempt>, u64), EngineError>;
}

/// Read-only view of the user directory. Account management is owned by an
/// external collaborator; the engine only validates actors.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, EngineError>;

    async fn find_many_with_role(
        &self,
        ids: &[String],
        role: UserRole,
    ) -> Result<Vec<User>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Traits must stay object-safe; AppState holds them boxed.
    #[test]
    fn engine_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn EngineStore>) {}
    }

    #[test]
    fn user_directory_is_object_safe() {
        fn _takes_boxed(_: Box<dyn UserDirectory>) {}
    }
}
