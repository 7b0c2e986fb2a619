use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::drill::DrillRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
    Skipped,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::InProgress => "in-progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Overdue => "overdue",
            AssignmentStatus::Skipped => "skipped",
        }
    }
}

/// The binding of one drill to one learner. At most one exists per
/// `(drill, learner)` pair for the lifetime of the drill; the storage layer
/// enforces this with a unique index. Assignments are never deleted, only
/// status-transitioned, and only drill completion may set `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(rename = "_id")]
    pub id: String,
    pub drill_id: DrillRef,
    pub learner_id: String,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: AssignmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_kebab_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&AssignmentStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        let parsed: AssignmentStatus = serde_json::from_str("\"overdue\"").unwrap();
        assert_eq!(parsed, AssignmentStatus::Overdue);
    }
}
