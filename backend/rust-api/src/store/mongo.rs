use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};

use crate::error::EngineError;
use crate::models::drill::DrillRef;
use crate::models::{
    Assignment, AssignmentStatus, Attempt, Drill, DrillType, ReviewFilter, ReviewStatus, User,
    UserRole,
};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

use super::{AssignmentInsert, EngineStore, UserDirectory};

const DRILLS: &str = "drills";
const ASSIGNMENTS: &str = "assignments";
const ATTEMPTS: &str = "attempts";
const USERS: &str = "users";

/// Production store. Documents are serialized straight from the domain
/// models; the unique index on `(drillId, learnerId)` is the actual source of
/// truth for assignment uniqueness, the existence pre-check in the ledger is
/// only an optimization.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Must run at startup, before any assignment is inserted.
    pub async fn ensure_indexes(&self) -> Result<(), EngineError> {
        let assignments: Collection<Assignment> = self.db.collection(ASSIGNMENTS);
        assignments
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "drillId": 1, "learnerId": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;

        let attempts: Collection<Attempt> = self.db.collection(ATTEMPTS);
        attempts
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "assignmentId": 1, "completedAt": -1 })
                    .build(),
            )
            .await?;

        Ok(())
    }

    fn drills(&self) -> Collection<Drill> {
        self.db.collection(DRILLS)
    }

    fn assignments(&self) -> Collection<Assignment> {
        self.db.collection(ASSIGNMENTS)
    }

    fn attempts(&self) -> Collection<Attempt> {
        self.db.collection(ATTEMPTS)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) =
        *err.kind
    {
        return we.code == 11000;
    }
    false
}

fn encode_timestamp(value: &DateTime<Utc>) -> Result<mongodb::bson::Bson, EngineError> {
    to_bson(value).map_err(EngineError::storage)
}

/// Mongo field path of the embedded review status for a subjective drill type.
fn review_status_path(drill_type: DrillType) -> Option<&'static str> {
    match drill_type {
        DrillType::Grammar => Some("results.grammarResults.reviewStatus"),
        DrillType::SentenceWriting => Some("results.sentenceResults.reviewStatus"),
        DrillType::Summary => Some("results.summaryResults.reviewStatus"),
        _ => None,
    }
}

#[async_trait]
impl EngineStore for MongoStore {
    async fn ping(&self) -> Result<(), EngineError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn insert_drill(&self, drill: &Drill) -> Result<(), EngineError> {
        let collection = self.drills();
        retry_async_with_config(RetryConfig::aggressive(), || async {
            collection.insert_one(drill).await.map(|_| ())
        })
        .await?;
        Ok(())
    }

    async fn get_drill(&self, id: &str) -> Result<Option<Drill>, EngineError> {
        let collection = self.drills();
        let drill = retry_async_with_config(RetryConfig::default(), || async {
            collection.find_one(doc! { "_id": id }).await
        })
        .await?;
        Ok(drill)
    }

    async fn find_assigned_learners(
        &self,
        drill_id: &str,
        learner_ids: &[String],
    ) -> Result<Vec<String>, EngineError> {
        let mut cursor = self
            .assignments()
            .find(doc! {
                "drillId": drill_id,
                "learnerId": { "$in": learner_ids },
            })
            .await?;

        let mut existing = Vec::new();
        while let Some(assignment) = cursor.try_next().await? {
            existing.push(assignment.learner_id);
        }
        Ok(existing)
    }

    async fn insert_assignment(
        &self,
        assignment: &Assignment,
    ) -> Result<AssignmentInsert, EngineError> {
        let mut stored = assignment.clone();
        stored.drill_id = DrillRef::Id(assignment.drill_id.resolve().to_string());

        match self.assignments().insert_one(&stored).await {
            Ok(_) => Ok(AssignmentInsert::Created),
            // Lost the race against a concurrent bulk call for the same pair.
            Err(err) if is_duplicate_key(&err) => Ok(AssignmentInsert::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, EngineError> {
        let collection = self.assignments();
        let assignment = retry_async_with_config(RetryConfig::default(), || async {
            collection.find_one(doc! { "_id": id }).await
        })
        .await?;
        Ok(assignment)
    }

    async fn update_assignment_status(
        &self,
        id: &str,
        status: AssignmentStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Assignment>, EngineError> {
        let mut set = doc! { "status": status.as_str() };
        if let Some(ts) = &completed_at {
            set.insert("completedAt", encode_timestamp(ts)?);
        }

        let updated = self
            .assignments()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;
        Ok(updated)
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), EngineError> {
        let collection = self.attempts();
        retry_async_with_config(RetryConfig::aggressive(), || async {
            collection.insert_one(attempt).await.map(|_| ())
        })
        .await?;
        Ok(())
    }

    async fn get_attempt(&self, id: &str) -> Result<Option<Attempt>, EngineError> {
        let collection = self.attempts();
        let attempt = retry_async_with_config(RetryConfig::default(), || async {
            collection.find_one(doc! { "_id": id }).await
        })
        .await?;
        Ok(attempt)
    }

    async fn mark_reviewed(&self, attempt: &Attempt) -> Result<bool, EngineError> {
        let status_path = review_status_path(attempt.drill_type).ok_or_else(|| {
            EngineError::validation(format!(
                "drill type {} has no review payload",
                attempt.drill_type.as_str()
            ))
        })?;

        // The pending filter makes the replace conditional: a concurrent
        // review that already flipped the status matches nothing.
        let mut filter = doc! { "_id": &attempt.id };
        filter.insert(status_path, review_status_str(ReviewStatus::Pending));

        let result = self.attempts().replace_one(filter, attempt).await?;
        Ok(result.matched_count > 0)
    }

    async fn latest_attempt_for_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Option<Attempt>, EngineError> {
        let mut cursor = self
            .attempts()
            .find(doc! { "assignmentId": assignment_id })
            .with_options(
                FindOptions::builder()
                    .sort(doc! { "completedAt": -1, "createdAt": -1 })
                    .limit(1)
                    .build(),
            )
            .await?;
        Ok(cursor.try_next().await?)
    }

    async fn list_attempts_for_review(
        &self,
        drill_type: DrillType,
        filter: ReviewFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Attempt>, u64), EngineError> {
        let status_path = review_status_path(drill_type).ok_or_else(|| {
            EngineError::validation(format!(
                "drill type {} has no review queue",
                drill_type.as_str()
            ))
        })?;

        let mut query = doc! { "drillType": drill_type.as_str() };
        match filter {
            ReviewFilter::Pending => {
                query.insert(status_path, review_status_str(ReviewStatus::Pending));
            }
            ReviewFilter::Reviewed => {
                query.insert(status_path, review_status_str(ReviewStatus::Reviewed));
            }
            ReviewFilter::All => {}
        }

        let total = self.attempts().count_documents(query.clone()).await?;

        let skip = page.saturating_sub(1) * per_page;
        let mut cursor = self
            .attempts()
            .find(query)
            .with_options(
                FindOptions::builder()
                    .sort(doc! { "completedAt": -1 })
                    .skip(skip)
                    .limit(per_page as i64)
                    .build(),
            )
            .await?;

        let mut attempts = Vec::new();
        while let Some(attempt) = cursor.try_next().await? {
            attempts.push(attempt);
        }
        Ok((attempts, total))
    }
}

fn review_status_str(status: ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::Pending => "pending",
        ReviewStatus::Reviewed => "reviewed",
    }
}

#[async_trait]
impl UserDirectory for MongoStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, EngineError> {
        Ok(self.users().find_one(doc! { "_id": id }).await?)
    }

    async fn find_many_with_role(
        &self,
        ids: &[String],
        role: UserRole,
    ) -> Result<Vec<User>, EngineError> {
        let mut cursor = self
            .users()
            .find(doc! {
                "_id": { "$in": ids },
                "role": role.as_str(),
            })
            .await?;

        let mut users = Vec::new();
        while let Some(user) = cursor.try_next().await? {
            users.push(user);
        }
        Ok(users)
    }
}
