use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::EngineError;
use crate::models::drill::{Difficulty, DrillContent, DrillRef};
use crate::models::{Assignment, AssignmentStatus, Attempt, Drill, DrillResults};
use crate::services::{
    assignment_service::{AssignmentService, NewDrill},
    attempt_service::AttemptService,
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDrillRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    pub difficulty: Difficulty,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default = "default_duration_days")]
    pub duration_days: i64,

    pub content: DrillContent,

    #[validate(length(min = 1, message = "Creator id must not be empty"))]
    pub created_by: String,

    /// Learners to assign immediately; may be empty.
    #[serde(default)]
    pub learner_ids: Vec<String>,
}

fn default_duration_days() -> i64 {
    7
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDrillResponse {
    pub drill: Drill,
    pub assignment_count: usize,
}

pub async fn create_drill(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDrillRequest>,
) -> Result<impl IntoResponse, EngineError> {
    if let Err(e) = req.validate() {
        return Err(EngineError::validation(format!("Validation error: {}", e)));
    }

    tracing::info!(
        "Creating {} drill \"{}\" with {} immediate assignees",
        req.content.drill_type().as_str(),
        req.title,
        req.learner_ids.len()
    );

    let service = AssignmentService::new(
        state.store.clone(),
        state.directory.clone(),
        state.notifier.clone(),
    );
    let created = service
        .create_drill_with_assignments(
            NewDrill {
                title: req.title,
                difficulty: req.difficulty,
                due_date: req.due_date,
                duration_days: req.duration_days,
                content: req.content,
            },
            &req.created_by,
            &req.learner_ids,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateDrillResponse {
            drill: created.drill,
            assignment_count: created.assignment_count,
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignDrillRequest {
    #[validate(length(min = 1, message = "Learner list must not be empty"))]
    pub learner_ids: Vec<String>,

    #[validate(length(min = 1, message = "Assigner id must not be empty"))]
    pub assigned_by: String,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDrillResponse {
    pub created: Vec<Assignment>,
    pub skipped: usize,
    pub total: usize,
}

pub async fn assign_drill(
    State(state): State<Arc<AppState>>,
    Path(drill_id): Path<String>,
    Json(req): Json<AssignDrillRequest>,
) -> Result<impl IntoResponse, EngineError> {
    if let Err(e) = req.validate() {
        return Err(EngineError::validation(format!("Validation error: {}", e)));
    }

    tracing::info!(
        "Bulk assigning drill {} to {} learners",
        drill_id,
        req.learner_ids.len()
    );

    let service = AssignmentService::new(
        state.store.clone(),
        state.directory.clone(),
        state.notifier.clone(),
    );
    let outcome = service
        .assign_bulk(&drill_id, &req.learner_ids, &req.assigned_by, req.due_date)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AssignDrillResponse {
            created: outcome.created,
            skipped: outcome.skipped,
            total: outcome.total,
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteDrillRequest {
    /// Raw id or populated object; resolved before any comparison.
    pub drill: DrillRef,

    #[validate(length(min = 1, message = "Learner id must not be empty"))]
    pub learner_id: String,

    #[validate(range(min = 0, max = 100, message = "Score must be 0-100"))]
    pub score: i32,

    #[validate(range(min = 0, message = "Time spent must not be negative"))]
    pub time_spent: i64,

    pub results: DrillResults,
}

pub async fn complete_assignment(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<String>,
    Json(req): Json<CompleteDrillRequest>,
) -> Result<impl IntoResponse, EngineError> {
    if let Err(e) = req.validate() {
        return Err(EngineError::validation(format!("Validation error: {}", e)));
    }

    tracing::info!(
        "Completing assignment {} for learner {}",
        assignment_id,
        req.learner_id
    );

    let service = AttemptService::new(
        state.store.clone(),
        state.directory.clone(),
        state.notifier.clone(),
    );
    let attempt: Attempt = service
        .complete_drill(
            &req.drill,
            &assignment_id,
            &req.learner_id,
            req.score,
            req.time_spent,
            req.results,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

pub async fn latest_attempt(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<String>,
) -> Result<impl IntoResponse, EngineError> {
    let service = AttemptService::new(
        state.store.clone(),
        state.directory.clone(),
        state.notifier.clone(),
    );
    let attempt = service.latest_attempt(&assignment_id).await?;
    Ok((StatusCode::OK, Json(attempt)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: AssignmentStatus,
}

pub async fn update_assignment_status(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let service = AssignmentService::new(
        state.store.clone(),
        state.directory.clone(),
        state.notifier.clone(),
    );
    let assignment = service.update_status(&assignment_id, req.status).await?;
    Ok((StatusCode::OK, Json(assignment)))
}
