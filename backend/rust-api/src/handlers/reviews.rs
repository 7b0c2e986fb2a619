use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::EngineError;
use crate::models::review::{ReviewFilter, SentenceJudgment, SummaryJudgment};
use crate::models::{Attempt, DrillType};
use crate::services::{
    attempt_service::AttemptService, review_service::ReviewService, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueueQuery {
    pub drill_type: DrillType,
    #[serde(default)]
    pub filter: ReviewFilter,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueueResponse {
    pub attempts: Vec<Attempt>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

pub async fn list_review_queue(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewQueueQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let service = AttemptService::new(
        state.store.clone(),
        state.directory.clone(),
        state.notifier.clone(),
    );
    let page = service
        .list_submissions_for_review(query.drill_type, query.filter, query.page, query.per_page)
        .await?;

    Ok((
        StatusCode::OK,
        Json(ReviewQueueResponse {
            attempts: page.attempts,
            total: page.total,
            page: query.page.max(1),
            per_page: query.per_page.clamp(1, 100),
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SentenceReviewRequest {
    #[validate(length(min = 1, message = "Reviewer id must not be empty"))]
    pub reviewer_id: String,

    #[validate(length(min = 1, message = "Judgments must not be empty"))]
    pub judgments: Vec<SentenceJudgment>,
}

pub async fn review_sentence(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
    Json(req): Json<SentenceReviewRequest>,
) -> Result<impl IntoResponse, EngineError> {
    if let Err(e) = req.validate() {
        return Err(EngineError::validation(format!("Validation error: {}", e)));
    }

    tracing::info!("Reviewing sentence attempt {}", attempt_id);

    let service = review_service(&state);
    let attempt = service
        .review_sentence(&attempt_id, &req.reviewer_id, req.judgments)
        .await?;
    Ok((StatusCode::OK, Json(attempt)))
}

pub async fn review_grammar(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
    Json(req): Json<SentenceReviewRequest>,
) -> Result<impl IntoResponse, EngineError> {
    if let Err(e) = req.validate() {
        return Err(EngineError::validation(format!("Validation error: {}", e)));
    }

    tracing::info!("Reviewing grammar attempt {}", attempt_id);

    let service = review_service(&state);
    let attempt = service
        .review_grammar(&attempt_id, &req.reviewer_id, req.judgments)
        .await?;
    Ok((StatusCode::OK, Json(attempt)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReviewRequest {
    #[validate(length(min = 1, message = "Reviewer id must not be empty"))]
    pub reviewer_id: String,

    #[validate(length(min = 1, message = "Feedback must not be empty"))]
    pub feedback: String,

    pub is_acceptable: bool,

    #[serde(default)]
    pub corrected_version: Option<String>,
}

pub async fn review_summary(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
    Json(req): Json<SummaryReviewRequest>,
) -> Result<impl IntoResponse, EngineError> {
    if let Err(e) = req.validate() {
        return Err(EngineError::validation(format!("Validation error: {}", e)));
    }

    tracing::info!("Reviewing summary attempt {}", attempt_id);

    let service = review_service(&state);
    let attempt = service
        .review_summary(
            &attempt_id,
            &req.reviewer_id,
            SummaryJudgment {
                feedback: req.feedback,
                is_acceptable: req.is_acceptable,
                corrected_version: req.corrected_version,
            },
        )
        .await?;
    Ok((StatusCode::OK, Json(attempt)))
}

fn review_service(state: &AppState) -> ReviewService {
    ReviewService::new(
        state.store.clone(),
        state.directory.clone(),
        state.notifier.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentence_review_request_requires_judgments() {
        let empty = SentenceReviewRequest {
            reviewer_id: "rev-1".to_string(),
            judgments: vec![],
        };
        assert!(empty.validate().is_err());

        let filled = SentenceReviewRequest {
            reviewer_id: "rev-1".to_string(),
            judgments: vec![SentenceJudgment {
                is_correct: true,
                corrected_text: None,
            }],
        };
        assert!(filled.validate().is_ok());
    }
}
