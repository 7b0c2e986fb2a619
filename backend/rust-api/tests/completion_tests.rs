mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{create_test_app, response_json, TestApp};

async fn assign(app: &TestApp, drill_id: &str, learner_id: &str) -> String {
    let response = app
        .post_json(
            &format!("/api/v1/drills/{}/assign", drill_id),
            json!({ "learnerIds": [learner_id], "assignedBy": "instructor-1" }),
        )
        .await;
    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    body["created"][0]["_id"].as_str().unwrap().to_string()
}

fn vocabulary_results() -> serde_json::Value {
    json!({
        "vocabularyResults": {
            "items": [
                { "word": "echo", "attempts": 1, "bestScore": 88, "passed": true },
                { "word": "fathom", "attempts": 2, "bestScore": 71, "passed": true }
            ]
        }
    })
}

#[tokio::test]
async fn completing_a_drill_records_the_attempt_and_flips_the_assignment() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_vocabulary_drill("drill-1", &["echo", "fathom"]);
    let assignment_id = assign(&app, "drill-1", "learner-1").await;

    let response = app
        .post_json(
            &format!("/api/v1/assignments/{}/complete", assignment_id),
            json!({
                "drill": "drill-1",
                "learnerId": "learner-1",
                "score": 100,
                "timeSpent": 120,
                "results": vocabulary_results()
            }),
        )
        .await;
    let (status, attempt) = response_json(response).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(attempt["drillType"], "vocabulary");
    assert_eq!(attempt["score"], 100);
    assert_eq!(attempt["maxScore"], 100);
    assert_eq!(attempt["timeSpent"], 120);
    assert_eq!(app.store.attempt_count(), 1);

    // Assignment notification + completion notification to the assigner.
    app.wait_for_notifications(2).await;
    let delivered = app.sink.delivered.lock().unwrap();
    let completed = delivered
        .iter()
        .find(|n| n.recipient_id == "instructor-1")
        .expect("assigner must be notified of completion");
    assert_eq!(completed.payload["score"], 100);
}

#[tokio::test]
async fn a_populated_drill_reference_resolves_to_its_id() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_vocabulary_drill("drill-1", &["echo", "fathom"]);
    let assignment_id = assign(&app, "drill-1", "learner-1").await;

    let response = app
        .post_json(
            &format!("/api/v1/assignments/{}/complete", assignment_id),
            json!({
                "drill": { "id": "drill-1", "title": "Drill drill-1" },
                "learnerId": "learner-1",
                "score": 100,
                "timeSpent": 60,
                "results": vocabulary_results()
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn completing_someone_elses_assignment_is_forbidden() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_learner("learner-2");
    app.seed_vocabulary_drill("drill-1", &["echo", "fathom"]);
    let assignment_id = assign(&app, "drill-1", "learner-1").await;

    let response = app
        .post_json(
            &format!("/api/v1/assignments/{}/complete", assignment_id),
            json!({
                "drill": "drill-1",
                "learnerId": "learner-2",
                "score": 100,
                "timeSpent": 60,
                "results": vocabulary_results()
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.attempt_count(), 0);
}

#[tokio::test]
async fn mismatched_drill_reference_is_rejected() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_vocabulary_drill("drill-1", &["echo", "fathom"]);
    app.seed_vocabulary_drill("drill-2", &["mist"]);
    let assignment_id = assign(&app, "drill-1", "learner-1").await;

    let response = app
        .post_json(
            &format!("/api/v1/assignments/{}/complete", assignment_id),
            json!({
                "drill": "drill-2",
                "learnerId": "learner-1",
                "score": 100,
                "timeSpent": 60,
                "results": vocabulary_results()
            }),
        )
        .await;
    let (status, body) = response_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    // The error names both ids so client bugs are diagnosable.
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("drill-1"));
    assert!(message.contains("drill-2"));
}

#[tokio::test]
async fn results_payload_must_match_the_drill_type() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_vocabulary_drill("drill-1", &["echo", "fathom"]);
    let assignment_id = assign(&app, "drill-1", "learner-1").await;

    let response = app
        .post_json(
            &format!("/api/v1/assignments/{}/complete", assignment_id),
            json!({
                "drill": "drill-1",
                "learnerId": "learner-1",
                "score": 100,
                "timeSpent": 60,
                "results": {
                    "matchingResults": { "correctPairs": 3, "totalPairs": 4 }
                }
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.attempt_count(), 0);
}

#[tokio::test]
async fn the_latest_attempt_wins_when_a_drill_is_repeated() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_vocabulary_drill("drill-1", &["echo", "fathom"]);
    let assignment_id = assign(&app, "drill-1", "learner-1").await;

    // No attempt yet.
    let response = app
        .get(&format!("/api/v1/assignments/{}/attempts/latest", assignment_id))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for score in [50, 90] {
        let response = app
            .post_json(
                &format!("/api/v1/assignments/{}/complete", assignment_id),
                json!({
                    "drill": "drill-1",
                    "learnerId": "learner-1",
                    "score": score,
                    "timeSpent": 60,
                    "results": vocabulary_results()
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .get(&format!("/api/v1/assignments/{}/attempts/latest", assignment_id))
        .await;
    let (status, attempt) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(attempt["score"], 90);
}

#[tokio::test]
async fn completing_a_missing_assignment_is_not_found() {
    let app = create_test_app().await;
    app.seed_vocabulary_drill("drill-1", &["echo", "fathom"]);

    let response = app
        .post_json(
            "/api/v1/assignments/no-such-assignment/complete",
            json!({
                "drill": "drill-1",
                "learnerId": "learner-1",
                "score": 100,
                "timeSpent": 60,
                "results": vocabulary_results()
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
