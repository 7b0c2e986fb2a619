mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{create_test_app, response_json, TestApp};
use drilldeck_api::models::drill::{
    DrillContent, GrammarPattern, SentencePrompt, SummaryPassage,
};
use drilldeck_api::models::DrillType;
use drilldeck_api::services::notification_service::NotificationKind;

async fn submit_sentence_attempt(app: &TestApp) -> String {
    app.seed_drill(
        "drill-s",
        DrillType::SentenceWriting,
        DrillContent::SentenceWriting {
            prompts: vec![
                SentencePrompt {
                    word: "resilient".into(),
                    hint: None,
                },
                SentencePrompt {
                    word: "fathom".into(),
                    hint: None,
                },
                SentencePrompt {
                    word: "drizzle".into(),
                    hint: None,
                },
            ],
        },
    );

    let response = app
        .post_json(
            "/api/v1/drills/drill-s/assign",
            json!({ "learnerIds": ["learner-1"], "assignedBy": "instructor-1" }),
        )
        .await;
    let (_, body) = response_json(response).await;
    let assignment_id = body["created"][0]["_id"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            &format!("/api/v1/assignments/{}/complete", assignment_id),
            json!({
                "drill": "drill-s",
                "learnerId": "learner-1",
                "score": 0,
                "timeSpent": 300,
                "results": {
                    "sentenceResults": {
                        "sentences": [
                            { "prompt": "resilient", "sentence": "She is resilient." },
                            { "prompt": "fathom", "sentence": "I cannot fathom it." },
                            { "prompt": "drizzle", "sentence": "A drizzle fell all day." }
                        ],
                        "reviewStatus": "pending"
                    }
                }
            }),
        )
        .await;
    let (status, attempt) = response_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    attempt["_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn sentence_review_recomputes_the_score_from_verdicts() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_reviewer("reviewer-1");
    let attempt_id = submit_sentence_attempt(&app).await;

    let response = app
        .post_json(
            &format!("/api/v1/reviews/sentence/{}", attempt_id),
            json!({
                "reviewerId": "reviewer-1",
                "judgments": [
                    { "isCorrect": true },
                    { "isCorrect": false, "correctedText": "I cannot fathom this." },
                    { "isCorrect": true, "correctedText": "spurious, must be dropped" }
                ]
            }),
        )
        .await;
    let (status, attempt) = response_json(response).await;

    assert_eq!(status, StatusCode::OK);
    // 2 of 3 correct rounds to 67.
    assert_eq!(attempt["score"], 67);
    let results = &attempt["results"]["sentenceResults"];
    assert_eq!(results["reviewStatus"], "reviewed");
    assert_eq!(results["reviews"][0].get("correctedText"), None);
    assert_eq!(
        results["reviews"][1]["correctedText"],
        "I cannot fathom this."
    );
    assert_eq!(results["reviews"][2].get("correctedText"), None);

    // Assigned, completed, reviewed: the review one goes to the learner.
    app.wait_for_notifications(3).await;
    let delivered = app.sink.delivered.lock().unwrap();
    let reviewed = delivered
        .iter()
        .find(|n| n.kind == NotificationKind::Reviewed)
        .expect("learner must be notified of review");
    assert_eq!(reviewed.recipient_id, "learner-1");
    assert_eq!(reviewed.payload["score"], 67);
    assert_eq!(reviewed.payload["allCorrect"], false);
}

#[tokio::test]
async fn a_second_review_is_rejected() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_reviewer("reviewer-1");
    let attempt_id = submit_sentence_attempt(&app).await;

    let judgments = json!({
        "reviewerId": "reviewer-1",
        "judgments": [
            { "isCorrect": true },
            { "isCorrect": true },
            { "isCorrect": true }
        ]
    });

    let first = app
        .post_json(
            &format!("/api/v1/reviews/sentence/{}", attempt_id),
            judgments.clone(),
        )
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .post_json(&format!("/api/v1/reviews/sentence/{}", attempt_id), judgments)
        .await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn judgment_count_must_match_sentence_count() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_reviewer("reviewer-1");
    let attempt_id = submit_sentence_attempt(&app).await;

    let response = app
        .post_json(
            &format!("/api/v1/reviews/sentence/{}", attempt_id),
            json!({
                "reviewerId": "reviewer-1",
                "judgments": [{ "isCorrect": true }]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn the_wrong_review_endpoint_for_the_attempt_type_is_rejected() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_reviewer("reviewer-1");
    let attempt_id = submit_sentence_attempt(&app).await;

    let response = app
        .post_json(
            &format!("/api/v1/reviews/grammar/{}", attempt_id),
            json!({
                "reviewerId": "reviewer-1",
                "judgments": [
                    { "isCorrect": true },
                    { "isCorrect": true },
                    { "isCorrect": true }
                ]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn grammar_review_keeps_corrections_only_on_incorrect_entries() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_reviewer("reviewer-1");
    app.seed_drill(
        "drill-g",
        DrillType::Grammar,
        DrillContent::Grammar {
            patterns: vec![GrammarPattern {
                pattern: "If I had ~, I would ~".into(),
                sentence_count: 4,
                example_sentences: vec![],
            }],
        },
    );

    let response = app
        .post_json(
            "/api/v1/drills/drill-g/assign",
            json!({ "learnerIds": ["learner-1"], "assignedBy": "instructor-1" }),
        )
        .await;
    let (_, body) = response_json(response).await;
    let assignment_id = body["created"][0]["_id"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            &format!("/api/v1/assignments/{}/complete", assignment_id),
            json!({
                "drill": "drill-g",
                "learnerId": "learner-1",
                "score": 0,
                "timeSpent": 500,
                "results": {
                    "grammarResults": {
                        "sentences": [
                            { "prompt": "If I had ~, I would ~", "sentence": "If I had time, I would travel." },
                            { "prompt": "If I had ~, I would ~", "sentence": "If I had money, I would helping." },
                            { "prompt": "If I had ~, I would ~", "sentence": "If I had a map, I would go." },
                            { "prompt": "If I had ~, I would ~", "sentence": "If I had keys, I would drive." }
                        ],
                        "reviewStatus": "pending"
                    }
                }
            }),
        )
        .await;
    let (_, attempt) = response_json(response).await;
    let attempt_id = attempt["_id"].as_str().unwrap();

    let response = app
        .post_json(
            &format!("/api/v1/reviews/grammar/{}", attempt_id),
            json!({
                "reviewerId": "reviewer-1",
                "judgments": [
                    { "isCorrect": true },
                    { "isCorrect": false, "correctedText": "If I had money, I would help." },
                    { "isCorrect": true },
                    { "isCorrect": true }
                ]
            }),
        )
        .await;
    let (status, reviewed) = response_json(response).await;

    assert_eq!(status, StatusCode::OK);
    // 3 of 4 correct rounds to 75.
    assert_eq!(reviewed["score"], 75);
    let reviews = &reviewed["results"]["grammarResults"]["reviews"];
    assert_eq!(reviews.as_array().unwrap().len(), 4);
    assert_eq!(reviews[0].get("correctedText"), None);
    assert_eq!(reviews[1]["correctedText"], "If I had money, I would help.");
    assert_eq!(reviews[1]["isCorrect"], false);
    assert_eq!(reviews[1]["reviewedBy"], "reviewer-1");
}

#[tokio::test]
async fn summary_review_is_all_or_nothing() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_reviewer("reviewer-1");
    app.seed_drill(
        "drill-sum",
        DrillType::Summary,
        DrillContent::Summary {
            passage: SummaryPassage {
                passage: "A long passage about the sea.".into(),
                guidance: None,
            },
        },
    );

    let response = app
        .post_json(
            "/api/v1/drills/drill-sum/assign",
            json!({ "learnerIds": ["learner-1"], "assignedBy": "instructor-1" }),
        )
        .await;
    let (_, body) = response_json(response).await;
    let assignment_id = body["created"][0]["_id"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            &format!("/api/v1/assignments/{}/complete", assignment_id),
            json!({
                "drill": "drill-sum",
                "learnerId": "learner-1",
                "score": 0,
                "timeSpent": 400,
                "results": {
                    "summaryResults": {
                        "summaryText": "It is about the sea.",
                        "reviewStatus": "pending"
                    }
                }
            }),
        )
        .await;
    let (_, attempt) = response_json(response).await;
    let attempt_id = attempt["_id"].as_str().unwrap();

    let response = app
        .post_json(
            &format!("/api/v1/reviews/summary/{}", attempt_id),
            json!({
                "reviewerId": "reviewer-1",
                "feedback": "Too short, but the corrected version is discarded anyway.",
                "isAcceptable": true,
                "correctedVersion": "should be dropped for acceptable summaries"
            }),
        )
        .await;
    let (status, reviewed) = response_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["score"], 100);
    let review = &reviewed["results"]["summaryResults"]["review"];
    assert_eq!(review["isAcceptable"], true);
    assert_eq!(review.get("correctedVersion"), None);
}

#[tokio::test]
async fn the_review_queue_filters_by_status() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_reviewer("reviewer-1");
    let attempt_id = submit_sentence_attempt(&app).await;

    let (status, body) = response_json(
        app.get("/api/v1/reviews?drillType=sentence_writing&filter=pending")
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["attempts"][0]["_id"], attempt_id.as_str());

    app.post_json(
        &format!("/api/v1/reviews/sentence/{}", attempt_id),
        json!({
            "reviewerId": "reviewer-1",
            "judgments": [
                { "isCorrect": true },
                { "isCorrect": true },
                { "isCorrect": true }
            ]
        }),
    )
    .await;

    let (_, body) = response_json(
        app.get("/api/v1/reviews?drillType=sentence_writing&filter=pending")
            .await,
    )
    .await;
    assert_eq!(body["total"], 0);

    let (_, body) = response_json(
        app.get("/api/v1/reviews?drillType=sentence_writing&filter=reviewed")
            .await,
    )
    .await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn objective_types_have_no_review_queue() {
    let app = create_test_app().await;

    let response = app.get("/api/v1/reviews?drillType=vocabulary").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
