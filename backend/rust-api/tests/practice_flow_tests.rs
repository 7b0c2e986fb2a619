mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{create_test_app, response_json};
use drilldeck_api::models::DrillResults;
use drilldeck_api::practice::oracle::testing::ScriptedScorer;
use drilldeck_api::practice::{PracticeSession, ScoreOutcome, SessionPhase};
use drilldeck_api::store::EngineStore;

/// Full path from a gated practice session to a stored attempt: the learner
/// passes the first word outright, fails the second once, retries, then the
/// session's own output is submitted over HTTP.
#[tokio::test]
async fn a_practice_session_result_flows_into_the_attempt_store() {
    let app = create_test_app().await;
    app.seed_instructor("instructor-1");
    app.seed_learner("learner-1");
    app.seed_vocabulary_drill("drill-1", &["echo", "fathom"]);

    let response = app
        .post_json(
            "/api/v1/drills/drill-1/assign",
            json!({ "learnerIds": ["learner-1"], "assignedBy": "instructor-1" }),
        )
        .await;
    let (_, body) = response_json(response).await;
    let assignment_id = body["created"][0]["_id"].as_str().unwrap().to_string();

    // Drive the gated session against a scripted oracle: 70 passes "echo",
    // 60 keeps "fathom" attemptable, 80 clears it.
    let drill = app
        .store
        .get_drill("drill-1")
        .await
        .unwrap()
        .expect("seeded drill");
    let mut session = PracticeSession::new(&drill);
    session.start().unwrap();

    let scorer = ScriptedScorer::new([70, 60, 80]);
    assert_eq!(
        session.score_current(&scorer, b"take-1").await.unwrap(),
        ScoreOutcome::Passed { score: 70 }
    );
    assert_eq!(
        session.score_current(&scorer, b"take-2").await.unwrap(),
        ScoreOutcome::Retry { score: 60 }
    );
    assert_eq!(
        session.score_current(&scorer, b"take-3").await.unwrap(),
        ScoreOutcome::Passed { score: 80 }
    );
    assert_eq!(session.phase(), SessionPhase::ReadyToSubmit);

    let outcome = session.submit().unwrap();
    assert_eq!(outcome.score, 100);
    let DrillResults::Vocabulary(ref items) = outcome.results else {
        panic!("vocabulary session must produce a vocabulary payload");
    };
    assert_eq!(items.items[1].attempts, 2);
    assert_eq!(items.items[1].best_score, 80);

    let response = app
        .post_json(
            &format!("/api/v1/assignments/{}/complete", assignment_id),
            json!({
                "drill": "drill-1",
                "learnerId": "learner-1",
                "score": outcome.score,
                "timeSpent": 120,
                "results": serde_json::to_value(&outcome.results).unwrap()
            }),
        )
        .await;
    let (status, attempt) = response_json(response).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(attempt["score"], 100);
    assert_eq!(attempt["results"]["vocabularyResults"]["items"][1]["bestScore"], 80);
    assert_eq!(app.store.attempt_count(), 1);
}
