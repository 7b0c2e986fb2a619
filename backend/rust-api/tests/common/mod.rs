#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use chrono::Utc;
use tower::ServiceExt;

use drilldeck_api::config::Config;
use drilldeck_api::create_router;
use drilldeck_api::models::drill::{Difficulty, DrillContent, VocabularyItem};
use drilldeck_api::models::{Drill, DrillType, User, UserRole};
use drilldeck_api::services::notification_service::{
    testing::RecordingSink, NotificationSink, Notifier,
};
use drilldeck_api::services::AppState;
use drilldeck_api::store::MemoryStore;

/// Hermetic test application: in-memory store, recording notification sink,
/// the same router as production.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
}

pub async fn create_test_app() -> TestApp {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let notifier = Arc::new(Notifier::new(vec![
        sink.clone() as Arc<dyn NotificationSink>
    ]));

    let app_state = Arc::new(AppState::with_parts(
        Config::for_tests(),
        store.clone(),
        store.clone(),
        notifier,
    ));

    TestApp {
        router: create_router(app_state),
        store,
        sink,
    }
}

impl TestApp {
    pub fn seed_instructor(&self, id: &str) {
        self.store.seed_user(User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            first_name: "Ina".to_string(),
            last_name: "Structor".to_string(),
            role: UserRole::Instructor,
        });
    }

    pub fn seed_learner(&self, id: &str) {
        self.store.seed_user(User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            first_name: "Lea".to_string(),
            last_name: "Rner".to_string(),
            role: UserRole::Learner,
        });
    }

    pub fn seed_reviewer(&self, id: &str) {
        self.store.seed_user(User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            first_name: "Rev".to_string(),
            last_name: "Iewer".to_string(),
            role: UserRole::Reviewer,
        });
    }

    pub fn seed_vocabulary_drill(&self, id: &str, words: &[&str]) {
        self.store.seed_drill(Drill {
            id: id.to_string(),
            title: format!("Drill {}", id),
            drill_type: DrillType::Vocabulary,
            difficulty: Difficulty::Beginner,
            due_date: None,
            duration_days: 7,
            content: DrillContent::Vocabulary {
                items: words
                    .iter()
                    .map(|word| VocabularyItem {
                        word: (*word).to_string(),
                        sentence: None,
                    })
                    .collect(),
            },
            created_by: "instructor-1".to_string(),
            created_at: Utc::now(),
        });
    }

    pub fn seed_drill(&self, id: &str, drill_type: DrillType, content: DrillContent) {
        self.store.seed_drill(Drill {
            id: id.to_string(),
            title: format!("Drill {}", id),
            drill_type,
            difficulty: Difficulty::Intermediate,
            due_date: None,
            duration_days: 7,
            content,
            created_by: "instructor-1".to_string(),
            created_at: Utc::now(),
        });
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn patch_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Notifications are dispatched on background tasks; poll until `count`
    /// have landed or the deadline passes.
    pub async fn wait_for_notifications(&self, count: usize) {
        for _ in 0..100 {
            if self.sink.delivered.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {} notifications, got {}",
            count,
            self.sink.delivered.lock().unwrap().len()
        );
    }
}

pub async fn response_json(response: Response<Body>) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}
