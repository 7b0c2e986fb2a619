use std::sync::Arc;

use mongodb::Client as MongoClient;

use crate::config::Config;
use crate::store::{EngineStore, MongoStore, UserDirectory};

pub mod assignment_service;
pub mod attempt_service;
pub mod notification_service;
pub mod review_service;

use notification_service::{EmailSink, NotificationSink, Notifier, PushSink};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn EngineStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub notifier: Arc<Notifier>,
}

impl AppState {
    /// Production wiring: Mongo-backed store and directory, email plus
    /// optional push notification channels.
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let db = mongo_client.database(&config.mongo_database);

        let store = Arc::new(MongoStore::new(db.clone()));
        // The unique index is the race guard for bulk assignment; it must
        // exist before the first request is served.
        store.ensure_indexes().await?;
        tracing::info!("MongoDB indexes ensured");

        let directory = Arc::new(MongoStore::new(db));

        let mut sinks: Vec<Arc<dyn NotificationSink>> =
            vec![Arc::new(EmailSink::new(config.email.clone()))];
        if let Some(url) = &config.push_webhook_url {
            sinks.push(Arc::new(PushSink::new(url.clone())));
        }
        let notifier = Arc::new(Notifier::new(sinks));

        Ok(Self {
            config,
            store,
            directory,
            notifier,
        })
    }

    /// Assemble state from explicit parts. Used by the test suite with the
    /// in-memory store and recording sinks.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn EngineStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            directory,
            notifier,
        }
    }
}
