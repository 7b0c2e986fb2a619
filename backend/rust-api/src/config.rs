use serde::Deserialize;
use std::env;

/// SMTP settings for the email notification channel. Absent settings mean
/// email delivery is unconfigured and the channel reports an error per send.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub bind_addr: String,
    /// Base URL of the pronunciation scoring sidecar.
    pub oracle_url: String,
    /// Optional webhook for the push notification channel.
    pub push_webhook_url: Option<String>,
    pub email: Option<EmailSettings>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env_name = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "drilldeck".to_string());

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:3001".to_string());

        let oracle_url = settings
            .get_string("oracle.url")
            .or_else(|_| env::var("ORACLE_URL"))
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let push_webhook_url = settings
            .get_string("push.webhook_url")
            .or_else(|_| env::var("PUSH_WEBHOOK_URL"))
            .ok();

        let email = Self::load_email_settings(&settings);

        Ok(Config {
            mongo_uri,
            mongo_database,
            bind_addr,
            oracle_url,
            push_webhook_url,
            email,
        })
    }

    /// Email is configured all-or-nothing; a server without credentials is
    /// treated as unconfigured.
    fn load_email_settings(settings: &config::Config) -> Option<EmailSettings> {
        let server = settings
            .get_string("email.server")
            .or_else(|_| env::var("EMAIL_SERVER"))
            .ok()?;
        let login = settings
            .get_string("email.login")
            .or_else(|_| env::var("EMAIL_LOGIN"))
            .ok()?;
        let password = settings
            .get_string("email.password")
            .or_else(|_| env::var("EMAIL_PASSWORD"))
            .ok()?;

        let port = settings
            .get_int("email.port")
            .ok()
            .and_then(|value| u16::try_from(value).ok())
            .or_else(|| env::var("EMAIL_PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(587);
        let from_email = settings
            .get_string("email.from_email")
            .or_else(|_| env::var("EMAIL_FROM"))
            .unwrap_or_else(|_| login.clone());
        let from_name = settings
            .get_string("email.from_name")
            .or_else(|_| env::var("EMAIL_FROM_NAME"))
            .unwrap_or_else(|_| "DrillDeck".to_string());
        let use_tls = settings
            .get_bool("email.use_tls")
            .ok()
            .or_else(|| env::var("EMAIL_USE_TLS").ok().map(|v| v == "1" || v == "true"))
            .unwrap_or(true);

        Some(EmailSettings {
            server,
            port,
            login,
            password,
            from_email,
            from_name,
            use_tls,
        })
    }

    /// Fixed settings for the test suite; nothing external is contacted.
    pub fn for_tests() -> Self {
        Config {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "drilldeck_test".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            oracle_url: "http://localhost:8000".to_string(),
            push_webhook_url: None,
            email: None,
        }
    }
}
