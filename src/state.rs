use std::sync::Arc;
use std::time::Duration;

use crate::chat::SessionRegistry;
use crate::clock::LocalDays;
use crate::collab::{ChatAgent, FoodParser, HttpNutritionService};
use crate::config::AppConfig;
use crate::events::EventHub;
use crate::goals::{GoalsSource, PgGoalsSource};
use crate::meals::services::UserLocks;
use crate::meals::{LogStore, PgLogStore};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub days: LocalDays,
    pub store: Arc<dyn LogStore>,
    pub goals: Arc<dyn GoalsSource>,
    pub parser: Arc<dyn FoodParser>,
    pub agent: Arc<dyn ChatAgent>,
    pub append_locks: Arc<UserLocks>,
    pub sessions: Arc<SessionRegistry>,
    pub events: EventHub,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let days = LocalDays::system(config.utc_offset()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
        }

        let nutrition = Arc::new(HttpNutritionService::new(&config.collaborator)?);
        tracing::info!(base_url = %config.collaborator.base_url, "nutrition service configured");

        let state = Self::from_parts(
            config,
            days.clone(),
            Arc::new(PgLogStore::new(db.clone(), days)),
            Arc::new(PgGoalsSource::new(db)),
            nutrition.clone(),
            nutrition,
        );
        SessionRegistry::spawn_sweeper(&state.sessions, SESSION_SWEEP_INTERVAL);
        Ok(state)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        days: LocalDays,
        store: Arc<dyn LogStore>,
        goals: Arc<dyn GoalsSource>,
        parser: Arc<dyn FoodParser>,
        agent: Arc<dyn ChatAgent>,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(days.clone(), config.session_idle_ttl()));
        Self {
            config,
            days,
            store,
            goals,
            parser,
            agent,
            append_locks: Arc::new(UserLocks::default()),
            sessions,
            events: EventHub::new(),
        }
    }
}
