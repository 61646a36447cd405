use deadpool_diesel::sqlite::Pool;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::{
    config::Config,
    database,
    registration::{AccountService, HttpAccountService},
    team::TeamRandomizer,
};

/// A server-sent event addressed to one user.
#[derive(Clone, Debug)]
pub struct UserEvent {
    pub user_id: i32,
    pub name: &'static str,
    pub data: String,
}

pub type Events = broadcast::Sender<UserEvent>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    pub database: Pool,
    pub events: Events,
    pub accounts: Arc<dyn AccountService>,
    pub randomizer: TeamRandomizer,
}

impl AppContext {
    pub fn new(
        database: Pool,
        accounts: Arc<dyn AccountService>,
        randomizer: TeamRandomizer,
    ) -> Self {
        Self {
            database,
            events: broadcast::channel::<UserEvent>(32).0,
            accounts,
            randomizer,
        }
    }

    pub fn database(&self) -> &Pool {
        &self.database
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Fan an event out to every open stream. Nobody listening is fine.
    pub fn publish(&self, event: UserEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("no event subscribers");
        }
    }
}

pub async fn create_context(config: &Config) -> anyhow::Result<AppContext> {
    let url = database::database_url(config.database_url.as_deref())?;
    database::migrate(&url).await?;

    let database = database::create_pool(&url, config.database_pool_size)?;
    let accounts = Arc::new(HttpAccountService::new(
        config.account_service.registration_url.clone(),
    ));
    let randomizer = TeamRandomizer::new(&config.team_randomizer);

    Ok(AppContext::new(database, accounts, randomizer))
}
