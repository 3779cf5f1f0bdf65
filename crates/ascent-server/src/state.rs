use ascent_core::config::Config;
use ascent_core::scheduler::NudgeDb;
use ascent_core::store::Store;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
///
/// The SQLite store is opened per request inside `spawn_blocking`; only the
/// nudge store keeps a long-lived handle.
#[derive(Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub nudges: Arc<NudgeDb>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let nudges = Arc::new(NudgeDb::open(&config.nudge_db_path)?);
        // Ensure the schema exists before the first request.
        Store::open(&config.database_path)?;
        Ok(Self {
            db_path: config.database_path.clone(),
            nudges,
            config: Arc::new(config),
        })
    }

    pub fn open_store(&self) -> ascent_core::Result<Store> {
        Store::open(&self.db_path)
    }
}
