// src/api/state.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::datamodel::Task;
use crate::errors::Result;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: Client,
    pub db_pool: Option<Arc<SqlitePool>>,
    pub tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: Option<SqlitePool>) -> Result<Self> {
        // The timeout is the per-job deadline at the evaluator boundary: a
        // hung judge call fails its job instead of pinning a worker forever.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.judge_timeout_secs))
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            client,
            db_pool: db_pool.map(Arc::new),
            tasks: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}
