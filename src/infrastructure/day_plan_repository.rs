use crate::domain::models::Block;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_connection;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// One block list per `(user_id, date_key)`, always replaced as a whole.
pub trait DayPlanRepository: Send + Sync {
    fn load(&self, user_id: &str, date_key: &str) -> Result<Option<Vec<Block>>, InfraError>;
    fn upsert(&self, user_id: &str, date_key: &str, blocks: &[Block]) -> Result<(), InfraError>;
    fn delete(&self, user_id: &str, date_key: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteDayPlanRepository {
    db_path: PathBuf,
}

impl SqliteDayPlanRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        open_connection(&self.db_path)
    }
}

impl DayPlanRepository for SqliteDayPlanRepository {
    fn load(&self, user_id: &str, date_key: &str) -> Result<Option<Vec<Block>>, InfraError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT blocks_json FROM day_plans WHERE user_id = ?1 AND date_key = ?2",
                params![user_id, date_key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            debug!(user_id, date_key, "no stored day plan");
            return Ok(None);
        };

        let blocks: Vec<Block> = serde_json::from_str(&raw)?;
        debug!(user_id, date_key, blocks = blocks.len(), "loaded day plan");
        Ok(Some(blocks))
    }

    fn upsert(&self, user_id: &str, date_key: &str, blocks: &[Block]) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let blocks_json = serde_json::to_string(blocks)?;
        let now = Utc::now().to_rfc3339();
        connection.execute(
            "INSERT INTO day_plans (user_id, date_key, blocks_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id, date_key) DO UPDATE SET
               blocks_json = excluded.blocks_json,
               updated_at = excluded.updated_at",
            params![user_id, date_key, blocks_json, now],
        )?;
        debug!(user_id, date_key, blocks = blocks.len(), "stored day plan");
        Ok(())
    }

    fn delete(&self, user_id: &str, date_key: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute(
            "DELETE FROM day_plans WHERE user_id = ?1 AND date_key = ?2",
            params![user_id, date_key],
        )?;
        Ok(removed > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDayPlanRepository {
    plans: Mutex<HashMap<(String, String), Vec<Block>>>,
}

impl InMemoryDayPlanRepository {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), Vec<Block>>>, InfraError> {
        self.plans
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("day plan lock poisoned: {error}")))
    }
}

impl DayPlanRepository for InMemoryDayPlanRepository {
    fn load(&self, user_id: &str, date_key: &str) -> Result<Option<Vec<Block>>, InfraError> {
        let plans = self.lock()?;
        Ok(plans
            .get(&(user_id.to_string(), date_key.to_string()))
            .cloned())
    }

    fn upsert(&self, user_id: &str, date_key: &str, blocks: &[Block]) -> Result<(), InfraError> {
        let mut plans = self.lock()?;
        plans.insert((user_id.to_string(), date_key.to_string()), blocks.to_vec());
        Ok(())
    }

    fn delete(&self, user_id: &str, date_key: &str) -> Result<bool, InfraError> {
        let mut plans = self.lock()?;
        Ok(plans
            .remove(&(user_id.to_string(), date_key.to_string()))
            .is_some())
    }
}
