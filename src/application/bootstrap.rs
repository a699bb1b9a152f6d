use crate::infrastructure::config::{ensure_default_configs, validate_configs};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATABASE_FILE_NAME: &str = "dayplan.sqlite";

#[derive(Debug, Clone)]
pub struct BootstrapResult {
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
}

/// Creates `config/`, `state/` and `logs/` under the root, writes missing
/// default configs and applies the database schema.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join(DATABASE_FILE_NAME);

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    validate_configs(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        config_dir,
        logs_dir,
        database_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_layout_and_is_repeatable() {
        let temp = tempfile::tempdir().expect("temp dir");

        let first = bootstrap_workspace(temp.path()).expect("first bootstrap");
        let second = bootstrap_workspace(temp.path()).expect("second bootstrap");

        assert!(first.config_dir.join("app.json").is_file());
        assert!(first.config_dir.join("calendars.json").is_file());
        assert!(first.config_dir.join("policies.json").is_file());
        assert!(first.logs_dir.is_dir());
        assert!(first.database_path.is_file());
        assert_eq!(first.database_path, second.database_path);
        assert!(first.database_path.ends_with("state/dayplan.sqlite"));
    }
}
