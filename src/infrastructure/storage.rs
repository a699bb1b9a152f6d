use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = open_connection(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Opens a connection that waits on a locked database instead of failing immediately.
pub fn open_connection(path: &Path) -> Result<Connection, InfraError> {
    let connection = Connection::open(path)?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_database_creates_day_plans_table_idempotently() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("dayplan.sqlite");

        initialize_database(&path).expect("first init");
        initialize_database(&path).expect("second init");

        let connection = open_connection(&path).expect("open");
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'day_plans'",
                [],
                |row| row.get(0),
            )
            .expect("query schema");
        assert_eq!(count, 1);
    }
}
