use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Connect to the embedded SQLite store. The parent directory is created
/// on first start; SQLite is single-writer, so the pool stays small and
/// writes are expected to queue briefly.
pub async fn get_db_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_parent_dir(database_url)?;

    info!("Connecting to database at: {}", database_url);
    let mut options = ConnectOptions::new(database_url.to_string());
    options
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    Ok(db)
}

fn ensure_parent_dir(database_url: &str) -> Result<()> {
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .map(|p| p.split('?').next().unwrap_or(p))
    {
        if path != ":memory:" {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
    }
    Ok(())
}
