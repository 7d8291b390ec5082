//! Store factory

use crate::config::DatabaseConfig;
use crate::postgres::PostgresPool;

use super::{Store, ENTITY_SCHEMA};

/// Create a store based on configuration.
///
/// - `"postgres"`: connects, applies the schema and returns a PostgreSQL store;
///   on any failure it logs and falls back to memory
/// - `"memory"` (default): in-memory store
pub async fn create_store(config: &DatabaseConfig) -> Store {
    match config.backend.as_str() {
        "postgres" => match connect(config).await {
            Ok(pool) => {
                tracing::info!(
                    backend = "postgres",
                    url = %pool.database_url_masked(),
                    "Creating PostgreSQL store"
                );
                Store::postgres(pool.pool().clone())
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "PostgreSQL store requested but unavailable, falling back to memory"
                );
                Store::memory()
            }
        },
        _ => {
            tracing::info!(backend = "memory", "Creating memory store");
            Store::memory()
        }
    }
}

async fn connect(config: &DatabaseConfig) -> Result<PostgresPool, sqlx::Error> {
    let pool = PostgresPool::new(config).await?;
    for statement in ENTITY_SCHEMA {
        sqlx::query(statement).execute(pool.pool()).await?;
    }
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_by_default() {
        let store = create_store(&DatabaseConfig::default()).await;
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn test_unknown_backend_falls_back_to_memory() {
        let config = DatabaseConfig {
            backend: "sqlite".to_string(),
            ..DatabaseConfig::default()
        };
        let store = create_store(&config).await;
        assert_eq!(store.backend(), "memory");
    }
}
