//! PostgreSQL-backed repository.
//!
//! All entity types share the `entities` table; rows are discriminated by
//! `kind` and hold the serialized entity as JSONB. The `seq` column gives
//! listing a stable insertion order.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::domain::Entity;

use super::{prepare_new, prepare_update, Repository, StoreError, StoreResult};

/// DDL applied at startup by the store factory.
pub const ENTITY_SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS entities (
        seq BIGSERIAL,
        kind TEXT NOT NULL,
        id TEXT NOT NULL,
        data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        deleted_at TIMESTAMPTZ,
        PRIMARY KEY (kind, id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS entities_kind_seq_idx ON entities (kind, seq)",
];

/// PostgreSQL repository for one entity type.
pub struct PostgresRepository<T: Entity> {
    pool: PgPool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> PostgresRepository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    async fn write(&self, item: &T) -> StoreResult<()> {
        let data = serde_json::to_value(item)?;
        let timestamps = item.timestamps();

        let result = sqlx::query(
            r#"
            UPDATE entities
            SET data = $3, updated_at = $4, deleted_at = $5
            WHERE kind = $1 AND id = $2
            "#,
        )
        .bind(T::KIND)
        .bind(item.id())
        .bind(&data)
        .bind(timestamps.updated_at)
        .bind(timestamps.deleted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found::<T>(item.id()));
        }
        Ok(())
    }

    async fn live(&self, id: &str) -> StoreResult<T> {
        let item = self.get(id).await?;
        if item.is_deleted() {
            return Err(StoreError::not_found::<T>(id));
        }
        Ok(item)
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for PostgresRepository<T> {
    async fn create(&self, item: T) -> StoreResult<T> {
        let item = prepare_new(item);
        let data = serde_json::to_value(&item)?;
        let timestamps = item.timestamps();

        sqlx::query(
            r#"
            INSERT INTO entities (kind, id, data, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, NULL)
            "#,
        )
        .bind(T::KIND)
        .bind(item.id())
        .bind(&data)
        .bind(timestamps.created_at)
        .bind(timestamps.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::conflict::<T>(item.id())
            }
            other => StoreError::Postgres(other),
        })?;

        tracing::trace!(kind = T::KIND, id = %item.id(), "Row inserted into PostgreSQL");
        Ok(item)
    }

    async fn get(&self, id: &str) -> StoreResult<T> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT data FROM entities WHERE kind = $1 AND id = $2")
                .bind(T::KIND)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((data,)) => Ok(serde_json::from_value(data)?),
            None => Err(StoreError::not_found::<T>(id)),
        }
    }

    async fn list(&self) -> StoreResult<Vec<T>> {
        let rows: Vec<(serde_json::Value,)> =
            sqlx::query_as("SELECT data FROM entities WHERE kind = $1 ORDER BY seq ASC")
                .bind(T::KIND)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(data,)| serde_json::from_value(data).map_err(StoreError::from))
            .collect()
    }

    async fn update(&self, id: &str, item: T) -> StoreResult<T> {
        let existing = self.live(id).await?;
        let updated = prepare_update(&existing, item);
        self.write(&updated).await?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut existing = self.live(id).await?;

        let now = Utc::now();
        let timestamps = existing.timestamps_mut();
        timestamps.deleted_at = Some(now);
        timestamps.updated_at = now;

        self.write(&existing).await
    }
}
