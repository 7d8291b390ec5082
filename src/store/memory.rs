//! In-memory repository using DashMap.
//!
//! Rows are lost on service restart. Each row remembers its insertion
//! sequence so listing is stable across calls.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::Entity;

use super::{prepare_new, prepare_update, Repository, StoreError, StoreResult};

/// In-memory repository for one entity type.
pub struct MemoryRepository<T: Entity> {
    /// Rows keyed by id, tagged with their insertion sequence
    rows: DashMap<String, (u64, T)>,
    next_seq: AtomicU64,
}

impl<T: Entity> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> MemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Number of stored rows, soft-deleted included
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn live(&self, id: &str) -> StoreResult<T> {
        match self.rows.get(id) {
            Some(row) if !row.1.is_deleted() => Ok(row.1.clone()),
            _ => Err(StoreError::not_found::<T>(id)),
        }
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn create(&self, item: T) -> StoreResult<T> {
        let item = prepare_new(item);
        match self.rows.entry(item.id().to_string()) {
            Entry::Occupied(_) => return Err(StoreError::conflict::<T>(item.id())),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert((seq, item.clone()));
            }
        }

        tracing::trace!(kind = T::KIND, id = %item.id(), "Row created in memory store");
        Ok(item)
    }

    async fn get(&self, id: &str) -> StoreResult<T> {
        self.rows
            .get(id)
            .map(|row| row.1.clone())
            .ok_or_else(|| StoreError::not_found::<T>(id))
    }

    async fn list(&self) -> StoreResult<Vec<T>> {
        let mut rows: Vec<(u64, T)> = self
            .rows
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);

        Ok(rows.into_iter().map(|(_, item)| item).collect())
    }

    async fn update(&self, id: &str, item: T) -> StoreResult<T> {
        let existing = self.live(id)?;
        let updated = prepare_update(&existing, item);

        if let Some(mut row) = self.rows.get_mut(id) {
            row.1 = updated.clone();
        }

        Ok(updated)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.live(id)?;

        if let Some(mut row) = self.rows.get_mut(id) {
            let now = Utc::now();
            let timestamps = row.1.timestamps_mut();
            timestamps.deleted_at = Some(now);
            timestamps.updated_at = now;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, User};

    fn user(name: &str) -> User {
        User {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = MemoryRepository::<User>::new();

        let created = repo.create(user("alice")).await.unwrap();
        let fetched = repo.get(&created.id).await.unwrap();

        assert_eq!(fetched.name, "alice");
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_create_never_overwrites() {
        let repo = MemoryRepository::<User>::new();
        let mut first = user("alice");
        first.id = "u1".to_string();
        repo.create(first).await.unwrap();

        let mut second = user("mallory");
        second.id = "u1".to_string();
        let err = repo.create(second).await.unwrap_err();

        assert!(matches!(err, StoreError::Conflict { entity: "user", .. }));
        assert_eq!(repo.get("u1").await.unwrap().name, "alice");
        assert_eq!(repo.len(), 1);

        // Soft-deleted ids stay reserved
        repo.delete("u1").await.unwrap();
        let mut third = user("carol");
        third.id = "u1".to_string();
        assert!(repo.create(third).await.is_err());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = MemoryRepository::<User>::new();
        let err = repo.get("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let repo = MemoryRepository::<Message>::new();

        for external_id in ["first", "second", "third"] {
            repo.create(Message {
                external_id: external_id.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let listed: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.external_id)
            .collect();
        assert_eq!(listed, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let repo = MemoryRepository::<User>::new();
        let created = repo.create(user("alice")).await.unwrap();

        let updated = repo.update(&created.id, user("alicia")).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(repo.get(&created.id).await.unwrap().name, "alicia");
    }

    #[tokio::test]
    async fn test_delete_is_soft() {
        let repo = MemoryRepository::<User>::new();
        let created = repo.create(user("alice")).await.unwrap();

        repo.delete(&created.id).await.unwrap();

        let fetched = repo.get(&created.id).await.unwrap();
        assert!(fetched.is_deleted());
        assert_eq!(repo.list().await.unwrap().len(), 1);

        // Deleted rows cannot be mutated again
        assert!(repo.delete(&created.id).await.unwrap_err().is_not_found());
        assert!(repo
            .update(&created.id, user("bob"))
            .await
            .unwrap_err()
            .is_not_found());
    }
}
