//! Storage collaborator for users, plans, subscriptions, integrations,
//! messages and message statuses.
//!
//! Each entity gets its own [`Repository`]; [`Store`] bundles them so the
//! dispatch engine and webhook pipeline can share one handle. Backends:
//! - `memory`: `DashMap`, lost on restart
//! - `postgres`: one JSONB table keyed by `(kind, id)`

mod factory;
mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Entity, Integration, Message, MessageStatus, Plan, User, UserPlan};

pub use factory::create_store;
pub use memory::MemoryRepository;
pub use postgres::{PostgresRepository, ENTITY_SCHEMA};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row does not exist (or was soft-deleted, for mutations)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// `create` with an id that is already taken
    #[error("{entity} already exists: {id}")]
    Conflict { entity: &'static str, id: String },

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Stored row could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found<T: Entity>(id: &str) -> Self {
        StoreError::NotFound {
            entity: T::KIND,
            id: id.to_string(),
        }
    }

    pub fn conflict<T: Entity>(id: &str) -> Self {
        StoreError::Conflict {
            entity: T::KIND,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD access to one entity type.
///
/// `create` never overwrites: an id already in use, soft-deleted rows
/// included, fails with [`StoreError::Conflict`].
/// `get` and `list` include soft-deleted rows; `update` and `delete`
/// refuse them with [`StoreError::NotFound`]. `list` returns rows in
/// insertion order.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn create(&self, item: T) -> StoreResult<T>;
    async fn get(&self, id: &str) -> StoreResult<T>;
    async fn list(&self) -> StoreResult<Vec<T>>;
    async fn update(&self, id: &str, item: T) -> StoreResult<T>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Assigns an id (when absent) and fresh timestamps to a new row.
pub(crate) fn prepare_new<T: Entity>(mut item: T) -> T {
    if item.id().trim().is_empty() {
        item.set_id(Uuid::new_v4().to_string());
    }
    let now = Utc::now();
    let timestamps = item.timestamps_mut();
    timestamps.created_at = now;
    timestamps.updated_at = now;
    timestamps.deleted_at = None;
    item
}

/// Carries identity and creation time of `existing` over to `incoming`.
pub(crate) fn prepare_update<T: Entity>(existing: &T, mut incoming: T) -> T {
    incoming.set_id(existing.id().to_string());
    let created_at = existing.timestamps().created_at;
    let timestamps = incoming.timestamps_mut();
    timestamps.created_at = created_at;
    timestamps.updated_at = Utc::now();
    timestamps.deleted_at = None;
    incoming
}

/// Handle to every repository.
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn Repository<User>>,
    pub plans: Arc<dyn Repository<Plan>>,
    pub user_plans: Arc<dyn Repository<UserPlan>>,
    pub integrations: Arc<dyn Repository<Integration>>,
    pub messages: Arc<dyn Repository<Message>>,
    pub message_statuses: Arc<dyn Repository<MessageStatus>>,
    backend: &'static str,
}

impl Store {
    /// Create a store backed by in-memory maps
    pub fn memory() -> Self {
        Self {
            users: Arc::new(MemoryRepository::<User>::new()),
            plans: Arc::new(MemoryRepository::<Plan>::new()),
            user_plans: Arc::new(MemoryRepository::<UserPlan>::new()),
            integrations: Arc::new(MemoryRepository::<Integration>::new()),
            messages: Arc::new(MemoryRepository::<Message>::new()),
            message_statuses: Arc::new(MemoryRepository::<MessageStatus>::new()),
            backend: "memory",
        }
    }

    /// Create a store backed by the `entities` table
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            users: Arc::new(PostgresRepository::<User>::new(pool.clone())),
            plans: Arc::new(PostgresRepository::<Plan>::new(pool.clone())),
            user_plans: Arc::new(PostgresRepository::<UserPlan>::new(pool.clone())),
            integrations: Arc::new(PostgresRepository::<Integration>::new(pool.clone())),
            messages: Arc::new(PostgresRepository::<Message>::new(pool.clone())),
            message_statuses: Arc::new(PostgresRepository::<MessageStatus>::new(pool)),
            backend: "postgres",
        }
    }

    /// Backend type identifier
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Repository for `T`
    pub fn repository<T: Stored>(&self) -> &Arc<dyn Repository<T>> {
        T::repository(self)
    }
}

/// Entities that have a repository in [`Store`].
pub trait Stored: Entity {
    fn repository(store: &Store) -> &Arc<dyn Repository<Self>>;
}

macro_rules! impl_stored {
    ($ty:ty, $field:ident) => {
        impl Stored for $ty {
            fn repository(store: &Store) -> &Arc<dyn Repository<Self>> {
                &store.$field
            }
        }
    };
}

impl_stored!(User, users);
impl_stored!(Plan, plans);
impl_stored!(UserPlan, user_plans);
impl_stored!(Integration, integrations);
impl_stored!(Message, messages);
impl_stored!(MessageStatus, message_statuses);
