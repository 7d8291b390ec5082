//! Generic CRUD endpoints for stored entities.
//!
//! Soft-deleted rows are hidden from every endpoint here: they are left out
//! of listings and answer 404 on direct access.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Integration, Message, MessageStatus, Plan, User, UserPlan};
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::store::Stored;

/// Entities exposed through the management API.
pub trait Resource: Stored {
    /// Normalize and check a row before it is first stored.
    fn prepare_create(&mut self) -> Result<()> {
        Ok(())
    }

    /// Normalize and check a replacement for the live row `existing`.
    fn prepare_update(&mut self, _existing: &Self) -> Result<()> {
        self.prepare_create()
    }
}

fn required(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

impl Resource for User {
    fn prepare_create(&mut self) -> Result<()> {
        self.name = self.name.trim().to_string();
        required(&self.name, "name")?;
        if self.api_key.trim().is_empty() {
            self.api_key = Uuid::new_v4().simple().to_string();
        }
        Ok(())
    }

    fn prepare_update(&mut self, existing: &Self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            self.api_key = existing.api_key.clone();
        }
        self.prepare_create()
    }
}

impl Resource for Plan {
    fn prepare_create(&mut self) -> Result<()> {
        required(&self.name, "name")?;
        if self.price_cents < 0 {
            return Err(AppError::Validation("price cannot be negative".to_string()));
        }
        Ok(())
    }
}

impl Resource for UserPlan {
    fn prepare_create(&mut self) -> Result<()> {
        required(&self.user_id, "user_id")?;
        required(&self.plan_id, "plan_id")
    }
}

impl Resource for Integration {
    fn prepare_create(&mut self) -> Result<()> {
        required(&self.name, "name")?;
        required(&self.plan_id, "plan_id")
    }
}

impl Resource for Message {
    /// Sender, integration, kind and gateway id belong to the send that
    /// produced the message.
    fn prepare_update(&mut self, existing: &Self) -> Result<()> {
        self.user_id = existing.user_id.clone();
        self.integration_id = existing.integration_id.clone();
        self.kind = existing.kind;
        self.external_id = existing.external_id.clone();
        Ok(())
    }
}

impl Resource for MessageStatus {
    /// Status rows form an append-only log, so ids are always server-assigned.
    fn prepare_create(&mut self) -> Result<()> {
        self.id.clear();
        required(&self.message_id, "message_id")
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

async fn live<T: Resource>(state: &AppState, id: &str) -> Result<T> {
    let row = state.store.repository::<T>().get(id).await?;
    if row.is_deleted() {
        return Err(AppError::NotFound(format!("{} not found: {}", T::KIND, id)));
    }
    Ok(row)
}

/// POST /api/v1/{resource}
#[tracing::instrument(name = "http.create_resource", skip(state, item), fields(kind = T::KIND))]
pub async fn create_resource<T: Resource>(
    State(state): State<AppState>,
    Json(mut item): Json<T>,
) -> Result<(StatusCode, Json<T>)> {
    item.prepare_create()?;
    let created = state.store.repository::<T>().create(item).await?;
    tracing::info!(id = %created.id(), "Resource created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/{resource}
#[tracing::instrument(name = "http.list_resources", skip(state), fields(kind = T::KIND))]
pub async fn list_resources<T: Resource>(State(state): State<AppState>) -> Result<Json<ListResponse<T>>> {
    let items: Vec<T> = state
        .store
        .repository::<T>()
        .list()
        .await?
        .into_iter()
        .filter(|item| !item.is_deleted())
        .collect();
    let total = items.len();

    Ok(Json(ListResponse { items, total }))
}

/// GET /api/v1/{resource}/{id}
#[tracing::instrument(name = "http.get_resource", skip(state), fields(kind = T::KIND))]
pub async fn get_resource<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<T>> {
    Ok(Json(live::<T>(&state, &id).await?))
}

/// PUT /api/v1/{resource}/{id}
#[tracing::instrument(name = "http.update_resource", skip(state, item), fields(kind = T::KIND))]
pub async fn update_resource<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut item): Json<T>,
) -> Result<Json<T>> {
    let existing = live::<T>(&state, &id).await?;
    item.prepare_update(&existing)?;
    let updated = state.store.repository::<T>().update(&id, item).await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/{resource}/{id} (soft delete)
#[tracing::instrument(name = "http.delete_resource", skip(state), fields(kind = T::KIND))]
pub async fn delete_resource<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.store.repository::<T>().delete(&id).await?;
    tracing::info!(id = %id, "Resource deleted");
    Ok(StatusCode::NO_CONTENT)
}
