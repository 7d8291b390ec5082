use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::{Entity, Plan};
use crate::error::{AppError, Result};
use crate::provider::ProviderKind;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    pub plan_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailableResponse {
    pub integrations: Vec<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

/// GET /api/v1/integrations/available - Configured providers, optionally for one plan
#[tracing::instrument(name = "http.available_integrations", skip(state))]
pub async fn available_integrations(
    State(state): State<AppState>,
    Query(query): Query<AvailableQuery>,
) -> Result<Json<AvailableResponse>> {
    let Some(plan_id) = query.plan_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(Json(AvailableResponse {
            integrations: state.registry.list_available(),
            plan_id: None,
        }));
    };

    let plan = state.store.plans.get(&plan_id).await?;
    if plan.is_deleted() {
        return Err(AppError::NotFound(format!("{} not found: {}", Plan::KIND, plan_id)));
    }

    Ok(Json(AvailableResponse {
        integrations: state.registry.list_available_for_plan(&plan),
        plan_id: Some(plan_id),
    }))
}
