//! Provider status callbacks. Public: gateways do not send the API key.

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::webhook::{GenericWebhook, SendGridEvent};

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub ok: bool,
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

/// POST /api/v1/webhooks/sendgrid - Batch of SendGrid events
pub async fn sendgrid_webhook(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Vec<SendGridEvent>>, JsonRejection>,
) -> Result<Json<BatchResponse>> {
    let Json(events) = payload.map_err(|e| {
        tracing::warn!(error = %e, "Malformed SendGrid webhook body");
        AppError::Validation("invalid event format".to_string())
    })?;

    let summary = state.webhooks.process_sendgrid(&events).await;
    Ok(Json(BatchResponse {
        ok: true,
        processed: summary.processed,
        total: summary.total,
    }))
}

/// POST /api/v1/webhooks/twilio - Form-encoded status callback, JSON otherwise
pub async fn twilio_webhook(State(state): State<AppState>, request: Request) -> Result<Json<AckResponse>> {
    let form_encoded = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    if form_encoded {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(format!("failed to parse form: {}", e)))?;
        state.webhooks.process_twilio_form(&fields).await?;
    } else {
        let Json(body) = Json::<GenericWebhook>::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(format!("invalid JSON body: {}", e)))?;
        state.webhooks.process_generic(&body).await?;
    }

    Ok(Json(AckResponse { ok: true }))
}
