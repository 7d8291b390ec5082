//! Message dispatch and direct email endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::domain::Message;
use crate::error::{AppError, Result};
use crate::provider::{OutboundEmail, ProviderKind};
use crate::server::AppState;

/// POST /api/v1/messages - Send a message through its integration
#[tracing::instrument(
    name = "http.create_message",
    skip(state, message),
    fields(user_id = %message.user_id, integration_id = %message.integration_id)
)]
pub async fn create_message(
    State(state): State<AppState>,
    Json(mut message): Json<Message>,
) -> Result<(StatusCode, Json<Message>)> {
    // Every send creates a new message; the gateway assigns the external id
    message.id.clear();
    message.external_id.clear();

    let stored = state.engine.send(message).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub to_email: String,
    #[serde(default)]
    pub to_name: Option<String>,
    pub subject: String,
    pub plain_text: String,
    #[serde(default)]
    pub html_content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub ok: bool,
    pub message_id: String,
}

/// POST /api/v1/emails/send - Send an email outside the dispatch flow
#[tracing::instrument(name = "http.send_email", skip(state, request), fields(to = %request.to_email))]
pub async fn send_email(
    State(state): State<AppState>,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>> {
    if !request.to_email.contains('@') {
        return Err(AppError::Validation("to_email must be an email address".to_string()));
    }
    if request.subject.trim().is_empty() || request.plain_text.trim().is_empty() {
        return Err(AppError::Validation("subject and plain_text are required".to_string()));
    }

    let adapter = state
        .registry
        .email()
        .ok_or_else(|| AppError::NotConfigured(format!("{} handler not configured", ProviderKind::SendGrid)))?;

    let message_id = adapter
        .send_email(OutboundEmail {
            to_email: &request.to_email,
            to_name: request.to_name.as_deref(),
            subject: &request.subject,
            plain_text: &request.plain_text,
            html: request.html_content.as_deref(),
        })
        .await?;

    Ok(Json(SendEmailResponse {
        ok: true,
        message_id,
    }))
}
