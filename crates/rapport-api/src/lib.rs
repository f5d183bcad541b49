//! HTTP surface for Rapport's signed meeting-response links.
//!
//! Exposes an axum [`Router`] with the unauthenticated `/respond` endpoint
//! backed by any store implementing the meeting and notification traits.
//! `GET /respond` only checks the link and describes it, so mail scanners
//! that prefetch URLs record nothing; the answer is written by a `POST` of
//! the same token.

pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::{Form, Query, State},
  routing::get,
};
use rapport_client::{ClientConfig, LinkSigner, preview_link, respond_via_link};
use rapport_core::{
  meeting::{MeetingStatus, ParticipantResponse},
  store::{MeetingStore, NotificationStore},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use error::Result;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `RAPPORT_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:        String,
  pub port:        u16,
  pub store_path:  PathBuf,
  /// Hex-encoded HMAC key for response links.
  pub link_secret: String,
  #[serde(default)]
  pub client:      ClientConfig,
}

impl ServerConfig {
  pub fn signer(&self) -> Result<LinkSigner> {
    let key = hex::decode(self.link_secret.trim())
      .map_err(|e| Error::Config(format!("link_secret is not hex: {e}")))?;
    Ok(LinkSigner::new(key, self.client.link_ttl)?)
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub signer: Arc<LinkSigner>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), signer: self.signer.clone() }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

pub fn router<S>(state: AppState<S>) -> Router
where
  S: MeetingStore + NotificationStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .route("/respond", get(preview::<S>).post(respond::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> &'static str { "ok" }

#[derive(Deserialize)]
pub struct RespondForm {
  pub token:          String,
  pub suggested_time: Option<String>,
}

#[derive(Deserialize)]
pub struct PreviewQuery {
  pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewBody {
  pub meeting_id:     Uuid,
  pub participant_id: Uuid,
  pub title:          String,
  pub action:         ParticipantResponse,
  pub status:         MeetingStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RespondBody {
  pub meeting_id:     Uuid,
  pub participant_id: Uuid,
  pub status:         MeetingStatus,
  pub response:       Option<ParticipantResponse>,
}

async fn preview<S>(
  State(state): State<AppState<S>>,
  Query(query): Query<PreviewQuery>,
) -> Result<Json<PreviewBody>>
where
  S: MeetingStore + NotificationStore + 'static,
{
  let preview = preview_link(state.store.as_ref(), &state.signer, &query.token).await?;
  Ok(Json(PreviewBody {
    meeting_id:     preview.meeting.meeting_id,
    participant_id: preview.participant.participant_id,
    title:          preview.meeting.title,
    action:         preview.action,
    status:         preview.meeting.status,
  }))
}

async fn respond<S>(
  State(state): State<AppState<S>>,
  Form(form): Form<RespondForm>,
) -> Result<Json<RespondBody>>
where
  S: MeetingStore + NotificationStore + 'static,
{
  let outcome = respond_via_link(
    state.store.as_ref(),
    &state.signer,
    &form.token,
    form.suggested_time,
  )
  .await?;

  Ok(Json(RespondBody {
    meeting_id:     outcome.meeting.meeting_id,
    participant_id: outcome.participant.participant_id,
    status:         outcome.meeting.status,
    response:       outcome.participant.response,
  }))
}

// ─── Integration tests ────────────────────────────────────────────────────────
