//! Signed meeting-response links.
//!
//! A link token is `<payload>.<signature>`, both base64url without padding.
//! The payload is the JSON of [`LinkClaims`]; the signature is HMAC-SHA256
//! over the encoded payload. Whoever holds a valid token may answer for the
//! participant it names, so tokens carry an expiry.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rapport_core::{
  meeting::{Meeting, MeetingTrigger, Participant, ParticipantResponse},
  store::{MeetingStore, NotificationStore},
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::{
  Error, Result,
  scheduling::{ResponseOutcome, apply_response, response_target},
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkClaims {
  pub meeting_id:     Uuid,
  pub participant_id: Uuid,
  pub action:         ParticipantResponse,
  /// Unix seconds.
  pub expires_at:     i64,
}

pub struct LinkSigner {
  mac: HmacSha256,
  ttl: Duration,
}

impl LinkSigner {
  pub fn new(key: impl AsRef<[u8]>, ttl: Duration) -> Result<Self> {
    let key = key.as_ref();
    if key.is_empty() {
      return Err(Error::Invalid("link secret is empty".into()));
    }
    let mac = HmacSha256::new_from_slice(key).map_err(|e| Error::Invalid(e.to_string()))?;
    Ok(Self { mac, ttl })
  }

  /// A token letting the holder answer `action` for one participant.
  pub fn mint(
    &self,
    meeting_id: Uuid,
    participant_id: Uuid,
    action: ParticipantResponse,
  ) -> Result<String> {
    let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
    self.sign(&LinkClaims {
      meeting_id,
      participant_id,
      action,
      expires_at: Utc::now().timestamp().saturating_add(ttl),
    })
  }

  pub fn sign(&self, claims: &LinkClaims) -> Result<String> {
    let json = serde_json::to_vec(claims).map_err(|e| Error::Invalid(e.to_string()))?;
    let payload = URL_SAFE_NO_PAD.encode(json);
    let mut mac = self.mac.clone();
    mac.update(payload.as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{payload}.{sig}"))
  }

  /// Check signature and expiry and return the claims.
  pub fn verify(&self, token: &str) -> Result<LinkClaims> {
    let (payload, sig) = token
      .split_once('.')
      .ok_or_else(|| Error::InvalidLink("malformed token".into()))?;
    let sig = URL_SAFE_NO_PAD
      .decode(sig)
      .map_err(|_| Error::InvalidLink("malformed signature".into()))?;

    let mut mac = self.mac.clone();
    mac.update(payload.as_bytes());
    mac
      .verify_slice(&sig)
      .map_err(|_| Error::InvalidLink("bad signature".into()))?;

    let json = URL_SAFE_NO_PAD
      .decode(payload)
      .map_err(|_| Error::InvalidLink("malformed payload".into()))?;
    let claims: LinkClaims = serde_json::from_slice(&json)
      .map_err(|_| Error::InvalidLink("malformed payload".into()))?;

    if claims.expires_at <= Utc::now().timestamp() {
      return Err(Error::InvalidLink("link has expired".into()));
    }
    Ok(claims)
  }
}

/// What following a link would do, shown before anything is written.
#[derive(Debug, Clone, Serialize)]
pub struct LinkPreview {
  pub action:      ParticipantResponse,
  pub meeting:     Meeting,
  pub participant: Participant,
}

/// Check a link without answering: the token, its meeting and participant,
/// and that the meeting still takes the answer.
pub async fn preview_link<S: MeetingStore>(
  store: &S,
  signer: &LinkSigner,
  token: &str,
) -> Result<LinkPreview> {
  let claims = signer.verify(token)?;
  let (meeting, participant) =
    response_target(store, claims.meeting_id, claims.participant_id).await?;
  meeting.status.apply(MeetingTrigger::Respond(claims.action))?;
  Ok(LinkPreview { action: claims.action, meeting, participant })
}

/// Answer a meeting through a signed link, without a session.
pub async fn respond_via_link<S>(
  store: &S,
  signer: &LinkSigner,
  token: &str,
  suggested_time: Option<String>,
) -> Result<ResponseOutcome>
where
  S: MeetingStore + NotificationStore,
{
  let claims = signer.verify(token)?;
  tracing::debug!(meeting_id = %claims.meeting_id, action = claims.action.as_str(), "response link verified");
  apply_response(
    store,
    claims.meeting_id,
    claims.participant_id,
    claims.action,
    suggested_time,
  )
  .await
}
