//! Connection requests between users.
//!
//! States run `none → pending → accepted | declined`, with both outcomes
//! terminal. Accepting is a saga of separate writes: the status flip, one
//! contact per direction, and a notification. The store offers no
//! multi-table transaction, so every committed step is logged and a failure
//! part-way is reported as [`Error::PartialWrite`]. Retrying the accept is
//! safe: contacts already materialized (matched by `linked_user_id`) are
//! skipped.

use std::sync::Arc;

use parking_lot::Mutex;
use rapport_core::{
  contact::{ContactSource, NewContact},
  notification::{NewNotification, NotificationKind},
  profile::Profile,
  relationship::{
    Direction, NewRequest, RelationshipRequest, RequestStatus, RequestWithProfile,
  },
  store::RemoteStore,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
  Error, Group, InvalidationBus, Result, Session, Step, Subscription,
  notifications::notify,
};

/// How the signed-in user stands with another user, as the UI renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStatus {
  None,
  /// The viewer asked and is waiting.
  RequestSent,
  /// The other user asked and is waiting on the viewer.
  RequestReceived,
  Connected,
  /// The most recent request was declined; a new one may be sent.
  Declined,
}

#[derive(Default)]
struct Lists {
  incoming: Arc<[RequestWithProfile]>,
  outgoing: Arc<[RequestWithProfile]>,
}

pub struct Relationships<S> {
  session: Arc<Session<S>>,
  lists:   Mutex<Lists>,
}

impl<S: RemoteStore + 'static> Relationships<S> {
  pub fn new(session: Arc<Session<S>>) -> Self {
    Self { session, lists: Mutex::new(Lists::default()) }
  }

  fn me(&self) -> Uuid { self.session.user_id() }

  fn store(&self) -> &S { self.session.store() }

  // ── Lists ─────────────────────────────────────────────────────────────────

  /// Refetch both request lists and replace them together.
  pub async fn reload(&self) -> Result<()> {
    let me = self.me();
    let (incoming, outgoing) = tokio::try_join!(
      async {
        self
          .store()
          .list_requests(me, Direction::Incoming)
          .await
          .map_err(Error::remote)
      },
      async {
        self
          .store()
          .list_requests(me, Direction::Outgoing)
          .await
          .map_err(Error::remote)
      },
    )?;
    *self.lists.lock() = Lists { incoming: incoming.into(), outgoing: outgoing.into() };
    Ok(())
  }

  pub fn incoming(&self) -> Arc<[RequestWithProfile]> { self.lists.lock().incoming.clone() }

  pub fn outgoing(&self) -> Arc<[RequestWithProfile]> { self.lists.lock().outgoing.clone() }

  /// The full refetch after any relationship change, local or remote: both
  /// request lists and the session cache, whose contacts an accept grows.
  pub async fn refetch(&self) -> Result<()> {
    let (lists, cache) = tokio::join!(self.reload(), self.session.cache().invalidate());
    lists.and(cache)
  }

  /// Refetch whenever any session changes a relationship request.
  pub fn watch(self: &Arc<Self>, bus: &InvalidationBus<S>) -> Subscription {
    let this = Arc::downgrade(self);
    bus.subscribe(Group::RelationshipRequests, move || {
      let this = this.upgrade();
      async move {
        match this {
          Some(this) => this.refetch().await,
          None => Ok(()),
        }
      }
    })
  }

  /// Derived from the loaded lists only; never touches the network.
  pub fn status_of(&self, other: Uuid) -> EdgeStatus {
    let lists = self.lists.lock();
    let outgoing = lists
      .outgoing
      .iter()
      .filter(|r| r.request.target_id == other)
      .map(|r| (Direction::Outgoing, r.request.status));
    let incoming = lists
      .incoming
      .iter()
      .filter(|r| r.request.requester_id == other)
      .map(|r| (Direction::Incoming, r.request.status));

    let mut status = EdgeStatus::None;
    for (direction, request_status) in outgoing.chain(incoming) {
      let candidate = match (direction, request_status) {
        (_, RequestStatus::Accepted) => return EdgeStatus::Connected,
        (Direction::Outgoing, RequestStatus::Pending) => EdgeStatus::RequestSent,
        (Direction::Incoming, RequestStatus::Pending) => EdgeStatus::RequestReceived,
        (_, RequestStatus::Declined) => EdgeStatus::Declined,
      };
      if status == EdgeStatus::None || status == EdgeStatus::Declined {
        status = candidate;
      }
    }
    status
  }

  /// Refetch after a write. The write already committed, so a failure is
  /// only logged.
  async fn refetch_after_write(&self) {
    if let Err(e) = self.refetch().await {
      tracing::warn!(user_id = %self.me(), error = %e, "refetch after request change failed");
    }
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Ask `target` to connect.
  ///
  /// Fails with [`Error::Conflict`] if a pending or accepted request already
  /// joins the pair in either direction.
  pub async fn send_request(&self, target: Uuid) -> Result<RelationshipRequest> {
    let me = self.me();
    if target == me {
      return Err(Error::Invalid("cannot send a connection request to yourself".into()));
    }

    let existing = self
      .store()
      .requests_between(me, target)
      .await
      .map_err(Error::remote)?;
    if let Some(active) = existing.iter().find(|r| r.status.is_active()) {
      return Err(Error::Conflict(format!(
        "a {} connection request already exists with {target}",
        active.status.as_str()
      )));
    }

    let request = self
      .store()
      .add_request(NewRequest { requester_id: me, target_id: target })
      .await
      .map_err(Error::remote)?;
    tracing::info!(request_id = %request.request_id, requester = %me, %target, "connection requested");

    notify(self.store(), NewNotification {
      recipient_id: target,
      kind:         NotificationKind::ConnectionRequest,
      title:        "New connection request".into(),
      message:      format!("{} wants to connect with you", self.session.display_name()),
      payload:      json!({ "request_id": request.request_id, "requester_id": me }),
    })
    .await;

    self.refetch_after_write().await;
    Ok(request)
  }

  /// Accept an incoming request and materialize a contact on each side.
  pub async fn accept(&self, request_id: Uuid) -> Result<RelationshipRequest> {
    let me = self.me();
    let request = self.incoming_request(request_id).await?;
    let retry = request.status == RequestStatus::Accepted;
    if !retry {
      request.status.transition(RequestStatus::Accepted)?;
    }

    let requester = self.profile(request.requester_id).await?;
    let acceptor = self.profile(me).await?;

    let mut done = Vec::new();
    let request = if retry {
      tracing::info!(%request_id, "resuming accept");
      request
    } else {
      let flipped = self
        .store()
        .set_request_status(request_id, RequestStatus::Accepted)
        .await
        .map_err(Error::remote)?
        .ok_or_else(|| Error::not_found("request", request_id))?;
      done.push(Step::RequestAccepted);
      flipped
    };

    let mut created = self
      .materialize(me, &requester)
      .await
      .map_err(|e| e.after(&done))?;
    done.push(Step::ContactForAcceptor);

    created |= self
      .materialize(request.requester_id, &acceptor)
      .await
      .map_err(|e| e.after(&done))?;
    done.push(Step::ContactForRequester);

    tracing::info!(%request_id, requester = %request.requester_id, acceptor = %me, "connection accepted");

    // A repeat accept of a finished saga changes nothing and stays quiet.
    if !retry || created {
      notify(self.store(), NewNotification {
        recipient_id: request.requester_id,
        kind:         NotificationKind::ConnectionAccepted,
        title:        "Connection accepted".into(),
        message:      format!("{} accepted your connection request", acceptor.full_name),
        payload:      json!({ "request_id": request_id, "user_id": me }),
      })
      .await;
    }

    self.refetch_after_write().await;
    Ok(request)
  }

  /// Decline an incoming pending request. A single write with no side
  /// effects.
  pub async fn decline(&self, request_id: Uuid) -> Result<RelationshipRequest> {
    let request = self.incoming_request(request_id).await?;
    request.status.transition(RequestStatus::Declined)?;

    let request = self
      .store()
      .set_request_status(request_id, RequestStatus::Declined)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("request", request_id))?;
    tracing::info!(%request_id, "connection declined");

    self.refetch_after_write().await;
    Ok(request)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  /// Fetch a request and check the signed-in user is its target.
  async fn incoming_request(&self, request_id: Uuid) -> Result<RelationshipRequest> {
    let request = self
      .store()
      .get_request(request_id)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("request", request_id))?;
    if request.target_id != self.me() {
      return Err(Error::Forbidden("only the target may answer a request".into()));
    }
    Ok(request)
  }

  async fn profile(&self, user_id: Uuid) -> Result<Profile> {
    self
      .store()
      .get_profile(user_id)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("profile", user_id))
  }

  /// Give `owner` a contact copied from `profile`, unless one linked to that
  /// user already exists. Returns whether a contact was written.
  async fn materialize(&self, owner: Uuid, profile: &Profile) -> Result<bool> {
    let existing = self
      .store()
      .find_linked_contact(owner, profile.user_id)
      .await
      .map_err(Error::remote)?;
    if existing.is_some() {
      tracing::debug!(%owner, linked = %profile.user_id, "contact already present");
      return Ok(false);
    }
    self
      .store()
      .add_contact(NewContact::from_profile(owner, profile, ContactSource::Connection))
      .await
      .map_err(Error::remote)?;
    Ok(true)
  }
}
