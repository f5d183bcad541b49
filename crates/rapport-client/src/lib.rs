//! Client-side consistency layer for Rapport.
//!
//! Everything here sits between the UI and a [`RemoteStore`]: a read-through
//! cache of the signed-in user's own records, a search coordinator that
//! survives out-of-order responses, the relationship and scheduling state
//! machines, and an invalidation bus that turns remote change events into
//! refetches.
//!
//! All components hang off one [`Session`], created at sign-in and dropped
//! at sign-out.
//!
//! [`RemoteStore`]: rapport_core::store::RemoteStore

pub mod bus;
pub mod cache;
pub mod config;
pub mod contacts;
pub mod error;
pub mod introductions;
pub mod link;
pub mod notifications;
pub mod relationship;
pub mod scheduling;
pub mod search;
pub mod session;

pub use bus::{Group, InvalidationBus, Subscription};
pub use cache::{ReadThroughCache, Snapshot};
pub use config::ClientConfig;
pub use contacts::ContactBook;
pub use error::{Error, Result, Step};
pub use introductions::Introductions;
pub use link::{LinkClaims, LinkPreview, LinkSigner, preview_link, respond_via_link};
pub use notifications::NotificationFeed;
pub use relationship::{EdgeStatus, Relationships};
pub use scheduling::{MeetingDraft, ResponseOutcome, Scheduler, apply_response};
pub use search::{SearchCoordinator, SearchHit, SearchOutcome};
pub use session::Session;

#[cfg(test)]
mod testing;
