//! SQLite backend for the Rapport remote store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every committed write is announced on
//! an in-process change feed, standing in for the push channel of a hosted
//! backend.

mod contacts;
mod encode;
mod introductions;
mod meetings;
mod notifications;
mod profiles;
mod requests;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
