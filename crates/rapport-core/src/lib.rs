//! Core types and trait definitions for the Rapport contact and meeting
//! client.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! describes the records the client works with and the narrow interface of
//! the remote store the client talks to.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod change;
pub mod contact;
pub mod error;
pub mod introduction;
pub mod meeting;
pub mod notification;
pub mod profile;
pub mod relationship;
pub mod store;

pub use error::{Error, Result};
