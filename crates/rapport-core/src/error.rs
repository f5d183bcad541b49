//! Error types for `rapport-core`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("meeting cannot move from {from} to {to}")]
  InvalidMeetingTransition { from: &'static str, to: &'static str },

  #[error("request cannot move from {from} to {to}")]
  InvalidRequestTransition { from: &'static str, to: &'static str },

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
