//! Tunables for a client session.
//!
//! Durations are written in whole seconds when deserialised, so a server
//! config can carry them as plain integers:
//!
//! ```toml
//! [client]
//! freshness_window = 30
//! link_ttl = 1209600
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  /// How long a cache snapshot counts as fresh.
  #[serde(deserialize_with = "seconds")]
  pub freshness_window:           Duration,
  /// Queries shorter than this clear the results instead of searching.
  pub search_min_len:             usize,
  /// Distinct queries remembered by the search result cache.
  pub search_cache_capacity:      usize,
  pub search_result_limit:        usize,
  /// Introductions one sender may make in a rolling 30-day window.
  pub introduction_monthly_limit: usize,
  /// Lifetime of a signed meeting-response link.
  #[serde(deserialize_with = "seconds")]
  pub link_ttl:                   Duration,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      freshness_window:           Duration::from_secs(30),
      search_min_len:             2,
      search_cache_capacity:      50,
      search_result_limit:        20,
      introduction_monthly_limit: 10,
      link_ttl:                   Duration::from_secs(14 * 24 * 60 * 60),
    }
  }
}

fn seconds<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
  u64::deserialize(d).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_fields_take_defaults() {
    let cfg: ClientConfig =
      serde_json::from_str(r#"{ "freshness_window": 5, "search_min_len": 3 }"#).unwrap();
    assert_eq!(cfg.freshness_window, Duration::from_secs(5));
    assert_eq!(cfg.search_min_len, 3);
    assert_eq!(cfg.search_cache_capacity, 50);
    assert_eq!(cfg.link_ttl, ClientConfig::default().link_ttl);
  }
}
