//! Source connectors
//!
//! Each connector wraps one external registry/search endpoint behind a
//! uniform contract: `fetch(npi) -> SourceOutcome<Record>`. Ordinary
//! unavailability (timeout, non-success status, unparseable body) is a
//! value, never an error — a connector raises only for programmer-level
//! faults such as malformed configuration. Each connector owns a private
//! TTL cache namespace keyed by subject identifier.

pub mod cache;
pub mod exclusion;
pub mod legal_search;
pub mod registry;
pub mod utilization;

pub use cache::TtlCache;
pub use exclusion::ExclusionConnector;
pub use legal_search::{LegalSearchConnector, LegalSearchResult, SearchHit};
pub use registry::{IdentityRecord, RegistryConnector};
pub use utilization::UtilizationConnector;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::profile::SourceHealth;

// ─── Clock ─────────────────────────────────────────────────────────

/// Injected time source.
///
/// Connectors and the legal classifier never call `Utc::now()` directly;
/// they read the clock they were constructed with, so tests can pin "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed time, for deterministic tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ─── Source Outcome ────────────────────────────────────────────────

/// Why a source was unavailable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The request timed out
    Timeout,
    /// Non-success HTTP status
    HttpStatus(u16),
    /// Transport-level failure (DNS, connection refused, TLS)
    Network(String),
    /// The response arrived but could not be parsed
    Malformed(String),
    /// Task-level failure inside the fan-out
    Internal(String),
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::HttpStatus(code) => write!(f, "HTTP {code}"),
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Malformed(e) => write!(f, "malformed response: {e}"),
            Self::Internal(e) => write!(f, "internal: {e}"),
        }
    }
}

/// The uniform connector result.
///
/// `NoData` means the source answered authoritatively that it holds no
/// record for this subject — that is information, and it earns partial
/// data-quality credit. `Unavailable` means we learned nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceOutcome<T> {
    Ok(T),
    NoData { message: String },
    Unavailable { reason: UnavailableReason },
}

impl<T> SourceOutcome<T> {
    pub fn no_data(message: impl Into<String>) -> Self {
        Self::NoData {
            message: message.into(),
        }
    }

    pub fn unavailable(reason: UnavailableReason) -> Self {
        Self::Unavailable { reason }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Ok(v) => Some(v),
            _ => None,
        }
    }

    /// Health classification used by the data-quality score
    pub fn health(&self) -> SourceHealth {
        match self {
            Self::Ok(_) => SourceHealth::Available,
            Self::NoData { .. } => SourceHealth::EmptyAnswer,
            Self::Unavailable { .. } => SourceHealth::Failed,
        }
    }
}

/// Map a reqwest failure onto an unavailability reason
pub(crate) fn classify_request_error(err: &reqwest::Error) -> UnavailableReason {
    if err.is_timeout() {
        UnavailableReason::Timeout
    } else if err.is_connect() || err.is_request() {
        UnavailableReason::Network(err.to_string())
    } else if err.is_decode() {
        UnavailableReason::Malformed(err.to_string())
    } else {
        UnavailableReason::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_health_mapping() {
        assert_eq!(SourceOutcome::Ok(1u32).health(), SourceHealth::Available);
        assert_eq!(
            SourceOutcome::<u32>::no_data("not found").health(),
            SourceHealth::EmptyAnswer
        );
        assert_eq!(
            SourceOutcome::<u32>::unavailable(UnavailableReason::Timeout).health(),
            SourceHealth::Failed
        );
    }

    #[test]
    fn fixed_clock_is_fixed() {
        let t = chrono::Utc::now();
        let clock = FixedClock(t);
        assert_eq!(clock.now(), t);
        assert_eq!(clock.now(), t);
    }
}
