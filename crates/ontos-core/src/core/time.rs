// crates/ontos-core/src/core/time.rs
// ============================================================================
// Module: Ontos Time Model
// Description: Unix-millisecond timestamps for token lifecycle fields.
// Purpose: Give stores and transports one comparable, serializable time value.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Token creation, expiry, and last-use times are stored as unix epoch
//! milliseconds. Wall-clock reads happen only through [`Timestamp::now`] so
//! tests can pin `now` explicitly when validating expiry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Iso8601;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Milliseconds in one day.
const MILLIS_PER_DAY: i64 = 86_400_000;

/// Nanoseconds in one millisecond.
const NANOS_PER_MILLI: i128 = 1_000_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when rendering timestamps.
#[derive(Debug, Error)]
pub enum TimeError {
    /// Timestamp falls outside the representable calendar range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
    /// Formatting the timestamp failed.
    #[error("timestamp format error: {0}")]
    Format(String),
}

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Reads the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    /// Returns this timestamp shifted forward by whole days, if representable.
    #[must_use]
    pub fn checked_add_days(self, days: u32) -> Option<Self> {
        i64::from(days).checked_mul(MILLIS_PER_DAY).and_then(|delta| self.0.checked_add(delta)).map(Self)
    }

    /// Renders the timestamp as a fixed-width ISO 8601 string in UTC.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError`] when the value cannot be represented as a date.
    pub fn to_iso8601(self) -> Result<String, TimeError> {
        let nanos = i128::from(self.0) * NANOS_PER_MILLI;
        let datetime = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|err| TimeError::OutOfRange(err.to_string()))?;
        datetime.format(&Iso8601::DEFAULT).map_err(|err| TimeError::Format(err.to_string()))
    }
}
