//! Point-in-time values for order bookkeeping.

use chrono::{DateTime, Utc};

/// A comparable UTC instant, serialized as RFC 3339.
pub type Timestamp = DateTime<Utc>;

/// Current time, used for `createdAt` and every `updatedAt` stamp.
pub fn now() -> Timestamp {
    Utc::now()
}
