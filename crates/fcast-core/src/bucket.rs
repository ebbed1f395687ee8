//! Time bucketing for instant keys

use crate::types::Timestamp;

/// Width of one instant bucket in seconds (3 hours)
pub const BUCKET_INTERVAL: Timestamp = 10_800;

/// Next bucket boundary strictly after `timestamp`.
///
/// `bucket(t) = 10800 * floor(t / 10800 + 1)`. A timestamp that already sits
/// on a boundary moves to the following one. `None` when the boundary does
/// not fit in a [`Timestamp`].
pub fn bucket(timestamp: Timestamp) -> Option<Timestamp> {
    bucket_with(timestamp, BUCKET_INTERVAL)
}

/// Same rule as [`bucket`] for an arbitrary positive interval
pub fn bucket_with(timestamp: Timestamp, interval: Timestamp) -> Option<Timestamp> {
    if interval <= 0 {
        return None;
    }
    timestamp
        .div_euclid(interval)
        .checked_add(1)?
        .checked_mul(interval)
}
