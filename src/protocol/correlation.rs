use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Correlation ID for matching calls to responses
///
/// A plain integer carried in-band in both wire shapes. Ids are unique only
/// among the calls a channel currently has outstanding; they are reused after
/// the counter wraps.
///
/// The distinguished [`CorrelationId::FIRE_AND_FORGET`] value marks a call
/// that expects no response and is never tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(i64);

impl CorrelationId {
    // ---

    /// Sentinel id for calls that never elicit a response.
    pub const FIRE_AND_FORGET: Self = Self(-1);

    /// Wrap a raw id value.
    pub const fn new(value: i64) -> Self {
        // ---
        Self(value)
    }

    /// Raw integer value.
    pub const fn value(self) -> i64 {
        // ---
        self.0
    }

    /// True for the fire-and-forget sentinel.
    pub const fn is_fire_and_forget(self) -> bool {
        // ---
        self.0 == Self::FIRE_AND_FORGET.0
    }
}

impl fmt::Display for CorrelationId {
    // ---

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CorrelationId {
    // ---

    fn from(value: i64) -> Self {
        // ---
        Self(value)
    }
}

/// Per-channel source of outbound correlation ids.
///
/// Hands out 1, 2, 3, ... and wraps back to 1 after `i64::MAX`, so the
/// sentinel and non-positive values are never produced.
#[derive(Debug)]
pub(crate) struct IdGenerator {
    next: AtomicI64,
}

impl IdGenerator {
    // ---

    pub fn new() -> Self {
        // ---
        Self {
            next: AtomicI64::new(1),
        }
    }

    /// Take the next id and advance the counter.
    pub fn next_id(&self) -> CorrelationId {
        // ---
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let following = if current >= i64::MAX { 1 } else { current + 1 };
            match self.next.compare_exchange_weak(
                current,
                following,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return CorrelationId(current),
                Err(actual) => current = actual,
            }
        }
    }

    /// Raise the counter past an id observed from the peer.
    ///
    /// The counter only ever moves forward; the sentinel and other
    /// non-positive ids are ignored.
    pub fn observe(&self, id: CorrelationId) {
        // ---
        if id.0 <= 0 {
            return;
        }
        let floor = id.0.saturating_add(1);
        self.next.fetch_max(floor, Ordering::AcqRel);
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
