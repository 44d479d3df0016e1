use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::domain::SenderId;

/// Per-sender minimum-interval rate limiter.
///
/// Deliberately not a token bucket: a sender gets at most one admitted
/// request per `window`, with no burst allowance. Rejected requests are
/// dropped silently by the caller (no reply, no error to the user).
///
/// The map grows with the number of distinct senders and is never evicted;
/// entries are a single `Instant`, so this is acceptable for the expected
/// audience size. TODO: sweep entries older than a few windows if memory
/// ever becomes a concern.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    last_admitted: HashMap<SenderId, Instant>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_admitted: HashMap::new(),
        }
    }

    pub fn admit(&mut self, sender: &SenderId) -> bool {
        self.admit_at(sender, Instant::now())
    }

    /// Admit iff the sender has never been seen, or `window` has elapsed
    /// since their last admitted request. Updates the entry only on
    /// admission, so per-sender timestamps are non-decreasing.
    pub fn admit_at(&mut self, sender: &SenderId, now: Instant) -> bool {
        match self.last_admitted.get(sender) {
            Some(last) if now.duration_since(*last) < self.window => false,
            _ => {
                self.last_admitted.insert(sender.clone(), now);
                true
            }
        }
    }

    pub fn tracked_senders(&self) -> usize {
        self.last_admitted.len()
    }
}
