//! Per-host crawl-delay watermarks

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Next allowed request instant for every host seen so far
///
/// Reserving a slot is a single atomic update of the host's entry; the wait
/// happens afterwards without any lock held, so callers for different hosts
/// never serialize behind each other.
#[derive(Debug, Default)]
pub struct CrawlDelays {
    next_allowed: DashMap<String, Instant>,
}

impl CrawlDelays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the host's next slot and advances its watermark by `delay`
    ///
    /// The watermark becomes `max(previous, now) + delay`. The returned slot is
    /// `max(previous, now)`, the instant the caller may start its request.
    /// A delay too large to represent leaves the watermark at the slot.
    pub fn reserve(&self, host: &str, delay: Duration) -> Instant {
        let now = Instant::now();
        let mut slot = now;

        self.next_allowed
            .entry(host.to_string())
            .and_modify(|next| {
                slot = (*next).max(now);
                *next = slot.checked_add(delay).unwrap_or(slot);
            })
            .or_insert_with(|| now.checked_add(delay).unwrap_or(now));

        slot
    }

    /// Reserves a slot for `host` and sleeps until it arrives
    ///
    /// A zero delay skips the bookkeeping entirely and returns immediately.
    pub async fn wait(&self, host: &str, delay: Duration) -> Instant {
        if delay.is_zero() {
            return Instant::now();
        }

        let slot = self.reserve(host, delay);
        tokio::time::sleep_until(slot).await;
        slot
    }

    /// Current watermark for `host`
    pub fn next_allowed(&self, host: &str) -> Option<Instant> {
        self.next_allowed.get(host).map(|next| *next)
    }
}
