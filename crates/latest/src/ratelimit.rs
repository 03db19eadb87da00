//! Request budgeting for one discovery pass.
//!
//! Two counters: a heavy one for page-location requests and a light one for
//! everything else. The pass increments them as request events go by and
//! asks [`RateLimiter::check_and_wait`] after every event; when a counter
//! crosses its threshold the limiter pauses, bracketing the pause in
//! `RatelimitStart`/`RatelimitStop` events. The heavy pause is long enough
//! that both counters reset; the light pause resets only itself.

use crate::event::WatchEvent;
use crate::settings::{FetchSettings, RateLimit};
use async_stream::stream;
use futures::Stream;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Counter {
    made: u32,
    limit: RateLimit,
}

impl Counter {
    fn new(limit: RateLimit) -> Self {
        Self { made: 0, limit }
    }

    /// A zero threshold disables the counter.
    fn tripped(&self) -> bool {
        self.limit.requests > 0 && self.made >= self.limit.requests
    }
}

/// Per-pass request counters. Never shared; each discovery pass owns one.
#[derive(Debug)]
pub struct RateLimiter {
    pages: Counter,
    general: Counter,
}

impl RateLimiter {
    pub fn new(settings: &FetchSettings) -> Self {
        Self {
            pages: Counter::new(settings.page_requests),
            general: Counter::new(settings.general_requests),
        }
    }

    /// Count `event` against the budget it belongs to, if any.
    pub fn record(&mut self, event: &WatchEvent) {
        match event {
            WatchEvent::PageRequest { .. } => self.pages.made += 1,
            WatchEvent::GeneralRequest { .. } => self.general.made += 1,
            _ => {},
        }
    }

    /// Pause if either counter has crossed its threshold.
    ///
    /// Yields nothing when no pause is due. Otherwise yields
    /// `RatelimitStart`, sleeps the counter's delay, resets, and yields
    /// `RatelimitStop` — for each tripped counter in heavy-then-light
    /// order. Cancellation mid-sleep ends the stream immediately, without
    /// the closing `RatelimitStop`.
    pub fn check_and_wait<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Stream<Item = WatchEvent> + 'a {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            if cancel.is_cancelled() {
                return;
            }

            if self.pages.tripped() {
                yield WatchEvent::RatelimitStart;
                if !pause(self.pages.limit.delay, cancel).await {
                    return;
                }
                // The heavy delay dwarfs the light window, so both budgets
                // are fresh afterwards.
                self.pages.made = 0;
                self.general.made = 0;
                yield WatchEvent::RatelimitStop;
            }

            if self.general.tripped() {
                yield WatchEvent::RatelimitStart;
                if !pause(self.general.limit.delay, cancel).await {
                    return;
                }
                self.general.made = 0;
                yield WatchEvent::RatelimitStop;
            }
        })
    }
}

/// Sleep for `delay`, waking early on cancellation. Returns `false` when
/// the sleep was cancelled.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
