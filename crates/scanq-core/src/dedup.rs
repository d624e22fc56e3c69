//! # De-duplication Window
//!
//! A camera keeps re-reading a barcode for as long as it stays in frame. The
//! debouncer remembers the last *accepted* camera code and the instant it was
//! accepted; an identical code inside the window is noise.
//!
//! ```text
//!   t=0.0s  "0123…"  ──► Accept   (recorded)
//!   t=0.4s  "0123…"  ──► Duplicate
//!   t=1.1s  "0123…"  ──► Duplicate  (window is measured from t=0.0, not t=0.4)
//!   t=2.5s  "0123…"  ──► Accept   (recorded)
//!   t=2.6s  "4006…"  ──► Accept   (different code)
//! ```
//!
//! The caller supplies `now`, so the logic stays clock-free. Acceptance is
//! recorded separately via [`Debouncer::record`] once the scan is safely
//! stored; a failed insert must not suppress the operator's retry.

use std::time::{Duration, Instant};

/// Result of checking a code against the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    /// New event; process it.
    Accept,
    /// Same code as the last acceptance, `since` ago.
    Duplicate { since: Duration },
}

/// Short-window filter for repeated identical reads.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Debouncer { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decides whether `code` seen at `now` is a repeat of the last acceptance.
    pub fn check(&self, code: &str, now: Instant) -> DebounceDecision {
        match &self.last {
            Some((last_code, at)) if last_code == code => {
                let since = now.saturating_duration_since(*at);
                if since < self.window {
                    DebounceDecision::Duplicate { since }
                } else {
                    DebounceDecision::Accept
                }
            }
            _ => DebounceDecision::Accept,
        }
    }

    /// Remembers `code` as the most recent acceptance.
    pub fn record(&mut self, code: &str, now: Instant) {
        self.last = Some((code.to_string(), now));
    }

    /// The last accepted code, if any.
    pub fn last_code(&self) -> Option<&str> {
        self.last.as_ref().map(|(code, _)| code.as_str())
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Debouncer::new(Duration::from_millis(crate::DEFAULT_DEDUP_WINDOW_MS))
    }
}
