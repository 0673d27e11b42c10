//! Monotonic-adjusted wall clock.
//!
//! Obligation due-ness is compared against wall-clock timestamps, but the
//! raw wall clock can step backwards (NTP corrections, manual adjustment).
//! This clock anchors the wall time once per process and advances it with
//! the monotonic clock, so two reads never move backwards relative to each
//! other.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

struct Anchor {
    wall: SystemTime,
    mono: Instant,
}

static ANCHOR: OnceLock<Anchor> = OnceLock::new();

fn anchor() -> &'static Anchor {
    ANCHOR.get_or_init(|| Anchor {
        wall: SystemTime::now(),
        mono: Instant::now(),
    })
}

/// Current wall-clock time, advanced monotonically from a per-process
/// anchor.
pub fn now() -> SystemTime {
    let anchor = anchor();
    anchor.wall + anchor.mono.elapsed()
}

/// Current time as milliseconds since the Unix epoch.
pub fn now_ms() -> u128 {
    now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis())
}
