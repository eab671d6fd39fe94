//! Countdown clock bookkeeping shared by every client.
//!
//! A clock is never stored as a "time remaining" value. Instead each client keeps the duration,
//! the whole seconds accumulated over previous running intervals, and the wall-clock instant at
//! which the current running interval began. Remaining time is derived from those on demand, so
//! every client that receives the same values shows the same countdown.

use derivative::Derivative;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::{
    ops::Add,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use time::OffsetDateTime;

#[derive(Derivative, Serialize, Deserialize, Sequence)]
#[derivative(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ClockKind {
    #[derivative(Default)]
    Game,
    Shot,
}

impl core::fmt::Display for ClockKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            Self::Game => write!(f, "game clock"),
            Self::Shot => write!(f, "shot clock"),
        }
    }
}

/// Game-level status, shared by the game clock and the shot clock
#[derive(Derivative, Serialize, Deserialize, Sequence)]
#[derivative(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClockStatus {
    #[derivative(Default)]
    Idle,
    Running,
    Paused,
    Finished,
}

impl ClockStatus {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Finished => "finished",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

impl core::fmt::Display for ClockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Wall-clock instant in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Whole seconds from `earlier` to `self`, rounded down. Zero if `earlier` is in the future,
    /// which happens when another client's wall clock runs ahead of ours.
    pub fn whole_secs_since(self, earlier: Timestamp) -> u32 {
        let secs = self.0.saturating_sub(earlier.0) / 1000;
        u32::try_from(secs).unwrap_or(u32::MAX)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// State of a single countdown clock.
///
/// `started_at` is only ever `Some` while the game status is `Running`; the engine that owns the
/// clock maintains that, which lets the remaining time be computed from this value alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockState {
    pub duration_secs: u32,
    pub started_at: Option<Timestamp>,
    pub elapsed_before_pause: u32,
}

impl ClockState {
    pub fn new(duration_secs: u32) -> Self {
        Self {
            duration_secs,
            started_at: None,
            elapsed_before_pause: 0,
        }
    }

    pub fn total_elapsed(&self, now: Timestamp) -> u32 {
        let current = self
            .started_at
            .map(|start| now.whole_secs_since(start))
            .unwrap_or(0);
        self.elapsed_before_pause.saturating_add(current)
    }

    /// Always within `0..=duration_secs`
    pub fn remaining(&self, now: Timestamp) -> u32 {
        self.duration_secs.saturating_sub(self.total_elapsed(now))
    }

    /// Folds the current running interval into `elapsed_before_pause` and clears `started_at`
    pub fn freeze(&mut self, now: Timestamp) {
        self.elapsed_before_pause = self.total_elapsed(now);
        self.started_at = None;
    }
}

pub trait TimeSource {
    fn now(&self) -> Timestamp;
}

/// Reads the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        Timestamp::from_millis(u64::try_from(millis).unwrap_or(0))
    }
}

/// A time source that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    millis: Arc<AtomicU64>,
}

impl ManualTimeSource {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(start.as_millis())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(by, Ordering::SeqCst);
    }

    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.as_millis(), Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use more_asserts::*;

    #[test]
    fn test_whole_secs_since() {
        let start = Timestamp::from_millis(10_000);
        assert_eq!(start.whole_secs_since(start), 0);
        assert_eq!(Timestamp::from_millis(10_999).whole_secs_since(start), 0);
        assert_eq!(Timestamp::from_millis(11_000).whole_secs_since(start), 1);
        assert_eq!(Timestamp::from_millis(15_500).whole_secs_since(start), 5);
        assert_eq!(Timestamp::from_millis(9_000).whole_secs_since(start), 0);
    }

    #[test]
    fn test_remaining_stopped() {
        let clock = ClockState {
            duration_secs: 24,
            started_at: None,
            elapsed_before_pause: 10,
        };
        let now = Timestamp::from_millis(1_000_000);
        assert_eq!(clock.remaining(now), 14);
        assert_eq!(clock.remaining(now + Duration::from_secs(100)), 14);
    }

    #[test]
    fn test_remaining_running() {
        let start = Timestamp::from_millis(1_700_000_000_000);
        let clock = ClockState {
            duration_secs: 24,
            started_at: Some(start),
            elapsed_before_pause: 4,
        };
        assert_eq!(clock.remaining(start), 20);
        assert_eq!(clock.remaining(start + Duration::from_millis(999)), 20);
        assert_eq!(clock.remaining(start + Duration::from_secs(1)), 19);
        assert_eq!(clock.remaining(start + Duration::from_secs(20)), 0);
        assert_eq!(clock.remaining(start + Duration::from_secs(5000)), 0);
    }

    #[test]
    fn test_remaining_bounds() {
        let start = Timestamp::from_millis(50_000);
        for duration_secs in [0, 1, 5, 24, 720] {
            for elapsed_before_pause in [0, 1, 24, 719, 720, 5000, u32::MAX] {
                for started_at in [None, Some(start)] {
                    let clock = ClockState {
                        duration_secs,
                        started_at,
                        elapsed_before_pause,
                    };
                    for offset in [0, 999, 1_000, 60_000, 10_000_000] {
                        let remaining = clock.remaining(start + Duration::from_millis(offset));
                        assert_le!(remaining, duration_secs);
                    }
                    // A start time in the future never adds time to the clock
                    let remaining = clock.remaining(Timestamp::from_millis(0));
                    assert_le!(remaining, duration_secs);
                }
            }
        }
    }

    #[test]
    fn test_freeze() {
        let start = Timestamp::from_millis(1_000);
        let mut clock = ClockState {
            duration_secs: 720,
            started_at: Some(start),
            elapsed_before_pause: 30,
        };
        clock.freeze(start + Duration::from_millis(5_700));
        assert_eq!(clock.started_at, None);
        assert_eq!(clock.elapsed_before_pause, 35);
    }

    #[test]
    fn test_status_wire_str() {
        for status in enum_iterator::all::<ClockStatus>() {
            assert_eq!(ClockStatus::from_wire_str(status.as_wire_str()), Some(status));
        }
        assert_eq!(ClockStatus::from_wire_str("stopped"), None);
    }

    #[test]
    fn test_manual_time_source() {
        let source = ManualTimeSource::new(Timestamp::from_millis(500));
        let shared = source.clone();
        shared.advance(Duration::from_millis(1_250));
        assert_eq!(source.now(), Timestamp::from_millis(1_750));
        source.set(Timestamp::from_millis(42));
        assert_eq!(shared.now(), Timestamp::from_millis(42));
    }

    #[test]
    fn test_system_time_source_is_after_2020() {
        assert_gt!(SystemTimeSource.now().as_millis(), 1_577_836_800_000);
    }
}
