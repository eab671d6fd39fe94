use crate::config::Thresholds;
use derivative::Derivative;

/// Formats a number of seconds as `M:SS`. Negative input shows as `0:00` and fractional
/// seconds are dropped.
pub fn format_time(seconds: impl Into<f64>) -> String {
    // `f64::max` ignores NaN, so NaN also lands on zero
    let total = seconds.into().max(0.0).floor();
    let total = if total >= u64::MAX as f64 {
        u64::MAX
    } else {
        total as u64
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// The shot clock is shown as plain seconds
pub fn format_shot_clock(seconds: u32) -> String {
    seconds.to_string()
}

#[derive(Derivative)]
#[derivative(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum AlertLevel {
    #[derivative(Default)]
    None,
    Warning,
    Danger,
}

impl core::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            Self::None => write!(f, "none"),
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

/// An expired shot clock (0) is not flagged, only one that is about to expire
pub fn shot_clock_level(remaining: u32, thresholds: &Thresholds) -> AlertLevel {
    if remaining > 0 && remaining <= thresholds.shot_danger {
        AlertLevel::Danger
    } else if remaining > thresholds.shot_danger && remaining <= thresholds.shot_warning {
        AlertLevel::Warning
    } else {
        AlertLevel::None
    }
}

pub fn foul_level(fouls: u8, thresholds: &Thresholds) -> AlertLevel {
    if fouls >= thresholds.foul_danger {
        AlertLevel::Danger
    } else if fouls >= thresholds.foul_warning {
        AlertLevel::Warning
    } else {
        AlertLevel::None
    }
}
