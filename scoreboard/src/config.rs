use derivative::Derivative;
use serde::{Deserialize, Serialize};
pub use scoreboard_common::config::{Game, Thresholds};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub host: String,
    pub port: u16,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8100,
        }
    }
}

/// What the binary does when no subcommand is given
#[derive(Debug, Clone, Copy, Derivative, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Default)]
pub enum Mode {
    #[derivative(Default)]
    Display,
    Control,
    Serve,
    Local,
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            Self::Display => write!(f, "Display"),
            Self::Control => write!(f, "Control"),
            Self::Serve => write!(f, "Serve"),
            Self::Local => write!(f, "Local"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub mode: Mode,
    pub game: Game,
    pub thresholds: Thresholds,
    pub store: Store,
}
