use crate::{
    bundles::{ClockBundle, HomeAwayBundle},
    clock::{ClockKind, ClockState, ClockStatus, Timestamp},
    config::Game,
    team::Team,
};

/// Everything a client knows about the game, decoded from one shared store record
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GameSnapshot {
    pub status: ClockStatus,
    pub clocks: ClockBundle<ClockState>,
    pub shot_partial_reset: u32,
    pub scores: HomeAwayBundle<u16>,
    pub fouls: HomeAwayBundle<u8>,
    pub period: u8,
    pub max_period: u8,
    pub possession: Option<Team>,
}

impl GameSnapshot {
    /// The state of a freshly reset game
    pub fn new(config: &Game) -> Self {
        Self {
            status: ClockStatus::Idle,
            clocks: ClockBundle::new(
                ClockState::new(config.game_duration),
                ClockState::new(config.shot_duration),
            ),
            shot_partial_reset: config.shot_partial_reset,
            scores: Default::default(),
            fouls: Default::default(),
            period: config.default_period,
            max_period: config.max_periods,
            possession: None,
        }
    }

    pub fn remaining(&self, kind: ClockKind, now: Timestamp) -> u32 {
        self.clocks[kind].remaining(now)
    }

    pub fn is_final_period(&self) -> bool {
        self.period >= self.max_period
    }
}

impl core::fmt::Display for GameSnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "[{} P{}/{}] Scores {} | Fouls {} | Possession {}",
            self.status,
            self.period,
            self.max_period,
            self.scores,
            self.fouls,
            self.possession
                .map(|t| t.to_string())
                .unwrap_or_else(|| "None".to_string())
        )
    }
}
