use log::*;
use scoreboard_common::{
    bundles::ClockBundle,
    clock::{ClockKind, ClockState, ClockStatus, Timestamp},
    config::Game as GameConfig,
    display::format_time,
    game_snapshot::GameSnapshot,
};
use tokio::sync::watch;

/// What observers of the engine are sent on every tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockReadout {
    pub status: ClockStatus,
    pub remaining: ClockBundle<u32>,
}

/// Owns the game clock, the shot clock and the game-level status they share.
///
/// Every operation takes the current time as an argument and never reads a clock itself, so the
/// caller decides what "now" is.
#[derive(Debug)]
pub struct ClockEngine {
    config: GameConfig,
    status: ClockStatus,
    clocks: ClockBundle<ClockState>,
    start_stop_tx: watch::Sender<bool>,
    start_stop_rx: watch::Receiver<bool>,
    readout_tx: watch::Sender<ClockReadout>,
    readout_rx: watch::Receiver<ClockReadout>,
}

impl ClockEngine {
    pub fn new(config: GameConfig) -> Self {
        let clocks = default_clocks(&config);
        let readout = ClockReadout {
            status: ClockStatus::Idle,
            remaining: clocks.map(|_, clock| clock.duration_secs),
        };
        let (start_stop_tx, start_stop_rx) = watch::channel(false);
        let (readout_tx, readout_rx) = watch::channel(readout);
        Self {
            config,
            status: ClockStatus::Idle,
            clocks,
            start_stop_tx,
            start_stop_rx,
            readout_tx,
            readout_rx,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn status(&self) -> ClockStatus {
        self.status
    }

    pub fn clock_is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn clock(&self, kind: ClockKind) -> &ClockState {
        &self.clocks[kind]
    }

    pub fn clocks(&self) -> &ClockBundle<ClockState> {
        &self.clocks
    }

    /// Emits `true` when the clocks start running and `false` when they stop
    pub fn get_start_stop_rx(&self) -> watch::Receiver<bool> {
        self.start_stop_rx.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClockReadout> {
        self.readout_rx.clone()
    }

    fn send_clock_running(&self, running: bool) {
        self.start_stop_tx.send_if_modified(|current| {
            let changed = *current != running;
            *current = running;
            changed
        });
    }

    // Returns true if the clocks were started, false if they were already running or the game is over
    pub fn start(&mut self, now: Timestamp) -> bool {
        match self.status {
            ClockStatus::Running => false,
            ClockStatus::Finished => {
                warn!(
                    "{} Ignoring a start request, the game is finished",
                    self.status_string(now)
                );
                false
            }
            ClockStatus::Idle | ClockStatus::Paused => {
                info!("{} Starting the clocks", self.status_string(now));
                self.status = ClockStatus::Running;
                for kind in enum_iterator::all::<ClockKind>() {
                    self.clocks[kind].started_at = Some(now);
                }
                self.send_clock_running(true);
                self.tick(now);
                true
            }
        }
    }

    // Returns true if the clocks were paused, false if they were not running
    pub fn pause(&mut self, now: Timestamp) -> bool {
        if !self.status.is_running() {
            return false;
        }
        info!("{} Pausing the clocks", self.status_string(now));
        for kind in enum_iterator::all::<ClockKind>() {
            self.clocks[kind].freeze(now);
        }
        self.status = ClockStatus::Paused;
        // Observers get the paused values before the tick stops
        self.tick(now);
        self.send_clock_running(false);
        true
    }

    /// Sets a new duration for one clock and clears its accumulated time. A running clock keeps
    /// running from `now`.
    pub fn reset_clock(&mut self, kind: ClockKind, duration_secs: u32, now: Timestamp) {
        info!(
            "{} Resetting the {kind} to {duration_secs}s",
            self.status_string(now)
        );
        let started_at = if self.status.is_running() {
            Some(now)
        } else {
            None
        };
        self.clocks[kind] = ClockState {
            duration_secs,
            started_at,
            elapsed_before_pause: 0,
        };
        self.tick(now);
    }

    /// Returns both clocks to their full durations and stops them, keeping the durations
    pub fn reset_clocks(&mut self, now: Timestamp) {
        info!("{} Resetting the clocks", self.status_string(now));
        for kind in enum_iterator::all::<ClockKind>() {
            self.clocks[kind] = ClockState::new(self.clocks[kind].duration_secs);
        }
        self.status = ClockStatus::Idle;
        self.send_clock_running(false);
        self.tick(now);
    }

    /// Returns both clocks to the configured durations and stops them
    pub fn reset_game(&mut self, now: Timestamp) {
        info!("{} Resetting the game", self.status_string(now));
        self.clocks = default_clocks(&self.config);
        self.status = ClockStatus::Idle;
        self.send_clock_running(false);
        self.tick(now);
    }

    /// Replaces the local clocks with the ones received from the store.
    ///
    /// The incoming values are authoritative, with two corrections so that a clock is running
    /// exactly when it has a start time:
    /// - a running clock without a usable start time gets one here, reusing the local start time
    ///   if this engine was already running the same clock, otherwise using `now`
    /// - a clock that is not running has any incoming start time dropped
    pub fn resync_from_remote(&mut self, snapshot: &GameSnapshot, now: Timestamp) {
        let was_running = self.status.is_running();
        let status = snapshot.status;
        let local = self.clocks;

        let clocks = snapshot.clocks.map(|kind, mut incoming| {
            if status.is_running() {
                if incoming.started_at.is_none() {
                    let previous = &local[kind];
                    let same_interval = was_running
                        && previous.duration_secs == incoming.duration_secs
                        && previous.elapsed_before_pause == incoming.elapsed_before_pause;
                    incoming.started_at = match previous.started_at {
                        Some(started_at) if same_interval => Some(started_at),
                        _ => {
                            warn!("The {kind} is running without a start time, starting it at {now}");
                            Some(now)
                        }
                    };
                }
            } else if let Some(started_at) = incoming.started_at.take() {
                debug!("Dropping the {kind} start time {started_at}, the clocks are {status}");
            }
            incoming
        });

        if status != self.status {
            info!(
                "{} Status changed remotely to {status}",
                self.status_string(now)
            );
        }
        self.status = status;
        self.clocks = clocks;
        if was_running != status.is_running() {
            self.send_clock_running(status.is_running());
        }
        self.tick(now);
    }

    pub fn remaining(&self, kind: ClockKind, now: Timestamp) -> u32 {
        self.clocks[kind].remaining(now)
    }

    pub fn readout(&self, now: Timestamp) -> ClockReadout {
        ClockReadout {
            status: self.status,
            remaining: self.clocks.map(|_, clock| clock.remaining(now)),
        }
    }

    /// Recomputes the remaining times and sends them to the observers. Observers are only woken
    /// when a value actually changed.
    pub fn tick(&self, now: Timestamp) -> ClockReadout {
        let readout = self.readout(now);
        trace!("Tick: {readout:?}");
        self.readout_tx.send_if_modified(|current| {
            if *current != readout {
                *current = readout;
                true
            } else {
                false
            }
        });
        readout
    }

    fn status_string(&self, now: Timestamp) -> String {
        format!(
            "[{} {:>2} {:>8}]",
            format_time(self.remaining(ClockKind::Game, now)),
            self.remaining(ClockKind::Shot, now),
            self.status
        )
    }
}

fn default_clocks(config: &GameConfig) -> ClockBundle<ClockState> {
    ClockBundle::new(
        ClockState::new(config.game_duration),
        ClockState::new(config.shot_duration),
    )
}
