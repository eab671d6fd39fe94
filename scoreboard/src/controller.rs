//! The controller actions and the store updates they produce.

use crate::clock_engine::ClockEngine;
use log::*;
use scoreboard_common::{
    bundles::ClockBundle,
    clock::{ClockKind, ClockState, ClockStatus, Timestamp},
    game_snapshot::GameSnapshot,
    team::Team,
    wire::PartialUpdate,
};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    /// Stop both clocks and return them to their full durations
    ResetClocks,
    /// Shot clock back to its configured full duration
    ResetShotClock,
    /// Shot clock back to the partial reset value
    ResetShotClockPartial,
    ResetGame,
    ChangeScore { team: Team, delta: i16 },
    ChangeFouls { team: Team, delta: i8 },
    NextPeriod,
    PreviousPeriod,
    SetPossession(Option<Team>),
}

impl Command {
    /// Applies the command to the local engine and returns the fields that need to be written to
    /// the store. An empty update means the command had nothing to do.
    pub fn apply(
        self,
        engine: &mut ClockEngine,
        snapshot: &GameSnapshot,
        now: Timestamp,
    ) -> PartialUpdate {
        let config = engine.config().clone();
        match self {
            Self::Start => {
                if !engine.start(now) {
                    return PartialUpdate::new();
                }
                let update = PartialUpdate::new().status(engine.status());
                enum_iterator::all::<ClockKind>().fold(update, |update, kind| {
                    update.started_at(kind, engine.clock(kind).started_at)
                })
            }
            Self::Pause => {
                if !engine.pause(now) {
                    return PartialUpdate::new();
                }
                let update = PartialUpdate::new().status(engine.status());
                enum_iterator::all::<ClockKind>().fold(update, |update, kind| {
                    update
                        .started_at(kind, None)
                        .elapsed_before_pause(kind, engine.clock(kind).elapsed_before_pause)
                })
            }
            Self::ResetClocks => {
                engine.reset_clocks(now);
                let update = PartialUpdate::new().status(engine.status());
                enum_iterator::all::<ClockKind>().fold(update, |update, kind| {
                    update.started_at(kind, None).elapsed_before_pause(kind, 0)
                })
            }
            Self::ResetShotClock => reset_shot_clock(engine, config.shot_duration, now),
            Self::ResetShotClockPartial => {
                reset_shot_clock(engine, snapshot.shot_partial_reset, now)
            }
            Self::ResetGame => {
                engine.reset_game(now);
                let mut fresh = GameSnapshot::new(&config);
                fresh.clocks = *engine.clocks();
                fresh.status = engine.status();
                PartialUpdate::full(&fresh)
            }
            Self::ChangeScore { team, delta } => {
                let score = (i32::from(snapshot.scores[team]) + i32::from(delta))
                    .clamp(0, i32::from(config.max_score));
                // The clamp keeps the value within u16
                let score = u16::try_from(score).unwrap_or(config.max_score);
                info!("{team} score {} -> {score}", snapshot.scores[team]);
                PartialUpdate::new().score(team, score)
            }
            Self::ChangeFouls { team, delta } => {
                let fouls = (i16::from(snapshot.fouls[team]) + i16::from(delta))
                    .clamp(0, i16::from(config.max_fouls));
                let fouls = u8::try_from(fouls).unwrap_or(config.max_fouls);
                info!("{team} fouls {} -> {fouls}", snapshot.fouls[team]);
                PartialUpdate::new().fouls(team, fouls)
            }
            Self::NextPeriod => next_period(snapshot, *engine.clocks(), now),
            Self::PreviousPeriod => previous_period(snapshot, *engine.clocks(), now),
            Self::SetPossession(possession) => {
                info!(
                    "Possession set to {}",
                    possession
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "nobody".to_string())
                );
                PartialUpdate::new().possession(possession)
            }
        }
    }
}

fn reset_shot_clock(engine: &mut ClockEngine, duration_secs: u32, now: Timestamp) -> PartialUpdate {
    engine.reset_clock(ClockKind::Shot, duration_secs, now);
    let shot = engine.clock(ClockKind::Shot);
    PartialUpdate::new()
        .duration(ClockKind::Shot, shot.duration_secs)
        .started_at(ClockKind::Shot, shot.started_at)
        .elapsed_before_pause(ClockKind::Shot, 0)
}

/// `clocks` are the engine's, which carry the start time it picked when the record had none
fn next_period(
    snapshot: &GameSnapshot,
    mut clocks: ClockBundle<ClockState>,
    now: Timestamp,
) -> PartialUpdate {
    if snapshot.is_final_period() {
        info!(
            "Period {} of {} is over, finishing the game",
            snapshot.period, snapshot.max_period
        );
        let update = PartialUpdate::new().status(ClockStatus::Finished);
        enum_iterator::all::<ClockKind>().fold(update, |update, kind| {
            clocks[kind].freeze(now);
            update.clock(kind, &clocks[kind])
        })
    } else {
        let period = snapshot.period.saturating_add(1);
        info!("Moving on to period {period}");
        let update = PartialUpdate::new()
            .period(period)
            .status(ClockStatus::Idle);
        enum_iterator::all::<ClockKind>().fold(update, |update, kind| {
            update.started_at(kind, None).elapsed_before_pause(kind, 0)
        })
    }
}

fn previous_period(
    snapshot: &GameSnapshot,
    mut clocks: ClockBundle<ClockState>,
    now: Timestamp,
) -> PartialUpdate {
    if snapshot.period <= 1 {
        return PartialUpdate::new();
    }
    let period = snapshot.period - 1;
    info!("Going back to period {period}");
    let update = PartialUpdate::new()
        .period(period)
        .status(ClockStatus::Idle);
    enum_iterator::all::<ClockKind>().fold(update, |update, kind| {
        clocks[kind].freeze(now);
        update
            .started_at(kind, None)
            .elapsed_before_pause(kind, clocks[kind].elapsed_before_pause)
    })
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("No command given")]
    Empty,
    #[error("Unknown command {0:?}")]
    UnknownCommand(String),
    #[error("The {0} is missing")]
    MissingArgument(&'static str),
    #[error("{0:?} is not a team, expected home or away")]
    InvalidTeam(String),
    #[error("{0:?} is not a valid change, expected something like +1 or -2")]
    InvalidDelta(String),
    #[error("Unexpected extra input {0:?}")]
    TrailingInput(String),
}

pub type Result<T> = std::result::Result<T, ParseCommandError>;

fn parse_team(word: Option<&str>) -> Result<Team> {
    let word = word.ok_or(ParseCommandError::MissingArgument("team"))?;
    Team::from_wire_str(&word.to_lowercase())
        .ok_or_else(|| ParseCommandError::InvalidTeam(word.to_string()))
}

/// A missing change counts as +1
fn parse_delta<T: FromStr + From<i8>>(word: Option<&str>) -> Result<T> {
    let Some(word) = word else {
        return Ok(T::from(1));
    };
    word.strip_prefix('+')
        .unwrap_or(word)
        .parse()
        .map_err(|_| ParseCommandError::InvalidDelta(word.to_string()))
}

/// Parses one line typed at the controller, e.g. `start`, `score home +2`, `foul away -1`,
/// `possession none`
impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let name = words.next().ok_or(ParseCommandError::Empty)?.to_lowercase();

        let command = match name.as_str() {
            "start" => Self::Start,
            "pause" | "stop" => Self::Pause,
            "clock-reset" => Self::ResetClocks,
            "shot-reset" | "shot" => Self::ResetShotClock,
            "shot-partial" => Self::ResetShotClockPartial,
            "game-reset" => Self::ResetGame,
            "next-period" | "next" => Self::NextPeriod,
            "prev-period" | "prev" => Self::PreviousPeriod,
            "score" => Self::ChangeScore {
                team: parse_team(words.next())?,
                delta: parse_delta(words.next())?,
            },
            "foul" | "fouls" => Self::ChangeFouls {
                team: parse_team(words.next())?,
                delta: parse_delta(words.next())?,
            },
            "possession" => {
                let word = words
                    .next()
                    .ok_or(ParseCommandError::MissingArgument("team"))?;
                if word.eq_ignore_ascii_case("none") {
                    Self::SetPossession(None)
                } else {
                    Self::SetPossession(Some(parse_team(Some(word))?))
                }
            }
            _ => return Err(ParseCommandError::UnknownCommand(name)),
        };

        let rest: Vec<&str> = words.collect();
        if !rest.is_empty() {
            return Err(ParseCommandError::TrailingInput(rest.join(" ")));
        }
        Ok(command)
    }
}
