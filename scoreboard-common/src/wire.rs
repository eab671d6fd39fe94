//! Mapping between [`GameSnapshot`] and the flat key/value record kept by the shared store.
//!
//! The store cannot carry a real null inside a partial update, so "no value" (a clock that is not
//! running, nobody in possession) is written as the string [`NULL_SENTINEL`]. Every read of an
//! optional field goes through [`decode_timestamp`] or [`decode_possession`], which treat a missing
//! key, a JSON `null` and the sentinel string identically.

use crate::{
    bundles::{ClockBundle, HomeAwayBundle},
    clock::{ClockKind, ClockState, ClockStatus, Timestamp},
    config::Game,
    game_snapshot::GameSnapshot,
    team::Team,
};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const NULL_SENTINEL: &str = "null";

pub type StoreRecord = Map<String, Value>;

pub mod field {
    pub const STATUS: &str = "status";
    pub const GAME_DURATION: &str = "gameDuration";
    pub const CLOCK_STARTED_AT: &str = "clockStartedAt";
    pub const ELAPSED_BEFORE_PAUSE: &str = "elapsedBeforePause";
    pub const SHOT_DURATION: &str = "shotDuration";
    pub const SHOT_STARTED_AT: &str = "shotStartedAt";
    pub const SHOT_ELAPSED_BEFORE_PAUSE: &str = "shotElapsedBeforePause";
    pub const SHOT_PARTIAL_RESET: &str = "shotPartialReset";
    pub const HOME_SCORE: &str = "homeScore";
    pub const AWAY_SCORE: &str = "awayScore";
    pub const HOME_FOULS: &str = "homeFouls";
    pub const AWAY_FOULS: &str = "awayFouls";
    pub const PERIOD: &str = "period";
    pub const MAX_PERIOD: &str = "maxPeriod";
    pub const POSSESSION: &str = "possession";
}

pub fn duration_field(kind: ClockKind) -> &'static str {
    match kind {
        ClockKind::Game => field::GAME_DURATION,
        ClockKind::Shot => field::SHOT_DURATION,
    }
}

pub fn started_at_field(kind: ClockKind) -> &'static str {
    match kind {
        ClockKind::Game => field::CLOCK_STARTED_AT,
        ClockKind::Shot => field::SHOT_STARTED_AT,
    }
}

pub fn elapsed_field(kind: ClockKind) -> &'static str {
    match kind {
        ClockKind::Game => field::ELAPSED_BEFORE_PAUSE,
        ClockKind::Shot => field::SHOT_ELAPSED_BEFORE_PAUSE,
    }
}

pub fn score_field(team: Team) -> &'static str {
    match team {
        Team::Home => field::HOME_SCORE,
        Team::Away => field::AWAY_SCORE,
    }
}

pub fn fouls_field(team: Team) -> &'static str {
    match team {
        Team::Home => field::HOME_FOULS,
        Team::Away => field::AWAY_FOULS,
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s == NULL_SENTINEL,
        Some(_) => false,
    }
}

/// Numeric coercion of a store value. Numbers pass through and numeric strings are parsed;
/// anything else (booleans, objects such as a pending server timestamp) has no numeric value.
fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_u64().map(|n| n as f64).or_else(|| n.as_f64()),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };
    number.filter(|n| n.is_finite())
}

/// The one place a timestamp field is read from the store
pub fn decode_timestamp(value: Option<&Value>) -> Option<Timestamp> {
    if is_absent(value) {
        return None;
    }
    let value = value?;
    match coerce_number(value) {
        Some(n) if n >= 0.0 => Some(Timestamp::from_millis(n.floor() as u64)),
        _ => {
            debug!("Treating unusable timestamp {value} as no timestamp");
            None
        }
    }
}

pub fn encode_timestamp(timestamp: Option<Timestamp>) -> Value {
    match timestamp {
        Some(t) => Value::from(t.as_millis()),
        None => Value::from(NULL_SENTINEL),
    }
}

/// Reads a non-negative whole number, falling back to `default` when the field is missing or
/// malformed. Negative values clamp to zero.
pub fn decode_count(value: Option<&Value>, default: u32) -> u32 {
    if is_absent(value) {
        return default;
    }
    match value.and_then(coerce_number) {
        Some(n) if n <= 0.0 => 0,
        Some(n) if n >= u32::MAX as f64 => u32::MAX,
        Some(n) => n.floor() as u32,
        None => {
            warn!("Malformed numeric value {value:?}, using the default of {default}");
            default
        }
    }
}

fn decode_u16(value: Option<&Value>, default: u16) -> u16 {
    u16::try_from(decode_count(value, default.into())).unwrap_or(u16::MAX)
}

fn decode_u8(value: Option<&Value>, default: u8) -> u8 {
    u8::try_from(decode_count(value, default.into())).unwrap_or(u8::MAX)
}

pub fn decode_status(value: Option<&Value>) -> ClockStatus {
    match value {
        None | Some(Value::Null) => ClockStatus::Idle,
        Some(Value::String(s)) => ClockStatus::from_wire_str(s).unwrap_or_else(|| {
            warn!("Unknown status {s:?}, treating as idle");
            ClockStatus::Idle
        }),
        Some(other) => {
            warn!("Malformed status {other}, treating as idle");
            ClockStatus::Idle
        }
    }
}

pub fn decode_possession(value: Option<&Value>) -> Option<Team> {
    if is_absent(value) {
        return None;
    }
    match value {
        Some(Value::String(s)) if s == "none" => None,
        Some(Value::String(s)) => Team::from_wire_str(s).or_else(|| {
            warn!("Unknown possession {s:?}, treating as none");
            None
        }),
        other => {
            warn!("Malformed possession {other:?}, treating as none");
            None
        }
    }
}

pub fn encode_possession(possession: Option<Team>) -> Value {
    match possession {
        Some(team) => Value::from(team.as_wire_str()),
        None => Value::from(NULL_SENTINEL),
    }
}

fn decode_clock(record: &StoreRecord, kind: ClockKind, default_duration: u32) -> ClockState {
    ClockState {
        duration_secs: decode_count(record.get(duration_field(kind)), default_duration),
        started_at: decode_timestamp(record.get(started_at_field(kind))),
        elapsed_before_pause: decode_count(record.get(elapsed_field(kind)), 0),
    }
}

/// Decodes a full store record. Missing or malformed fields take their defaults from `config`.
pub fn snapshot_from_record(record: &StoreRecord, config: &Game) -> GameSnapshot {
    GameSnapshot {
        status: decode_status(record.get(field::STATUS)),
        clocks: ClockBundle::new(
            decode_clock(record, ClockKind::Game, config.game_duration),
            decode_clock(record, ClockKind::Shot, config.shot_duration),
        ),
        shot_partial_reset: decode_count(
            record.get(field::SHOT_PARTIAL_RESET),
            config.shot_partial_reset,
        ),
        scores: HomeAwayBundle::new(
            decode_u16(record.get(field::HOME_SCORE), 0),
            decode_u16(record.get(field::AWAY_SCORE), 0),
        ),
        fouls: HomeAwayBundle::new(
            decode_u8(record.get(field::HOME_FOULS), 0),
            decode_u8(record.get(field::AWAY_FOULS), 0),
        ),
        period: decode_u8(record.get(field::PERIOD), config.default_period),
        max_period: decode_u8(record.get(field::MAX_PERIOD), config.max_periods),
        possession: decode_possession(record.get(field::POSSESSION)),
    }
}

/// A set of fields to write to the store. Fields not present are left untouched by the store,
/// so clearing a value means writing the sentinel explicitly, which the setters here do.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialUpdate(StoreRecord);

impl PartialUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every field of `snapshot`
    pub fn full(snapshot: &GameSnapshot) -> Self {
        let mut update = Self::new()
            .status(snapshot.status)
            .shot_partial_reset(snapshot.shot_partial_reset)
            .period(snapshot.period)
            .max_period(snapshot.max_period)
            .possession(snapshot.possession);
        for (kind, clock) in snapshot.clocks.iter() {
            update = update.clock(kind, clock);
        }
        for team in enum_iterator::all::<Team>() {
            update = update
                .score(team, snapshot.scores[team])
                .fouls(team, snapshot.fouls[team]);
        }
        update
    }

    fn set(mut self, field: &str, value: Value) -> Self {
        self.0.insert(field.to_string(), value);
        self
    }

    pub fn status(self, status: ClockStatus) -> Self {
        self.set(field::STATUS, Value::from(status.as_wire_str()))
    }

    pub fn duration(self, kind: ClockKind, secs: u32) -> Self {
        self.set(duration_field(kind), Value::from(secs))
    }

    pub fn started_at(self, kind: ClockKind, started_at: Option<Timestamp>) -> Self {
        self.set(started_at_field(kind), encode_timestamp(started_at))
    }

    pub fn elapsed_before_pause(self, kind: ClockKind, secs: u32) -> Self {
        self.set(elapsed_field(kind), Value::from(secs))
    }

    pub fn clock(self, kind: ClockKind, clock: &ClockState) -> Self {
        self.duration(kind, clock.duration_secs)
            .started_at(kind, clock.started_at)
            .elapsed_before_pause(kind, clock.elapsed_before_pause)
    }

    pub fn shot_partial_reset(self, secs: u32) -> Self {
        self.set(field::SHOT_PARTIAL_RESET, Value::from(secs))
    }

    pub fn score(self, team: Team, score: u16) -> Self {
        self.set(score_field(team), Value::from(score))
    }

    pub fn fouls(self, team: Team, fouls: u8) -> Self {
        self.set(fouls_field(team), Value::from(fouls))
    }

    pub fn period(self, period: u8) -> Self {
        self.set(field::PERIOD, Value::from(period))
    }

    pub fn max_period(self, max_period: u8) -> Self {
        self.set(field::MAX_PERIOD, Value::from(max_period))
    }

    pub fn possession(self, possession: Option<Team>) -> Self {
        self.set(field::POSSESSION, encode_possession(possession))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Last write wins, key by key
    pub fn merge_into(&self, record: &mut StoreRecord) {
        for (key, value) in self.0.iter() {
            record.insert(key.clone(), value.clone());
        }
    }

    pub fn into_record(self) -> StoreRecord {
        self.0
    }
}

impl From<StoreRecord> for PartialUpdate {
    fn from(record: StoreRecord) -> Self {
        Self(record)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> StoreRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("Not an object"),
        }
    }

    #[test]
    fn test_decode_timestamp_absent_representations() {
        assert_eq!(decode_timestamp(None), None);
        assert_eq!(decode_timestamp(Some(&Value::Null)), None);
        assert_eq!(decode_timestamp(Some(&json!("null"))), None);
    }

    #[test]
    fn test_decode_timestamp_values() {
        let expected = Some(Timestamp::from_millis(1_700_000_000_123));
        assert_eq!(decode_timestamp(Some(&json!(1_700_000_000_123u64))), expected);
        assert_eq!(decode_timestamp(Some(&json!("1700000000123"))), expected);
        assert_eq!(decode_timestamp(Some(&json!(1_700_000_000_123.9))), expected);
        // Zero is a real timestamp, not a missing one
        assert_eq!(
            decode_timestamp(Some(&json!(0))),
            Some(Timestamp::from_millis(0))
        );
        assert_eq!(
            decode_timestamp(Some(&json!("0"))),
            Some(Timestamp::from_millis(0))
        );
    }

    #[test]
    fn test_decode_timestamp_unusable() {
        assert_eq!(decode_timestamp(Some(&json!({".sv": "timestamp"}))), None);
        assert_eq!(decode_timestamp(Some(&json!("soon"))), None);
        assert_eq!(decode_timestamp(Some(&json!(-5))), None);
        assert_eq!(decode_timestamp(Some(&json!(true))), None);
        assert_eq!(decode_timestamp(Some(&json!(""))), None);
    }

    #[test]
    fn test_sentinel_round_trip() {
        let encoded = encode_timestamp(None);
        assert_eq!(encoded, json!("null"));
        assert_eq!(decode_timestamp(Some(&encoded)), None);

        let ts = Timestamp::from_millis(1_234_567);
        assert_eq!(decode_timestamp(Some(&encode_timestamp(Some(ts)))), Some(ts));
    }

    #[test]
    fn test_decode_count() {
        assert_eq!(decode_count(None, 720), 720);
        assert_eq!(decode_count(Some(&Value::Null), 720), 720);
        assert_eq!(decode_count(Some(&json!("null")), 24), 24);
        assert_eq!(decode_count(Some(&json!(600)), 720), 600);
        assert_eq!(decode_count(Some(&json!("600")), 720), 600);
        assert_eq!(decode_count(Some(&json!(0)), 720), 0);
        assert_eq!(decode_count(Some(&json!(-4)), 720), 0);
        assert_eq!(decode_count(Some(&json!(12.7)), 720), 12);
        assert_eq!(decode_count(Some(&json!("twelve")), 720), 720);
        assert_eq!(decode_count(Some(&json!([1])), 14), 14);
    }

    #[test]
    fn test_decode_status() {
        assert_eq!(decode_status(None), ClockStatus::Idle);
        assert_eq!(decode_status(Some(&json!("running"))), ClockStatus::Running);
        assert_eq!(decode_status(Some(&json!("finished"))), ClockStatus::Finished);
        assert_eq!(decode_status(Some(&json!("sideways"))), ClockStatus::Idle);
        assert_eq!(decode_status(Some(&json!(3))), ClockStatus::Idle);
    }

    #[test]
    fn test_decode_possession() {
        assert_eq!(decode_possession(None), None);
        assert_eq!(decode_possession(Some(&Value::Null)), None);
        assert_eq!(decode_possession(Some(&json!("null"))), None);
        assert_eq!(decode_possession(Some(&json!("none"))), None);
        assert_eq!(decode_possession(Some(&json!("home"))), Some(Team::Home));
        assert_eq!(decode_possession(Some(&json!("away"))), Some(Team::Away));
        assert_eq!(decode_possession(Some(&json!("visitors"))), None);
        assert_eq!(
            decode_possession(Some(&encode_possession(None))),
            None
        );
    }

    #[test]
    fn test_empty_record_gives_defaults() {
        let config = Game::default();
        let snapshot = snapshot_from_record(&StoreRecord::new(), &config);
        assert_eq!(snapshot, GameSnapshot::new(&config));
    }

    #[test]
    fn test_snapshot_from_record() {
        let record = record(json!({
            "status": "running",
            "gameDuration": 600,
            "clockStartedAt": 1_700_000_000_000u64,
            "elapsedBeforePause": 42,
            "shotDuration": 14,
            "shotStartedAt": "null",
            "shotElapsedBeforePause": 3,
            "homeScore": 54,
            "awayScore": "50",
            "homeFouls": 4,
            "period": 3,
            "possession": "away",
        }));
        let snapshot = snapshot_from_record(&record, &Game::default());
        assert_eq!(snapshot.status, ClockStatus::Running);
        assert_eq!(
            snapshot.clocks.game,
            ClockState {
                duration_secs: 600,
                started_at: Some(Timestamp::from_millis(1_700_000_000_000)),
                elapsed_before_pause: 42,
            }
        );
        assert_eq!(
            snapshot.clocks.shot,
            ClockState {
                duration_secs: 14,
                started_at: None,
                elapsed_before_pause: 3,
            }
        );
        assert_eq!(snapshot.shot_partial_reset, 14);
        assert_eq!(snapshot.scores, HomeAwayBundle::new(54, 50));
        assert_eq!(snapshot.fouls, HomeAwayBundle::new(4, 0));
        assert_eq!(snapshot.period, 3);
        assert_eq!(snapshot.max_period, 4);
        assert_eq!(snapshot.possession, Some(Team::Away));
    }

    #[test]
    fn test_full_update_round_trip() {
        let config = Game::default();
        let mut snapshot = GameSnapshot::new(&config);
        snapshot.status = ClockStatus::Paused;
        snapshot.clocks.game.elapsed_before_pause = 125;
        snapshot.clocks.shot.duration_secs = 14;
        snapshot.scores = HomeAwayBundle::new(101, 99);
        snapshot.fouls = HomeAwayBundle::new(5, 7);
        snapshot.period = 4;
        snapshot.possession = Some(Team::Home);

        let update = PartialUpdate::full(&snapshot);
        assert_eq!(update.get(field::CLOCK_STARTED_AT), Some(&json!("null")));
        assert_eq!(update.get(field::SHOT_STARTED_AT), Some(&json!("null")));

        let decoded = snapshot_from_record(&update.into_record(), &config);
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_partial_update_writes_sentinel() {
        let update = PartialUpdate::new()
            .status(ClockStatus::Paused)
            .started_at(ClockKind::Game, None)
            .elapsed_before_pause(ClockKind::Game, 10)
            .possession(None);
        assert_eq!(update.len(), 4);
        assert_eq!(update.get(field::STATUS), Some(&json!("paused")));
        assert_eq!(update.get(field::CLOCK_STARTED_AT), Some(&json!("null")));
        assert_eq!(update.get(field::ELAPSED_BEFORE_PAUSE), Some(&json!(10)));
        assert_eq!(update.get(field::POSSESSION), Some(&json!("null")));
    }

    #[test]
    fn test_merge_into() {
        let mut stored = record(json!({
            "status": "running",
            "clockStartedAt": 5_000,
            "homeScore": 10,
        }));
        PartialUpdate::new()
            .status(ClockStatus::Paused)
            .started_at(ClockKind::Game, None)
            .merge_into(&mut stored);
        assert_eq!(
            stored,
            record(json!({
                "status": "paused",
                "clockStartedAt": "null",
                "homeScore": 10,
            }))
        );
        let snapshot = snapshot_from_record(&stored, &Game::default());
        assert_eq!(snapshot.clocks.game.started_at, None);
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let update = PartialUpdate::new().score(Team::Away, 3);
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"awayScore":3}"#
        );
        let parsed: PartialUpdate = serde_json::from_str(r#"{"homeFouls":2}"#).unwrap();
        assert_eq!(parsed, PartialUpdate::new().fouls(Team::Home, 2));
    }
}
