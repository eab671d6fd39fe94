use crate::clock_engine::ClockReadout;
use scoreboard_common::{
    clock::Timestamp,
    config::Thresholds,
    display::{AlertLevel, foul_level, format_shot_clock, format_time, shot_clock_level},
    game_snapshot::GameSnapshot,
    team::Team,
};
use std::fmt::{Display, Formatter, Result};
use time::{OffsetDateTime, macros::format_description};

/// Text rendering of the board. Clock values come from the engine readout, everything else from
/// the snapshot.
#[derive(Debug)]
pub struct Board<'a> {
    pub snapshot: &'a GameSnapshot,
    pub readout: ClockReadout,
    pub thresholds: &'a Thresholds,
    pub last_update: Option<Timestamp>,
}

fn alert_suffix(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::None => "",
        AlertLevel::Warning => " (!)",
        AlertLevel::Danger => " (!!)",
    }
}

fn format_wall_clock(timestamp: Timestamp) -> String {
    let nanos = i128::from(timestamp.as_millis()) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|t| {
            t.format(format_description!("[hour]:[minute]:[second] UTC"))
                .ok()
        })
        .unwrap_or_else(|| "--:--:--".to_string())
}

impl Display for Board<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let snapshot = self.snapshot;
        let leader = snapshot.scores.leader();
        let team_line = |team: Team| {
            format!(
                "{:<5}{:>4}{}",
                team.to_string().to_uppercase(),
                snapshot.scores[team],
                if leader == Some(team) { " *" } else { "" }
            )
        };
        writeln!(f, "{:<14}{}", team_line(Team::Home), team_line(Team::Away))?;

        let shot = self.readout.remaining.shot;
        writeln!(
            f,
            "Game {}   Shot {}{}",
            format_time(self.readout.remaining.game),
            format_shot_clock(shot),
            alert_suffix(shot_clock_level(shot, self.thresholds))
        )?;
        writeln!(
            f,
            "Period {}/{}   {}",
            snapshot.period, snapshot.max_period, self.readout.status
        )?;

        let fouls = |team: Team| {
            let count = snapshot.fouls[team];
            format!(
                "{team} {count}{}",
                alert_suffix(foul_level(count, self.thresholds))
            )
        };
        writeln!(f, "Fouls: {} | {}", fouls(Team::Home), fouls(Team::Away))?;

        match snapshot.possession {
            Some(team) => writeln!(f, "Possession: {team}")?,
            None => writeln!(f, "Possession: -")?,
        }

        match self.last_update {
            Some(t) => write!(f, "Last update {}", format_wall_clock(t)),
            None => write!(f, "Waiting for the store"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use indoc::indoc;
    use scoreboard_common::{
        bundles::{ClockBundle, HomeAwayBundle},
        clock::ClockStatus,
        config::Game,
    };

    #[test]
    fn test_render() {
        let mut snapshot = GameSnapshot::new(&Game::default());
        snapshot.scores = HomeAwayBundle::new(54, 50);
        snapshot.fouls = HomeAwayBundle::new(4, 6);
        snapshot.period = 2;
        snapshot.possession = Some(Team::Away);

        let board = Board {
            snapshot: &snapshot,
            readout: ClockReadout {
                status: ClockStatus::Running,
                remaining: ClockBundle::new(692, 9),
            },
            thresholds: &Thresholds::default(),
            // 2023-11-14 22:13:20 UTC
            last_update: Some(Timestamp::from_millis(1_700_000_000_000)),
        };

        let expected = indoc!(
            "HOME   54 *   AWAY   50
             Game 11:32   Shot 9 (!)
             Period 2/4   RUNNING
             Fouls: Home 4 (!) | Away 6 (!!)
             Possession: Away
             Last update 22:13:20 UTC"
        );
        assert_eq!(board.to_string(), expected);
    }

    #[test]
    fn test_render_fresh_game() {
        let snapshot = GameSnapshot::new(&Game::default());
        let board = Board {
            snapshot: &snapshot,
            readout: ClockReadout {
                status: ClockStatus::Idle,
                remaining: ClockBundle::new(720, 24),
            },
            thresholds: &Thresholds::default(),
            last_update: None,
        };

        let expected = indoc!(
            "HOME    0     AWAY    0
             Game 12:00   Shot 24
             Period 1/4   IDLE
             Fouls: Home 0 | Away 0
             Possession: -
             Waiting for the store"
        );
        assert_eq!(board.to_string(), expected);
    }
}
