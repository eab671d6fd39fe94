use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub default_period: u8,
    pub max_periods: u8,
    pub game_duration: u32,
    pub shot_duration: u32,
    pub shot_partial_reset: u32,
    pub clock_update_interval_ms: u64,
    pub max_score: u16,
    pub max_fouls: u8,
}

impl Default for Game {
    fn default() -> Self {
        Self {
            default_period: 1,
            max_periods: 4,
            game_duration: 720,
            shot_duration: 24,
            shot_partial_reset: 14,
            clock_update_interval_ms: 100,
            max_score: 199,
            max_fouls: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub shot_warning: u32,
    pub shot_danger: u32,
    pub foul_warning: u8,
    pub foul_danger: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            shot_warning: 10,
            shot_danger: 5,
            foul_warning: 4,
            foul_danger: 6,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use indoc::indoc;

    const GAME_STRING: &str = indoc!(
        r#"default_period = 1
           max_periods = 4
           game_duration = 720
           shot_duration = 24
           shot_partial_reset = 14
           clock_update_interval_ms = 100
           max_score = 199
           max_fouls = 10"#
    );

    const THRESHOLDS_STRING: &str = indoc!(
        r#"shot_warning = 10
           shot_danger = 5
           foul_warning = 4
           foul_danger = 6"#
    );

    #[test]
    fn test_deser_game() {
        let game: Game = Default::default();
        let deser = toml::from_str(GAME_STRING);
        assert_eq!(deser, Ok(game));
    }

    #[test]
    fn test_deser_thresholds() {
        let thresholds: Thresholds = Default::default();
        let deser = toml::from_str(THRESHOLDS_STRING);
        assert_eq!(deser, Ok(thresholds));
    }

    #[test]
    fn test_ser_game() {
        let game = Game {
            game_duration: 600,
            shot_duration: 30,
            ..Default::default()
        };
        let serialized = toml::to_string(&game).unwrap();
        let deser = toml::from_str(&serialized);
        assert_eq!(deser, Ok(game));
    }
}
