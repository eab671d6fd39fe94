use derivative::Derivative;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};

#[derive(Derivative, Serialize, Deserialize, Sequence)]
#[derivative(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    #[derivative(Default)]
    Home,
    Away,
}

impl Team {
    /// The value used for this team in the shared store
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Away => "away",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "home" => Some(Self::Home),
            "away" => Some(Self::Away),
            _ => None,
        }
    }
}

impl core::fmt::Display for Team {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            Self::Home => write!(f, "Home"),
            Self::Away => write!(f, "Away"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wire_str() {
        for team in enum_iterator::all::<Team>() {
            assert_eq!(Team::from_wire_str(team.as_wire_str()), Some(team));
        }
        assert_eq!(Team::from_wire_str("null"), None);
        assert_eq!(Team::from_wire_str("HOME"), None);
    }
}
