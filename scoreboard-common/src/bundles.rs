use crate::{clock::ClockKind, team::Team};
use core::ops::{Index, IndexMut};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeAwayBundle<T> {
    pub home: T,
    pub away: T,
}

impl<T> HomeAwayBundle<T> {
    pub fn new(home: T, away: T) -> Self {
        Self { home, away }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Team, &T)> {
        self.into_iter()
    }
}

impl<T: Ord> HomeAwayBundle<T> {
    /// The team with the strictly greater value, if any
    pub fn leader(&self) -> Option<Team> {
        match self.home.cmp(&self.away) {
            core::cmp::Ordering::Greater => Some(Team::Home),
            core::cmp::Ordering::Less => Some(Team::Away),
            core::cmp::Ordering::Equal => None,
        }
    }
}

impl<T> Index<Team> for HomeAwayBundle<T> {
    type Output = T;

    fn index(&self, team: Team) -> &Self::Output {
        match team {
            Team::Home => &self.home,
            Team::Away => &self.away,
        }
    }
}

impl<T> IndexMut<Team> for HomeAwayBundle<T> {
    fn index_mut(&mut self, team: Team) -> &mut Self::Output {
        match team {
            Team::Home => &mut self.home,
            Team::Away => &mut self.away,
        }
    }
}

impl<T: Display> Display for HomeAwayBundle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Home: {}, Away: {}", self.home, self.away)
    }
}

pub struct HomeAwayBundleIterator<'a, T> {
    bundle: &'a HomeAwayBundle<T>,
    index: usize,
}

impl<'a, T> Iterator for HomeAwayBundleIterator<'a, T> {
    type Item = (Team, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let value = match self.index {
            0 => (Team::Home, &self.bundle.home),
            1 => (Team::Away, &self.bundle.away),
            _ => return None,
        };

        self.index += 1;
        Some(value)
    }
}

impl<'a, T> IntoIterator for &'a HomeAwayBundle<T> {
    type Item = (Team, &'a T);
    type IntoIter = HomeAwayBundleIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        HomeAwayBundleIterator {
            bundle: self,
            index: 0,
        }
    }
}

/// One value per countdown clock
#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockBundle<T> {
    pub game: T,
    pub shot: T,
}

impl<T> ClockBundle<T> {
    pub fn new(game: T, shot: T) -> Self {
        Self { game, shot }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClockKind, &T)> {
        enum_iterator::all::<ClockKind>().map(move |kind| (kind, &self[kind]))
    }

    pub fn map<U>(self, mut f: impl FnMut(ClockKind, T) -> U) -> ClockBundle<U> {
        ClockBundle {
            game: f(ClockKind::Game, self.game),
            shot: f(ClockKind::Shot, self.shot),
        }
    }
}

impl<T> Index<ClockKind> for ClockBundle<T> {
    type Output = T;

    fn index(&self, kind: ClockKind) -> &Self::Output {
        match kind {
            ClockKind::Game => &self.game,
            ClockKind::Shot => &self.shot,
        }
    }
}

impl<T> IndexMut<ClockKind> for ClockBundle<T> {
    fn index_mut(&mut self, kind: ClockKind) -> &mut Self::Output {
        match kind {
            ClockKind::Game => &mut self.game,
            ClockKind::Shot => &mut self.shot,
        }
    }
}
