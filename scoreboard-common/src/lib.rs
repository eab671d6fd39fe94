pub mod team;

pub mod bundles;

pub mod clock;

pub mod config;

pub mod display;

pub mod game_snapshot;

pub mod wire;
