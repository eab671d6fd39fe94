use crate::controller::Command;
use scoreboard_common::wire::StoreRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Tick,
    RemoteUpdate(StoreRecord),
    Command(Command),
}

impl Message {
    pub fn is_tick(&self) -> bool {
        matches!(self, Self::Tick)
    }
}
