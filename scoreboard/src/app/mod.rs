use crate::{
    clock_engine::ClockEngine,
    config::Config,
    controller::Command,
    store::SharedStore,
};
use log::*;
use scoreboard_common::{
    clock::{TimeSource, Timestamp},
    game_snapshot::GameSnapshot,
    wire::{StoreRecord, snapshot_from_record},
};
use tokio::{
    select,
    sync::mpsc,
    time::{Duration, MissedTickBehavior, interval, sleep},
};

pub mod board;
use board::Board;

mod message;
pub use message::Message;

/// Time given to queued store writes after the command input closes
const FLUSH_GRACE: Duration = Duration::from_secs(1);

/// One scoreboard client. Owns the clock engine, the last known store record and the store
/// handle; everything that changes them goes through [`ScoreboardApp::update`].
pub struct ScoreboardApp<S, T> {
    config: Config,
    engine: ClockEngine,
    record: StoreRecord,
    snapshot: GameSnapshot,
    store: S,
    time: T,
    last_remote_update: Option<Timestamp>,
}

impl<S: SharedStore, T: TimeSource> ScoreboardApp<S, T> {
    pub fn new(config: Config, store: S, time: T) -> Self {
        let engine = ClockEngine::new(config.game.clone());
        let snapshot = GameSnapshot::new(&config.game);
        Self {
            config,
            engine,
            record: StoreRecord::new(),
            snapshot,
            store,
            time,
            last_remote_update: None,
        }
    }

    pub fn engine(&self) -> &ClockEngine {
        &self.engine
    }

    pub fn snapshot(&self) -> &GameSnapshot {
        &self.snapshot
    }

    pub fn record(&self) -> &StoreRecord {
        &self.record
    }

    pub fn update(&mut self, message: Message) {
        if !message.is_tick() {
            trace!("Handling message: {message:?}");
        }
        let now = self.time.now();

        match message {
            Message::Tick => {
                self.engine.tick(now);
            }
            Message::RemoteUpdate(record) => {
                self.record = record;
                self.last_remote_update = Some(now);
                self.apply_record(now);
            }
            Message::Command(command) => {
                let update = command.apply(&mut self.engine, &self.snapshot, now);
                if update.is_empty() {
                    debug!("{command:?} had no effect");
                    return;
                }
                if let Err(e) = self.store.write(update.clone()) {
                    error!("Failed to send {command:?} to the store: {e}");
                }
                // Shown locally right away, the store echo will confirm it
                update.merge_into(&mut self.record);
                self.apply_record(now);
            }
        }
    }

    fn apply_record(&mut self, now: Timestamp) {
        self.snapshot = snapshot_from_record(&self.record, &self.config.game);
        self.engine.resync_from_remote(&self.snapshot, now);
    }

    pub fn board(&self) -> String {
        Board {
            snapshot: &self.snapshot,
            readout: self.engine.readout(self.time.now()),
            thresholds: &self.config.thresholds,
            last_update: self.last_remote_update,
        }
        .to_string()
    }

    /// Runs the client until the store goes away or, when `commands` is given, until the command
    /// input closes. `show` is called with the rendered board whenever it changes.
    pub async fn run(
        mut self,
        mut commands: Option<mpsc::Receiver<Command>>,
        mut show: impl FnMut(&str),
    ) {
        let mut remote = self.store.subscribe();
        let mut start_stop = self.engine.get_start_stop_rx();
        let mut ticker = interval(Duration::from_millis(
            self.config.game.clock_update_interval_ms.max(1),
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The starting record may be a placeholder, not an update from the store
        self.record = remote.borrow_and_update().clone();
        let now = self.time.now();
        self.apply_record(now);
        let mut last_board = self.board();
        show(&last_board);

        loop {
            let running = *start_stop.borrow_and_update();

            select! {
                _ = ticker.tick(), if running => self.update(Message::Tick),
                changed = remote.changed() => match changed {
                    Ok(()) => {
                        let record = remote.borrow_and_update().clone();
                        self.update(Message::RemoteUpdate(record));
                    }
                    Err(_) => {
                        error!("The store closed, stopping");
                        break;
                    }
                },
                command = next_command(&mut commands) => match command {
                    Some(command) => self.update(Message::Command(command)),
                    None => {
                        info!("Command input closed, stopping");
                        sleep(FLUSH_GRACE).await;
                        break;
                    }
                },
            }

            let board = self.board();
            if board != last_board {
                show(&board);
                last_board = board;
            }
        }
    }
}

/// Never resolves when there is no command input
async fn next_command(commands: &mut Option<mpsc::Receiver<Command>>) -> Option<Command> {
    match commands {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
