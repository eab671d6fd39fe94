use super::{Result, SharedStore, StoreError};
use log::*;
use scoreboard_common::wire::{PartialUpdate, StoreRecord};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
    sync::{mpsc, watch},
    task::{self, JoinHandle},
    time::{Duration, sleep, timeout},
};

const TIMEOUT: Duration = Duration::from_millis(500);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const UPDATE_CHANNEL_LEN: usize = 16;

/// A connection to a store hub. Reconnects on its own whenever the connection drops; updates
/// written while disconnected are sent once the connection is back.
#[derive(Debug)]
pub struct RemoteStore {
    tx: mpsc::Sender<PartialUpdate>,
    record_rx: watch::Receiver<StoreRecord>,
    join: JoinHandle<()>,
}

impl RemoteStore {
    pub fn connect(host: String, port: u16) -> Self {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_LEN);
        let (record_tx, record_rx) = watch::channel(StoreRecord::new());

        let join = task::spawn(connection_loop(host, port, rx, record_tx));

        Self {
            tx,
            record_rx,
            join,
        }
    }
}

impl SharedStore for RemoteStore {
    fn write(&self, update: PartialUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        self.tx.try_send(update)?;
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<StoreRecord> {
        self.record_rx.clone()
    }
}

impl Drop for RemoteStore {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn connection_loop(
    host: String,
    port: u16,
    mut rx: mpsc::Receiver<PartialUpdate>,
    record_tx: watch::Sender<StoreRecord>,
) {
    loop {
        info!("Attempting store connection to {host}:{port}");
        let stream = loop {
            match TcpStream::connect((host.as_str(), port)).await {
                Ok(stream) => break stream,
                Err(e) => {
                    debug!("Store connection failed: {e}");
                    sleep(RECONNECT_DELAY).await;
                }
            }
        };
        info!("Connected to the store at {host}:{port}");

        match session(stream, &mut rx, &record_tx).await {
            Ok(()) => {
                info!("Store handle dropped, closing the connection");
                return;
            }
            Err(e) => {
                error!("Connection to the store lost ({e}), attempting to reconnect");
            }
        }
        sleep(RECONNECT_DELAY).await;
    }
}

/// Runs one connection until it fails. Returns `Ok` only when there is nothing left to send.
async fn session(
    stream: TcpStream,
    rx: &mut mpsc::Receiver<PartialUpdate>,
    record_tx: &watch::Sender<StoreRecord>,
) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    loop {
        select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Err(StoreError::Closed);
                };
                match serde_json::from_str::<StoreRecord>(&line) {
                    Ok(record) => {
                        trace!("Received a record with {} fields", record.len());
                        record_tx.send_replace(record);
                    }
                    Err(e) => warn!("Corrupted record discarded: {e}"),
                }
            }
            update = rx.recv() => {
                let Some(update) = update else {
                    return Ok(());
                };
                let mut data = serde_json::to_vec(&update)?;
                data.push(b'\n');
                // A partial line may already be out, so the connection can't be reused
                timeout(TIMEOUT, write.write_all(&data))
                    .await
                    .map_err(|_| StoreError::TimedOut)??;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::StoreServer;
    use tokio::net::TcpListener;
    use scoreboard_common::{
        clock::{ClockKind, ClockStatus, Timestamp},
        team::Team,
        wire::field,
    };
    use serde_json::json;

    const PORT: u16 = 12348;
    const WAIT: Duration = Duration::from_secs(5);

    async fn wait_for(
        rx: &mut watch::Receiver<StoreRecord>,
        mut done: impl FnMut(&StoreRecord) -> bool,
    ) -> StoreRecord {
        timeout(WAIT, async {
            loop {
                {
                    let record = rx.borrow_and_update();
                    if done(&record) {
                        return record.clone();
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("Timed out waiting for the store")
    }

    #[tokio::test]
    async fn test_remote_stores_share_updates() {
        let _server = StoreServer::new(PORT);
        let controller = RemoteStore::connect("localhost".to_string(), PORT);
        let display = RemoteStore::connect("localhost".to_string(), PORT);
        let mut display_rx = display.subscribe();

        // Queued before the connection is up, sent once it is
        controller
            .write(
                PartialUpdate::new()
                    .status(ClockStatus::Running)
                    .started_at(ClockKind::Game, Some(Timestamp::from_millis(42_000)))
                    .score(Team::Away, 7),
            )
            .unwrap();

        let record = wait_for(&mut display_rx, |r| r.contains_key(field::STATUS)).await;
        assert_eq!(record.get(field::STATUS), Some(&json!("running")));
        assert_eq!(record.get(field::CLOCK_STARTED_AT), Some(&json!(42_000)));
        assert_eq!(record.get(field::AWAY_SCORE), Some(&json!(7)));

        display
            .write(
                PartialUpdate::new()
                    .status(ClockStatus::Paused)
                    .started_at(ClockKind::Game, None),
            )
            .unwrap();

        let mut controller_rx = controller.subscribe();
        let record = wait_for(&mut controller_rx, |r| {
            r.get(field::STATUS) == Some(&json!("paused"))
        })
        .await;
        assert_eq!(record.get(field::CLOCK_STARTED_AT), Some(&json!("null")));
        assert_eq!(record.get(field::AWAY_SCORE), Some(&json!(7)));
    }

    #[tokio::test]
    async fn test_stalled_write_drops_the_connection() {
        let listener = TcpListener::bind(("127.0.0.1", PORT + 1)).await.unwrap();
        let stream = TcpStream::connect(("127.0.0.1", PORT + 1)).await.unwrap();
        // Accepted but never read from
        let (_peer, _) = listener.accept().await.unwrap();

        let (tx, mut rx) = mpsc::channel(1);
        let (record_tx, _record_rx) = watch::channel(StoreRecord::new());
        let mut record = StoreRecord::new();
        record.insert("padding".to_string(), json!("x".repeat(64 * 1024 * 1024)));
        tx.send(PartialUpdate::from(record)).await.unwrap();

        let result = timeout(WAIT, session(stream, &mut rx, &record_tx))
            .await
            .expect("The session did not give up on the write");
        assert!(matches!(result, Err(StoreError::TimedOut)), "{result:?}");
    }

    #[tokio::test]
    async fn test_empty_write_is_accepted() {
        let store = RemoteStore::connect("localhost".to_string(), 1);
        assert!(store.write(PartialUpdate::new()).is_ok());
    }
}
