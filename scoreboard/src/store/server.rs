//! The store hub. Keeps the one shared record, merges the partial updates each connection sends
//! and broadcasts the full record to every connection as a line of JSON.

use log::*;
use scoreboard_common::wire::{PartialUpdate, StoreRecord};
use std::{collections::HashMap, fmt::Debug, future::Future, net::SocketAddr, pin::Pin};
use thiserror::Error;
use tokio::{
    io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    select,
    sync::mpsc::{self, error::TrySendError},
    task::{self, JoinHandle},
    time::{Duration, timeout},
};

const TIMEOUT: Duration = Duration::from_millis(500);
const WORKER_CHANNEL_LEN: usize = 4;

#[derive(Debug)]
pub struct StoreServer {
    tx: mpsc::Sender<ServerMessage>,
    server_join: JoinHandle<()>,
    listener_join: JoinHandle<()>,
}

impl StoreServer {
    pub fn new(port: u16) -> Self {
        Self::with_record(port, StoreRecord::new())
    }

    pub fn with_record(port: u16, record: StoreRecord) -> Self {
        let (tx, rx) = mpsc::channel(8);

        let server_join = task::spawn(Server::new(rx, tx.clone(), record).run_loop());

        let listener_join = task::spawn(listener_loop(tx.clone(), port));

        Self {
            tx,
            server_join,
            listener_join,
        }
    }

    /// Runs until the server task ends
    pub async fn wait(mut self) {
        if let Err(e) = (&mut self.server_join).await {
            error!("Store server task failed: {e}");
        }
    }
}

impl Drop for StoreServer {
    fn drop(&mut self) {
        if self.tx.try_send(ServerMessage::Stop).is_err() {
            self.server_join.abort();
        }
        self.listener_join.abort();
    }
}

#[derive(Debug, Error)]
enum WorkerError {
    #[error("The sender closed the channel")]
    ChannelClosed,
    #[error(transparent)]
    IoError(#[from] io::Error),
}

async fn worker_loop<T: AsyncWrite + Debug + Unpin + Send>(
    mut rx: mpsc::Receiver<Vec<u8>>,
    mut write: T,
) -> Result<(), WorkerError> {
    loop {
        let data = rx.recv().await.ok_or(WorkerError::ChannelClosed)?;

        match timeout(TIMEOUT, write.write_all(&data[..])).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Send to {:?} failed: {e:?}", write);
                Err(e)?;
            }
            Err(_) => {
                warn!("Send to {:?} timed out", write);
            }
        }
    }
}

async fn reader_loop<T: AsyncRead + Unpin + Send>(
    id: usize,
    read: T,
    tx: mpsc::Sender<ServerMessage>,
) -> Result<(), WorkerError> {
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PartialUpdate>(&line) {
            Ok(update) => tx
                .send(ServerMessage::Update(id, update))
                .await
                .map_err(|_| WorkerError::ChannelClosed)?,
            Err(e) => warn!("Malformed update from connection {id} discarded: {e}"),
        }
    }
    tx.send(ServerMessage::ConnectionClosed(id))
        .await
        .map_err(|_| WorkerError::ChannelClosed)
}

#[derive(Debug)]
struct WorkerHandle {
    addr: SocketAddr,
    tx: mpsc::Sender<Vec<u8>>,
    writer_join: JoinHandle<Result<(), WorkerError>>,
    reader_join: JoinHandle<Result<(), WorkerError>>,
}

impl WorkerHandle {
    fn send(&self, data: &[u8]) -> Result<(), TrySendError<Vec<u8>>> {
        self.tx.try_send(Vec::from(data))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.writer_join.abort();
        self.reader_join.abort();
    }
}

#[derive(Debug)]
enum ServerMessage {
    NewConnection(TcpStream, SocketAddr),
    Update(usize, PartialUpdate),
    ConnectionClosed(usize),
    Stop,
}

#[derive(Debug)]
struct Server {
    next_id: usize,
    workers: HashMap<usize, WorkerHandle>,
    rx: mpsc::Receiver<ServerMessage>,
    self_tx: mpsc::Sender<ServerMessage>,
    record: StoreRecord,
    encoded: Vec<u8>,
}

impl Server {
    fn new(
        rx: mpsc::Receiver<ServerMessage>,
        self_tx: mpsc::Sender<ServerMessage>,
        record: StoreRecord,
    ) -> Self {
        let mut server = Server {
            next_id: 0,
            workers: HashMap::new(),
            rx,
            self_tx,
            record,
            encoded: Vec::new(),
        };
        server.encode();
        server
    }

    fn add_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let id = self.next_id;
        self.next_id += 1;

        let (read, write) = stream.into_split();
        let (tx, rx) = mpsc::channel(WORKER_CHANNEL_LEN);
        let writer_join = task::spawn(worker_loop(rx, write));
        let reader_join = task::spawn(reader_loop(id, read, self.self_tx.clone()));

        let handle = WorkerHandle {
            addr,
            tx,
            writer_join,
            reader_join,
        };
        // A new subscriber gets the current record straight away
        if let Err(e) = handle.send(&self.encoded) {
            error!("Error sending the initial record to {addr}: {e}");
        }
        self.workers.insert(id, handle);
    }

    fn encode(&mut self) {
        self.encoded = match serde_json::to_string(&self.record) {
            Ok(json) => (json + "\n").into_bytes(),
            Err(e) => {
                error!("Failed to encode the record: {e}");
                Vec::new()
            }
        };
    }

    fn apply_update(&mut self, id: usize, update: PartialUpdate) {
        if update.is_empty() {
            return;
        }
        debug!("Merging {} fields from connection {id}", update.len());
        update.merge_into(&mut self.record);
        self.encode();
        self.send_to_workers();
    }

    fn send_to_workers(&mut self) {
        let mut to_drop = vec![];
        for (id, handle) in self.workers.iter() {
            if let Err(e) = handle.send(&self.encoded) {
                if matches!(e, TrySendError::Closed(_)) {
                    info!("Worker channel for {} closed", handle.addr);
                    to_drop.push(*id);
                } else {
                    error!("Error sending to worker for {}: {e}", handle.addr);
                }
            }
        }
        for id in to_drop {
            self.workers.remove(&id);
        }
    }

    async fn run_loop(mut self) {
        loop {
            match self.rx.recv().await {
                Some(ServerMessage::NewConnection(stream, addr)) => {
                    self.add_connection(stream, addr);
                }
                Some(ServerMessage::Update(id, update)) => {
                    self.apply_update(id, update);
                }
                Some(ServerMessage::ConnectionClosed(id)) => {
                    if let Some(handle) = self.workers.remove(&id) {
                        info!("Connection from {} closed", handle.addr);
                    }
                }
                Some(ServerMessage::Stop) | None => {
                    break;
                }
            }
        }
    }
}

async fn listener_loop(tx: mpsc::Sender<ServerMessage>, port: u16) {
    info!("Starting the store listener on port {port}");
    let listener_v6 = match TcpListener::bind(("::", port)).await {
        Ok(listener) => Some(listener),
        Err(e) => {
            error!("Failed to bind to port {port}: {e:?}");
            None
        }
    };

    // On some OSs, we must separately listen on IPv4, but on other OSs that
    // isn't allowed, so we just try to listen on IPv4
    let listener_v4 = TcpListener::bind(("0.0.0.0", port)).await.ok();

    if listener_v6.is_none() && listener_v4.is_none() {
        error!("No listener could be started on port {port}");
        return;
    }
    info!("Listener started");

    loop {
        type ListenResult = std::io::Result<(TcpStream, SocketAddr)>;

        fn create_future<'a>(
            listener: Option<&'a TcpListener>,
        ) -> Pin<Box<dyn Future<Output = ListenResult> + Send + 'a>> {
            if let Some(listener) = listener {
                Box::pin(listener.accept())
            } else {
                Box::pin(std::future::pending())
            }
        }

        let conn = select! {
            conn = create_future(listener_v6.as_ref()) => conn,
            conn = create_future(listener_v4.as_ref()) => conn,
        };

        match conn {
            Ok((stream, addr)) => {
                info!("New store connection from {addr:?}");
                if tx
                    .send(ServerMessage::NewConnection(stream, addr))
                    .await
                    .is_err()
                {
                    warn!("Store server stopped, no longer accepting connections");
                    break;
                }
            }
            Err(e) => error!("New store connection failed: {e:?}"),
        }
    }
}
