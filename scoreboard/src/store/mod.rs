//! The shared store every client reads from and writes to.
//!
//! A store holds one flat record. Writes are partial updates merged key by key, last write wins,
//! and every subscriber sees the full record after each accepted write.

use log::*;
use scoreboard_common::wire::{PartialUpdate, StoreRecord};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc::error::TrySendError, watch};

pub mod client;
pub mod server;

pub use client::RemoteStore;
pub use server::StoreServer;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("The store connection is gone")]
    Closed,
    #[error("Too many updates are waiting to be sent")]
    Backlogged,
    #[error("Sending to the store timed out")]
    TimedOut,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl<T> From<TrySendError<T>> for StoreError {
    fn from(e: TrySendError<T>) -> Self {
        match e {
            TrySendError::Full(_) => Self::Backlogged,
            TrySendError::Closed(_) => Self::Closed,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub trait SharedStore: Send {
    /// Queues a partial update. Never waits for the store to accept it.
    fn write(&self, update: PartialUpdate) -> Result<()>;

    /// The latest full record, updated whenever the store changes
    fn subscribe(&self) -> watch::Receiver<StoreRecord>;
}

/// A store living entirely in this process. Clones share the same record.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tx: Arc<watch::Sender<StoreRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_record(StoreRecord::new())
    }

    pub fn with_record(record: StoreRecord) -> Self {
        let (tx, _) = watch::channel(record);
        Self { tx: Arc::new(tx) }
    }

    pub fn record(&self) -> StoreRecord {
        self.tx.borrow().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for MemoryStore {
    fn write(&self, update: PartialUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        trace!("Merging {} fields into the memory store", update.len());
        self.tx.send_modify(|record| update.merge_into(record));
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<StoreRecord> {
        self.tx.subscribe()
    }
}
