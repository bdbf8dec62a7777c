//! Background compaction thread.
//!
//! Polls the data directory every `compaction_poll_interval_ms` and runs a
//! squash step whenever the segment count is over the limit. A failed step is
//! logged and retried on the next poll; it never stops the loop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::Result;
use crate::storage::StorageManager;

use super::compactor::Compactor;

enum CompactionCmd {
    Shutdown,
}

/// Owns the compaction thread; stopping or dropping joins it
pub struct BackgroundCompactor {
    tx: Sender<CompactionCmd>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundCompactor {
    pub fn start(storage: Arc<StorageManager>) -> Result<Self> {
        let poll = Duration::from_millis(storage.config().compaction_poll_interval_ms);
        let (tx, rx) = channel::unbounded();
        let compactor = Compactor::new(storage);

        let handle = thread::Builder::new()
            .name("cinderkv-compaction".to_string())
            .spawn(move || compaction_loop(rx, compactor, poll))?;

        tracing::info!("Background compaction started (poll every {:?})", poll);
        Ok(Self {
            tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Signal the thread and wait for the step in progress to finish
    pub fn stop(&self) {
        let handle = match self.handle.lock().take() {
            Some(handle) => handle,
            None => return,
        };
        let _ = self.tx.send(CompactionCmd::Shutdown);
        if handle.join().is_err() {
            tracing::error!("Compaction thread panicked");
        }
        tracing::info!("Background compaction stopped");
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl Drop for BackgroundCompactor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn compaction_loop(rx: Receiver<CompactionCmd>, compactor: Compactor, poll: Duration) {
    loop {
        match rx.recv_timeout(poll) {
            Ok(CompactionCmd::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if let Err(e) = compactor.run_once() {
                    tracing::warn!("Compaction step abandoned: {}", e);
                }
            }
        }
    }
}
