//! Background thread that removes expired upload sessions

use super::manager::SessionManager;
use log::{debug, trace};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Running sweeper; stops on [`SweeperHandle::stop`] or drop
#[derive(Debug)]
pub struct SweeperHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl SessionManager {
    /// Sweep on the manager's configured interval (5 minutes by default)
    pub fn start_background_sweeper(self: &Arc<Self>) -> SweeperHandle {
        self.start_sweeper(self.sweep_interval())
    }

    /// Sweep every `interval` until stopped or the manager is dropped
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let manager: Weak<SessionManager> = Arc::downgrade(self);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::spawn(move || {
            debug!("🧹 Session sweeper running every {:?}", interval);
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let swept = manager.sweep_expired();
                trace!("🧹 Sweep pass removed {} sessions", swept.len());
            }
            debug!("🧹 Session sweeper stopped");
        });

        SweeperHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }
}
