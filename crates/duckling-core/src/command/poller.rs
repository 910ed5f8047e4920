//! Background input polling thread

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::control::period_from_rate;
use crate::Result;

use super::{Mailbox, RawInput};

/// A device that can be read from the poller thread
pub trait InputReader: Send {
    fn read(&mut self) -> Result<RawInput>;
}

/// Reads an [`InputReader`] at a fixed rate and posts into a mailbox
///
/// Stops when dropped.
#[derive(Debug)]
pub struct InputPoller {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl InputPoller {
    /// Spawn the polling thread
    pub fn spawn<R>(name: &str, mut reader: R, rate_hz: f64, mailbox: Mailbox<RawInput>) -> Result<Self>
    where
        R: InputReader + 'static,
    {
        let period = period_from_rate("command polling rate", rate_hz)?;
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread_name = format!("{}-poller", name);
        let log_name = name.to_string();

        let handle = thread::Builder::new().name(thread_name).spawn(move || {
            let mut failing = false;
            loop {
                match reader.read() {
                    Ok(raw) => {
                        failing = false;
                        mailbox.post(raw);
                    }
                    Err(e) if !failing => {
                        failing = true;
                        tracing::warn!("{}: input read failed: {}", log_name, e);
                    }
                    Err(e) => tracing::trace!("{}: input read failed: {}", log_name, e),
                }
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("{} poller stopped", log_name);
        })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread and wait for it to exit
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Input poller thread panicked");
            }
        }
    }
}

impl Drop for InputPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
