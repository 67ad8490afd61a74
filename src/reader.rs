//! A reader owns one open device and forwards what it reads as hex.
//!
//! The read loop is blocking and runs on its own worker thread.
//! Reads wait at most one poll interval, so a stop request is noticed
//! within about that long even when the device is silent.

use std::{
    fmt::Display,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn};

use crate::{
    error::Error,
    events::{DisplayEvent, EventSender},
    monitor::Selection,
    serial::{
        connection::{Connection, ReadOutcome},
        connector::Connector,
        encode_hex,
    },
};

/// Tunables for readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Most bytes taken per read.
    pub read_size: usize,

    /// How long a read waits for data before checking for a stop request.
    pub poll_interval_ms: u64,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            read_size: 128,
            poll_interval_ms: 100,
        }
    }
}

impl ReaderSettings {
    /// See [`ReaderSettings::poll_interval_ms`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Zero for either field would make readers spin.
    pub fn validate(&self) -> Result<(), Error> {
        if self.read_size == 0 {
            return Err(Error::BadConfig("The read size must be above zero.".into()));
        }

        if self.poll_interval_ms == 0 {
            return Err(Error::BadConfig(
                "The poll interval must be above zero, or readers would spin.".into(),
            ));
        }

        Ok(())
    }
}

/// Where a reader is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Opening the device.
    Starting,

    /// Forwarding data.
    Reading,

    /// Told to stop, and did.
    Stopped,

    /// Could not open, or reading broke.
    Failed,
}

impl ReaderState {
    /// True for [`ReaderState::Stopped`] and [`ReaderState::Failed`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl Display for ReaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReaderState::Starting => "starting",
            ReaderState::Reading => "reading",
            ReaderState::Stopped => "stopped",
            ReaderState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Everything needed to run one reader generation.
#[derive(Debug)]
pub struct ReaderTask<C> {
    connector: Arc<C>,
    selection: Selection,
    events: EventSender,
    settings: ReaderSettings,
}

impl<C: Connector> ReaderTask<C> {
    /// Prepare a reader. It does nothing until spawned.
    pub fn new(
        connector: Arc<C>,
        selection: Selection,
        events: EventSender,
        settings: ReaderSettings,
    ) -> Self {
        Self {
            connector,
            selection,
            events,
            settings,
        }
    }

    /// Run the reader on a thread of its own.
    pub fn spawn(self) -> Result<ReaderTaskHandle, Error> {
        let generation = self.events.generation();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ReaderState::Starting);

        let span = info_span!(
            "reader",
            generation,
            device = %self.selection.device,
            baud = %self.selection.baud
        );

        let worker_cancel = cancel.clone();
        let worker = thread::Builder::new()
            .name(format!("reader-{generation}"))
            .spawn(move || {
                let _entered = span.entered();
                let state = self.run(&worker_cancel, &state_tx);
                state_tx.send_replace(state);
                state
            })
            .map_err(|e| Error::ConnectionFailed(format!("Could not start a reader: {e}")))?;

        Ok(ReaderTaskHandle {
            generation,
            cancel,
            state: state_rx,
            worker: Some(worker),
        })
    }

    fn run(self, cancel: &CancellationToken, state: &watch::Sender<ReaderState>) -> ReaderState {
        let Selection { device, baud } = &self.selection;
        debug!("Opening");

        let mut connection = match self.connector.open(device, *baud) {
            Ok(connection) => connection,
            Err(e) => {
                error!(%e, "Could not open device");
                self.events.notify(e);
                return ReaderState::Failed;
            }
        };

        self.events.show(connection.mode().baud_control());
        state.send_replace(ReaderState::Reading);
        info!(mode = ?connection.mode(), "Reading");

        let outcome = self.read_loop(&mut connection, cancel);

        if let Err(e) = connection.close() {
            warn!(%e, "Problem closing device");
            self.events.notify(Error::ShutdownFailure(format!(
                "Could not close {device}: {e}"
            )));
        }

        match outcome {
            Ok(()) => {
                info!("Stopped");
                ReaderState::Stopped
            }
            Err(e) => {
                error!(%e, "Reading failed");
                self.events.notify(e);
                ReaderState::Failed
            }
        }
    }

    fn read_loop(&self, connection: &mut Connection, cancel: &CancellationToken) -> Result<(), Error> {
        let mut buffer = vec![0; self.settings.read_size];
        let wait = self.settings.poll_interval();

        while !cancel.is_cancelled() {
            match connection.read(&mut buffer, wait) {
                Ok(ReadOutcome::Data(n)) => {
                    trace!(n, "Read");
                    self.events
                        .show(DisplayEvent::DataChunk(encode_hex(&buffer[..n])));
                }
                Ok(ReadOutcome::Idle) => continue,
                Err(e) if cancel.is_cancelled() => {
                    debug!(%e, "Read error after stop was requested");
                    break;
                }
                Err(e) => return Err(Error::StreamReadFailed(e.to_string())),
            }
        }

        Ok(())
    }
}

/// The one way to reach a running reader.
///
/// [`ReaderTaskHandle::stop`] waits until the worker has exited, and with it, closed its device.
/// Dropping a handle which was not stopped does the same, blocking the dropping thread
/// for up to about one poll interval.
#[derive(Debug)]
pub struct ReaderTaskHandle {
    generation: u64,
    cancel: CancellationToken,
    state: watch::Receiver<ReaderState>,
    worker: Option<JoinHandle<ReaderState>>,
}

impl ReaderTaskHandle {
    /// The generation this reader belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The state the reader is in.
    pub fn state(&self) -> ReaderState {
        *self.state.borrow()
    }

    /// True when the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |worker| worker.is_finished())
    }

    /// Wait until the worker exits on its own, e.g. after a failure.
    ///
    /// A worker which went away without saying how it ended counts as failed.
    pub async fn finished(&mut self) -> ReaderState {
        match self.state.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => ReaderState::Failed,
        }
    }

    /// Stop the reader and wait for its worker to exit.
    ///
    /// The device is closed when this returns, unless the worker panicked.
    pub async fn stop(mut self) -> Result<ReaderState, Error> {
        self.cancel.cancel();

        // The worker is about to exit once it has published a terminal state,
        // or gone away without one.
        let _ = self.state.wait_for(|state| state.is_terminal()).await;

        self.join()
    }

    fn join(&mut self) -> Result<ReaderState, Error> {
        let Some(worker) = self.worker.take() else {
            return Ok(self.state());
        };

        worker.join().map_err(|_| {
            Error::ShutdownFailure(format!(
                "Reader worker of generation {} panicked",
                self.generation
            ))
        })
    }
}

impl Drop for ReaderTaskHandle {
    fn drop(&mut self) {
        self.cancel.cancel();

        if self.worker.is_some() {
            debug!(generation = self.generation, "Handle dropped, waiting for reader");

            if let Err(e) = self.join() {
                warn!(%e, "Dropped reader did not exit cleanly");
            }
        }
    }
}
