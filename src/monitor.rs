//! The monitor decides which reader runs.
//!
//! It owns the current [`Selection`] and at most one [`ReaderTaskHandle`].
//! A reader is always fully stopped before the next one starts,
//! so two generations never read at the same time.

use std::{fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    device::DevicePath,
    error::Error,
    events::{EventSender, Outbox},
    reader::{ReaderSettings, ReaderTask, ReaderTaskHandle},
    serial::{connector::Connector, BaudRate},
};

/// The device and speed to monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    /// What to read from. Empty means nothing.
    pub device: DevicePath,

    /// How fast, if the device allows setting it.
    pub baud: BaudRate,
}

impl Selection {
    /// Select a device at a baud rate.
    pub fn new<D: Into<DevicePath>>(device: D, baud: BaudRate) -> Self {
        Self {
            device: device.into(),
            baud,
        }
    }

    /// The same device at another rate.
    pub fn with_baud(&self, baud: BaudRate) -> Self {
        Self {
            device: self.device.clone(),
            baud,
        }
    }

    /// Another device at the same rate.
    pub fn with_device<D: Into<DevicePath>>(&self, device: D) -> Self {
        Self {
            device: device.into(),
            baud: self.baud,
        }
    }
}

impl Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.device.is_empty() {
            write!(f, "<none> @ {}", self.baud)
        } else {
            write!(f, "{} @ {}", self.device, self.baud)
        }
    }
}

/// Lifecycle requests from the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Stop reading, keep the selection.
    Pause,

    /// Clear the display and reconnect.
    Resume,

    /// Stop reading and return from [`Monitor::run`].
    Shutdown,
}

/// Starts and stops readers according to the selection.
#[derive(Debug)]
pub struct Monitor<C> {
    connector: Arc<C>,
    outbox: Outbox,
    settings: ReaderSettings,
    selection: Selection,
    active: Option<ReaderTaskHandle>,
}

impl<C: Connector> Monitor<C> {
    /// A monitor with nothing selected.
    ///
    /// Fails if the settings would make readers spin.
    pub fn new(connector: C, outbox: Outbox, settings: ReaderSettings) -> Result<Self, Error> {
        settings.validate()?;

        Ok(Self {
            connector: Arc::new(connector),
            outbox,
            settings,
            selection: Selection::default(),
            active: None,
        })
    }

    /// The current selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The running reader, if any.
    pub fn active(&self) -> Option<&ReaderTaskHandle> {
        self.active.as_ref()
    }

    /// React to the operator picking a device or speed.
    ///
    /// Nothing happens if the selection did not actually change.
    pub async fn on_selection_changed(&mut self, selection: Selection) {
        if selection == self.selection {
            debug!(%selection, "Selection unchanged");
            return;
        }

        info!(from = %self.selection, to = %selection, "Selection changed");
        self.selection = selection;

        self.stop().await;
        let events = self.outbox.next_generation();
        self.start(events);
    }

    /// Stop reading. The selection is kept for [`Monitor::resume`].
    pub async fn pause(&mut self) {
        debug!("Pausing");
        self.stop().await;
    }

    /// Clear the display and start reading the current selection anew,
    /// even if it has not changed.
    pub async fn resume(&mut self) {
        debug!(selection = %self.selection, "Resuming");

        self.stop().await;
        let events = self.outbox.next_generation();
        events.clear();
        self.start(events);
    }

    /// Process selection changes and signals until told to shut down.
    ///
    /// The selection in `selections` at the time of calling is applied first.
    /// The active reader is stopped before returning.
    pub async fn run(
        mut self,
        mut selections: watch::Receiver<Selection>,
        mut signals: mpsc::UnboundedReceiver<ControlSignal>,
    ) {
        let initial = selections.borrow_and_update().clone();
        self.on_selection_changed(initial).await;

        let mut watching = true;

        loop {
            tokio::select! {
                changed = selections.changed(), if watching => {
                    if changed.is_err() {
                        debug!("Selection source gone");
                        watching = false;
                        continue;
                    }
                    let selection = selections.borrow_and_update().clone();
                    self.on_selection_changed(selection).await;
                }
                signal = signals.recv() => match signal {
                    Some(ControlSignal::Pause) => self.pause().await,
                    Some(ControlSignal::Resume) => self.resume().await,
                    Some(ControlSignal::Shutdown) | None => {
                        info!("Shutting down");
                        break;
                    }
                }
            }
        }

        self.stop().await;
    }

    async fn stop(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };

        let generation = handle.generation();

        match handle.stop().await {
            Ok(state) => debug!(generation, %state, "Reader released"),
            Err(e) => {
                warn!(generation, %e, "Reader did not stop cleanly");
                self.outbox.current().notify(e);
            }
        }
    }

    fn start(&mut self, events: EventSender) {
        debug_assert!(self.active.is_none(), "Previous reader must be stopped first");

        if self.selection.device.is_empty() {
            debug!("No device selected, not reading");
            return;
        }

        let task = ReaderTask::new(
            self.connector.clone(),
            self.selection.clone(),
            events,
            self.settings.clone(),
        );

        match task.spawn() {
            Ok(handle) => self.active = Some(handle),
            Err(e) => {
                warn!(%e, "Reader not started");
                self.outbox.current().notify(e);
            }
        }
    }
}
