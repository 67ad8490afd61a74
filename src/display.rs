use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;
use itertools::Itertools;
use tracing::warn;

use crate::{
    error::Error,
    events::{DisplayEvent, PresentationSink},
};

/// What a screen showing the monitor's output would hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayBuffer {
    /// Hex chunks in arrival order.
    pub chunks: Vec<String>,

    /// Whether the baud selector is visible.
    /// `None` until a connection told us.
    pub baud_control_visible: Option<bool>,

    /// Errors the operator was told about.
    pub notices: Vec<Error>,
}

impl DisplayBuffer {
    /// The chunks as one text, tab separated.
    pub fn text(&self) -> String {
        self.chunks.iter().join(" \t ")
    }
}

impl PresentationSink for DisplayBuffer {
    fn show(&mut self, event: DisplayEvent) {
        match event {
            DisplayEvent::DataChunk(hex) => self.chunks.push(hex),
            DisplayEvent::ShowBaudControl => self.baud_control_visible = Some(true),
            DisplayEvent::HideBaudControl => self.baud_control_visible = Some(false),
        }
    }

    fn clear(&mut self) {
        self.chunks.clear();
    }

    fn notify(&mut self, error: &Error) {
        self.notices.push(error.clone());
    }
}

/// A [`DisplayBuffer`] which can be inspected while it is being fed.
#[derive(Debug, Clone, Default)]
pub struct SharedDisplay(Arc<Mutex<DisplayBuffer>>);

impl SharedDisplay {
    /// An empty display.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> DisplayBuffer {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, DisplayBuffer> {
        self.0.lock().expect("Display lock should not be poisoned")
    }
}

impl PresentationSink for SharedDisplay {
    fn show(&mut self, event: DisplayEvent) {
        self.lock().show(event)
    }

    fn clear(&mut self) {
        self.lock().clear()
    }

    fn notify(&mut self, error: &Error) {
        self.lock().notify(error)
    }
}

/// Prints events to stdout, one per line.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl PresentationSink for ConsoleSink {
    fn show(&mut self, event: DisplayEvent) {
        let now = Local::now().format("%H:%M:%S%.3f");

        match event {
            DisplayEvent::DataChunk(hex) => println!("{now} {hex}"),
            DisplayEvent::ShowBaudControl => println!("{now} [baud rate applied]"),
            DisplayEvent::HideBaudControl => println!("{now} [baud rate not applicable]"),
        }
    }

    fn clear(&mut self) {
        println!("----");
    }

    fn notify(&mut self, error: &Error) {
        warn!(%error, "Monitor problem");
        eprintln!("{error}");
    }
}
