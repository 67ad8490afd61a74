use std::{fmt::Debug, io, time::Duration};

use crate::{events::DisplayEvent, serial::BaudRate};

/// What a single read produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were placed at the start of the buffer.
    /// May be zero.
    Data(usize),

    /// Nothing arrived within the allowed wait.
    Idle,
}

/// Something bytes can be read from.
///
/// Reads must give up after roughly `wait` so the caller can check
/// whether it should stop.
pub trait ByteSource: Send {
    /// Read into `buf`, waiting at most about `wait` for data.
    fn read(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<ReadOutcome>;

    /// Release the source.
    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

/// How a [`Connection`] was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Through the serial port API, running at the given rate.
    Native(BaudRate),

    /// As a plain file. No line settings were applied.
    Fallback,
}

impl OpenMode {
    /// Whether the baud rate selector is meaningful for this connection.
    pub fn baud_control(&self) -> DisplayEvent {
        match self {
            OpenMode::Native(_) => DisplayEvent::ShowBaudControl,
            OpenMode::Fallback => DisplayEvent::HideBaudControl,
        }
    }
}

/// An open device.
pub struct Connection {
    source: Box<dyn ByteSource>,
    mode: OpenMode,
}

impl Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wrap an opened source.
    pub fn new(source: Box<dyn ByteSource>, mode: OpenMode) -> Self {
        Self { source, mode }
    }

    /// How this was opened.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// True if the device is read as a plain file and the baud rate was not applied.
    pub fn used_fallback(&self) -> bool {
        self.mode == OpenMode::Fallback
    }

    /// See [`ByteSource::read`].
    pub fn read(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<ReadOutcome> {
        self.source.read(buf, wait)
    }

    /// Close the underlying device, reporting any problem doing so.
    pub fn close(self) -> io::Result<()> {
        self.source.close()
    }
}
