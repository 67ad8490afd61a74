#![deny(missing_docs)]

//! This crate monitors a serial device and shows incoming bytes as hex.
//!
//! Candidate devices are found by probing tty path prefixes such as `/dev/ttyS`
//! with the suffixes `0` to `9`.
//! A [`monitor::Monitor`] then reads the selected device at the selected baud rate.
//!
//! Devices which are terminals are opened through the serial port API and get their
//! baud rate applied.
//! Anything else (or every device, when built without the `native-serial` feature)
//! is read as a plain file, and the baud rate is ignored.
//!
//! Output travels through an ordered channel to a [`events::PresentationSink`].
//! Changing the selection stops the running reader before a new one is started,
//! and anything the old reader produced which has not yet been shown is discarded.

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Device paths, and finding devices worth monitoring.
pub mod device;

/// Things which present the monitor's output.
pub mod display;

/// Possible errors in this library.
pub mod error;

/// Events readers emit, and the channel delivering them.
pub mod events;

/// Logging/tracing setup.
pub mod logging;

/// Keeps at most one reader running for the current selection.
pub mod monitor;

/// Reads an open device on a worker of its own.
pub mod reader;

/// Serial device access.
pub mod serial;
