use std::io;

use thiserror::Error;

use crate::device::DevicePath;

/// Errors thay may occur in this library.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Discovery found nothing to monitor.
    #[error("No serial devices found")]
    NoDevicesFound,

    /// The device could not be opened.
    /// Picking another device (or retrying) may help.
    #[error("Failed to open device: {0}")]
    ConnectionFailed(String),

    /// The native serial API can not be used for this device.
    /// The connector reacts to this by reading the device as a plain file.
    #[error("Native serial access unavailable: {0}")]
    NativeApiUnavailable(String),

    /// Reading from an open device failed.
    #[error("Failed to read device: {0}")]
    StreamReadFailed(String),

    /// Releasing a reader's resources did not go cleanly.
    #[error("Failed to shut down reader: {0}")]
    ShutdownFailure(String),

    /// The configuration was not valid.
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// The user did something which is not valid.
    /// For example, asking for an unsupported baud rate.
    #[error("The request did not conform to valid usage. Problem: `{0}`")]
    BadUsage(String),
}

impl Error {
    pub(crate) fn connection_failed(device: &DevicePath, e: io::Error) -> Self {
        Self::ConnectionFailed(format!("{device}: {e}"))
    }

    /// Whether the operator can recover from this by picking a device again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::StreamReadFailed(_) | Self::ShutdownFailure(_)
        )
    }

    /// Get the inner problem if this is a bad config error.
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        if let Self::BadConfig(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }
}
