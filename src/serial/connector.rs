use tracing::{debug, info};

use crate::{
    device::DevicePath,
    error::Error,
    serial::{
        connection::{Connection, OpenMode},
        native, raw, BaudRate,
    },
};

/// Opens devices for reading.
pub trait Connector: Send + Sync + 'static {
    /// Open `device`, applying `baud` if the way it is opened allows it.
    fn open(&self, device: &DevicePath, baud: BaudRate) -> Result<Connection, Error>;
}

/// Opens devices through the serial port API when possible,
/// and as plain files when the device does not support it.
///
/// Only a missing capability leads to the plain file.
/// Errors such as a missing device or a permission problem are returned as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl SerialConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for SerialConnector {
    fn open(&self, device: &DevicePath, baud: BaudRate) -> Result<Connection, Error> {
        match native::open(device, baud) {
            Ok(source) => {
                info!(%device, %baud, "Opened natively");
                Ok(Connection::new(source, OpenMode::Native(baud)))
            }
            Err(Error::NativeApiUnavailable(reason)) => {
                debug!(%device, %reason, "Falling back to plain file");
                let source = raw::open(device)?;
                info!(%device, "Opened as plain file, baud rate not applied");

                Ok(Connection::new(source, OpenMode::Fallback))
            }
            Err(e) => Err(e),
        }
    }
}
