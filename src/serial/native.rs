//! Devices opened through the serial port API.
//!
//! Before opening, the device is probed for terminal support.
//! A device without it (a pipe, a regular file, `/dev/null`...) yields
//! [`Error::NativeApiUnavailable`] so the caller can fall back.

use crate::{
    device::DevicePath,
    error::Error,
    serial::{connection::ByteSource, BaudRate},
};

#[cfg(feature = "native-serial")]
pub(crate) use port::open;

#[cfg(not(feature = "native-serial"))]
pub(crate) fn open(_device: &DevicePath, _baud: BaudRate) -> Result<Box<dyn ByteSource>, Error> {
    Err(Error::NativeApiUnavailable(
        "built without the `native-serial` feature".into(),
    ))
}

#[cfg(feature = "native-serial")]
mod port {
    use std::{
        io::{self, Read},
        time::Duration,
    };

    use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
    use tracing::{debug, trace};

    use super::*;
    use crate::serial::connection::ReadOutcome;

    const INITIAL_TIMEOUT: Duration = Duration::from_millis(100);

    struct NativeSource {
        port: Box<dyn SerialPort>,
        timeout: Duration,
    }

    impl ByteSource for NativeSource {
        fn read(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<ReadOutcome> {
            if self.timeout != wait {
                trace!(?wait, "Adjusting port timeout");
                self.port.set_timeout(wait)?;
                self.timeout = wait;
            }

            match self.port.read(buf) {
                Ok(n) => Ok(ReadOutcome::Data(n)),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    Ok(ReadOutcome::Idle)
                }
                Err(e) => Err(e),
            }
        }
    }

    pub(crate) fn open(device: &DevicePath, baud: BaudRate) -> Result<Box<dyn ByteSource>, Error> {
        probe(device)?;

        let port = serialport::new(device.as_str(), baud.as_u32())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(INITIAL_TIMEOUT)
            .open()
            .map_err(|e| {
                Error::ConnectionFailed(format!("Could not open {device} at {baud} baud: {e}"))
            })?;

        debug!(%device, %baud, "Serial port configured");

        Ok(Box::new(NativeSource {
            port,
            timeout: INITIAL_TIMEOUT,
        }))
    }

    #[cfg(unix)]
    fn probe(device: &DevicePath) -> Result<(), Error> {
        use std::{
            fs::OpenOptions,
            os::unix::{
                fs::{FileTypeExt, OpenOptionsExt},
                io::AsRawFd,
            },
        };

        use nix::{errno::Errno, fcntl::OFlag, sys::termios};

        let metadata = std::fs::metadata(device.as_path())
            .map_err(|e| Error::connection_failed(device, e))?;

        if !metadata.file_type().is_char_device() {
            return Err(Error::NativeApiUnavailable(format!(
                "{device} is not a character device"
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
            .open(device.as_path())
            .map_err(|e| Error::connection_failed(device, e))?;

        match termios::tcgetattr(file.as_raw_fd()) {
            Ok(_) => Ok(()),
            Err(Errno::ENOTTY) => Err(Error::NativeApiUnavailable(format!(
                "{device} is not a terminal"
            ))),
            Err(e) => Err(Error::connection_failed(device, e.into())),
        }
    }

    #[cfg(not(unix))]
    fn probe(_device: &DevicePath) -> Result<(), Error> {
        Ok(())
    }
}
