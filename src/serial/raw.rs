use std::{
    fs::{File, OpenOptions},
    io::{self, Read},
    time::Duration,
};

use crate::{
    device::DevicePath,
    error::Error,
    serial::connection::{ByteSource, ReadOutcome},
};

/// A device read as a plain file.
struct RawSource {
    file: File,
}

pub(crate) fn open(device: &DevicePath) -> Result<Box<dyn ByteSource>, Error> {
    let mut options = OpenOptions::new();
    options.read(true);

    // Opening a tty may otherwise block waiting for carrier.
    #[cfg(unix)]
    {
        use nix::fcntl::OFlag;
        use std::os::unix::fs::OpenOptionsExt;

        options.custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits());
    }

    let file = options
        .open(device.as_path())
        .map_err(|e| Error::connection_failed(device, e))?;

    Ok(Box::new(RawSource { file }))
}

impl RawSource {
    #[cfg(unix)]
    fn wait_readable(&self, wait: Duration) -> io::Result<bool> {
        use nix::{
            errno::Errno,
            poll::{poll, PollFd, PollFlags},
        };
        use std::os::unix::io::AsRawFd;

        let mut fds = [PollFd::new(self.file.as_raw_fd(), PollFlags::POLLIN)];
        let timeout = i32::try_from(wait.as_millis()).unwrap_or(i32::MAX);

        match poll(&mut fds, timeout) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(not(unix))]
    fn wait_readable(&self, _wait: Duration) -> io::Result<bool> {
        Ok(true)
    }
}

impl ByteSource for RawSource {
    fn read(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<ReadOutcome> {
        if !self.wait_readable(wait)? {
            return Ok(ReadOutcome::Idle);
        }

        match self.file.read(buf) {
            Ok(0) if !buf.is_empty() => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of stream",
            )),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                Ok(ReadOutcome::Idle)
            }
            Err(e) => Err(e),
        }
    }

    #[cfg(unix)]
    fn close(self: Box<Self>) -> io::Result<()> {
        use std::os::unix::io::IntoRawFd;

        let RawSource { file } = *self;
        nix::unistd::close(file.into_raw_fd()).map_err(io::Error::from)
    }
}
