use std::{
    fmt::Display,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::Error;

/// The tty prefixes probed when nothing else is configured.
pub const DEFAULT_PREFIXES: [&str; 4] = ["/dev/ttyS", "/dev/ttyHS", "/dev/ttyMSM", "/dev/ttyHSL"];

/// The numeric suffixes probed for each prefix when nothing else is configured.
pub const DEFAULT_INDICES: RangeInclusive<u8> = 0..=9;

/// A path to a character device, such as `/dev/ttyS0`.
///
/// An empty path means no device is selected.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Default, PartialOrd, Ord)]
pub struct DevicePath(String);

impl DevicePath {
    /// Create a device path.
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self(path.into())
    }

    /// True if no device is selected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrowed form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// As a filesystem path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl From<&str> for DevicePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for DevicePath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl From<PathBuf> for DevicePath {
    fn from(path: PathBuf) -> Self {
        Self(path.to_string_lossy().into_owned())
    }
}

impl Display for DevicePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Finds devices worth monitoring.
///
/// Every prefix is combined with every index, e.g. `/dev/ttyS` and `3` gives `/dev/ttyS3`.
/// Results keep prefix order first, then index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEnumerator {
    prefixes: Vec<String>,
    indices: RangeInclusive<u8>,
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIXES, DEFAULT_INDICES)
    }
}

impl DeviceEnumerator {
    /// An enumerator over the given prefixes and indices.
    pub fn new<I, S>(prefixes: I, indices: RangeInclusive<u8>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            indices,
        }
    }

    /// All paths that would be checked, in order.
    pub fn candidates(&self) -> impl Iterator<Item = DevicePath> + '_ {
        self.prefixes
            .iter()
            .cartesian_product(self.indices.clone())
            .map(|(prefix, index)| DevicePath::new(format!("{prefix}{index}")))
    }

    /// The candidates which exist and are readable right now.
    ///
    /// Nothing is opened, so this has no effect on the devices themselves.
    /// An empty result is [`Error::NoDevicesFound`].
    pub fn scan(&self) -> Result<Vec<DevicePath>, Error> {
        let found = self
            .candidates()
            .filter(|candidate| {
                let readable = is_readable(candidate.as_path());
                trace!(%candidate, readable);
                readable
            })
            .collect::<Vec<_>>();

        if found.is_empty() {
            debug!(prefixes = ?self.prefixes, indices = ?self.indices, "Nothing found");
            return Err(Error::NoDevicesFound);
        }

        info!("Found {} device(s): {}", found.len(), found.iter().join(", "));

        Ok(found)
    }
}

#[cfg(unix)]
fn is_readable(path: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};

    access(path, AccessFlags::R_OK).is_ok()
}

#[cfg(not(unix))]
fn is_readable(path: &Path) -> bool {
    std::fs::File::open(path).is_ok()
}
