use std::{fmt::Display, str::FromStr};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// An open byte source and how it was opened.
pub mod connection;

/// Opening devices, natively or as plain files.
pub mod connector;

/// The native (line speed aware) open strategy.
pub(crate) mod native;

/// The plain file open strategy.
pub(crate) mod raw;

/// A line speed the monitor supports.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BaudRate(u32);

impl BaudRate {
    /// Every supported rate, slowest first.
    pub const ALL: [BaudRate; 11] = [
        BaudRate(9_600),
        BaudRate(19_200),
        BaudRate(28_800),
        BaudRate(38_400),
        BaudRate(57_600),
        BaudRate(76_800),
        BaudRate(115_200),
        BaudRate(230_400),
        BaudRate(460_800),
        BaudRate(576_000),
        BaudRate(921_600),
    ];

    /// Bits per second.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self(115_200)
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|baud| baud.0 == value)
            .ok_or_else(|| {
                Error::BadUsage(format!(
                    "Unsupported baud rate {value}, use one of: {}",
                    Self::ALL.iter().join(", ")
                ))
            })
    }
}

impl From<BaudRate> for u32 {
    fn from(baud: BaudRate) -> Self {
        baud.0
    }
}

impl FromStr for BaudRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::BadUsage(format!("`{s}` is not a baud rate: {e}")))?;

        Self::try_from(value)
    }
}

impl Display for BaudRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render bytes as uppercase hex octets separated by commas.
///
/// No bytes gives an empty string.
pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02X}")).join(",")
}
