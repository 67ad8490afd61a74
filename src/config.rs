use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    device::{DeviceEnumerator, DEFAULT_INDICES, DEFAULT_PREFIXES},
    error::Error,
    reader::ReaderSettings,
    serial::BaudRate,
};

/// Where to look for devices.
///
/// Each prefix gets every index from `first_index` to `last_index` (inclusive) appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Discovery {
    /// Path prefixes, e.g. `/dev/ttyS`.
    pub prefixes: Vec<String>,

    /// First numeric suffix.
    pub first_index: u8,

    /// Last numeric suffix.
    pub last_index: u8,
}

impl Default for Discovery {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            first_index: *DEFAULT_INDICES.start(),
            last_index: *DEFAULT_INDICES.end(),
        }
    }
}

impl Discovery {
    /// An enumerator matching this description.
    pub fn enumerator(&self) -> DeviceEnumerator {
        DeviceEnumerator::new(self.prefixes.clone(), self.first_index..=self.last_index)
    }
}

/// The configuration used for running the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// See [`Discovery`].
    pub discovery: Discovery,

    /// The baud rate used unless another one is selected.
    pub baud: BaudRate,

    /// See [`ReaderSettings`].
    pub reader: ReaderSettings,

    /// How long each event is held back before it is shown.
    /// Zero shows events right away.
    pub delivery_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery: Discovery::default(),
            baud: BaudRate::default(),
            reader: ReaderSettings::default(),
            delivery_delay_ms: 500,
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize and validate a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        let config = Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(format!("Could not parse configuration: {e}")))?;

        config.validate()?;

        Ok(config)
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            discovery: Discovery {
                prefixes: vec!["/dev/ttyS".into(), "/dev/ttyUSB".into()],
                first_index: 0,
                last_index: 3,
            },
            baud: BaudRate::try_from(921_600u32).expect("Supported rate"),
            reader: ReaderSettings {
                read_size: 64,
                poll_interval_ms: 50,
            },
            delivery_delay_ms: 0,
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .expect("Configuration should serialize")
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let path = p.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::BadConfig(format!("Could not read {path:?}: {e}")))?;

        Self::deserialize(&s)
    }

    /// See [`Config::delivery_delay_ms`].
    pub fn delivery_delay(&self) -> Duration {
        Duration::from_millis(self.delivery_delay_ms)
    }

    fn check_discovery(&self) -> Result<(), Error> {
        let Discovery {
            prefixes,
            first_index,
            last_index,
        } = &self.discovery;

        if prefixes.is_empty() {
            return Err(Error::BadConfig(
                "No device prefixes given, at least one is needed to find devices.".into(),
            ));
        }

        if let Some(index) = prefixes.iter().position(|p| p.trim().is_empty()) {
            return Err(Error::BadConfig(format!(
                "The prefix with index {index} (zero indexed) is empty."
            )));
        }

        if first_index > last_index {
            return Err(Error::BadConfig(format!(
                "The first index ({first_index}) is after the last index ({last_index})."
            )));
        }

        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        self.check_discovery()?;
        self.reader.validate()?;

        Ok(())
    }
}
