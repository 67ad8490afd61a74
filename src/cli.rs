use std::{path::PathBuf, str::FromStr};

use clap::{Parser, Subcommand};
use itertools::Itertools;
use tracing::Level;

use crate::{config::Config, device::DevicePath, error::Error, serial::BaudRate};

/// The command line interface for the serial hex monitor.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    pub config: Option<PathBuf>,

    /// Device to monitor. The first discovered device if not given.
    #[arg(short, long)]
    pub device: Option<String>,

    /// Baud rate. The configured default if not given.
    #[arg(short, long)]
    pub baud: Option<BaudRate>,

    /// Most verbose level logged to stderr.
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Also log (at debug level) to daily files in this directory.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),

    /// List devices which could be monitored.
    Devices,

    /// List supported baud rates.
    Bauds,
}

/// Helpful examples for users.
#[derive(Subcommand, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,
}

/// Handle a subcommand, printing its result.
pub fn handle_command(command: Commands, config: &Config) -> Result<(), Error> {
    match command {
        Commands::Examples(Examples::Config) => {
            println!("{}", Config::example().serialize_pretty());
        }
        Commands::Devices => {
            for device in config.discovery.enumerator().scan()? {
                println!("{device}");
            }
        }
        Commands::Bauds => {
            for baud in BaudRate::ALL {
                if baud == config.baud {
                    println!("{baud} (default)");
                } else {
                    println!("{baud}");
                }
            }
        }
    }

    Ok(())
}

/// Something typed at the console while monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Switch to another device.
    Device(DevicePath),

    /// Switch to another speed.
    Baud(BaudRate),

    /// Stop reading.
    Pause,

    /// Clear and reconnect.
    Resume,

    /// Exit.
    Quit,
}

impl ConsoleCommand {
    /// What can be typed.
    pub fn usage() -> String {
        format!(
            "Commands: device <path>, baud <{}>, pause, resume, quit",
            BaudRate::ALL.iter().join("|")
        )
    }
}

impl FromStr for ConsoleCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();

        let command = match (words.next(), words.next()) {
            (Some("device" | "d"), Some(path)) => Self::Device(DevicePath::from(path)),
            (Some("baud" | "b"), Some(rate)) => Self::Baud(rate.parse()?),
            (Some("pause" | "p"), None) => Self::Pause,
            (Some("resume" | "r"), None) => Self::Resume,
            (Some("quit" | "q"), None) => Self::Quit,
            _ => {
                return Err(Error::BadUsage(format!(
                    "Unknown command `{}`. {}",
                    s.trim(),
                    Self::usage()
                )))
            }
        };

        if words.next().is_some() {
            return Err(Error::BadUsage(format!(
                "Too many arguments in `{}`. {}",
                s.trim(),
                Self::usage()
            )));
        }

        Ok(command)
    }
}
