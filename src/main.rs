use clap::Parser;
use color_eyre::Result;
use serial_hex_monitor::{
    cli::{self, ConsoleCommand},
    config::Config,
    device::DevicePath,
    display::ConsoleSink,
    events, logging,
    monitor::{ControlSignal, Monitor, Selection},
    serial::connector::SerialConnector,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{mpsc, watch},
};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use tracing::{debug, info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        Config::new_from_path(config_path)?
    } else {
        Config::default()
    };

    if let Some(command) = cli.command {
        cli::handle_command(command, &config)?;

        return Ok(());
    }

    logging::init(cli.log_level, cli.log_dir.map(|dir| (Level::DEBUG, dir))).await;
    debug!(?config, "Configuration");

    let devices = config.discovery.enumerator().scan()?;

    let device = match cli.device {
        Some(device) => DevicePath::from(device),
        None => devices[0].clone(),
    };
    let selection = Selection::new(device, cli.baud.unwrap_or(config.baud));
    info!(%selection, "Monitoring");
    eprintln!("{}", ConsoleCommand::usage());

    let (outbox, inbox) = events::channel(config.delivery_delay());
    let (selection_tx, selection_rx) = watch::channel(selection);
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();

    let delivery = tokio::spawn(inbox.run(ConsoleSink));
    let monitor = Monitor::new(SerialConnector::new(), outbox, config.reader.clone())?;
    let monitor = tokio::spawn(monitor.run(selection_rx, signal_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    #[cfg(unix)]
    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        #[cfg(unix)]
        let hung_up = hangup.recv();
        #[cfg(not(unix))]
        let hung_up = std::future::pending::<Option<()>>();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C, quitting");
                break;
            }
            _ = hung_up => {
                info!("Told to hang up, quitting");
                break;
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    debug!("Stdin closed, Ctrl-C to quit");
                    stdin_open = false;
                    continue;
                };

                if line.trim().is_empty() {
                    continue;
                }

                match line.parse::<ConsoleCommand>() {
                    Ok(ConsoleCommand::Device(device)) => {
                        selection_tx.send_modify(|selection| *selection = selection.with_device(device));
                    }
                    Ok(ConsoleCommand::Baud(baud)) => {
                        selection_tx.send_modify(|selection| *selection = selection.with_baud(baud));
                    }
                    Ok(ConsoleCommand::Pause) => {
                        let _ = signal_tx.send(ControlSignal::Pause);
                    }
                    Ok(ConsoleCommand::Resume) => {
                        let _ = signal_tx.send(ControlSignal::Resume);
                    }
                    Ok(ConsoleCommand::Quit) => break,
                    Err(e) => warn!("{e}"),
                }
            }
        }
    }

    let _ = signal_tx.send(ControlSignal::Shutdown);
    monitor.await?;
    drop(selection_tx);
    delivery.await?;

    Ok(())
}
