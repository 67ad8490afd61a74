use std::{io, time::Duration};

use color_eyre::Result;
use pretty_assertions::assert_eq;
use serial_hex_monitor::{
    error::Error,
    events,
    monitor::{ControlSignal, Monitor, Selection},
    reader::{ReaderSettings, ReaderState},
    serial::BaudRate,
};
use tokio::sync::{mpsc, watch};

mod common;
use common::{baud, eventually, monitor, monitor_with_delay, Plan, ScriptedConnector, Step};

#[tokio::test]
async fn rapid_selection_changes_leave_a_single_reader() -> Result<()> {
    let connector = ScriptedConnector::new();
    let (mut monitor, _display) = monitor(connector.clone());

    for rate in BaudRate::ALL {
        monitor
            .on_selection_changed(Selection::new("/dev/fake0", rate))
            .await;
    }
    let n = BaudRate::ALL.len();

    // Every replaced reader was closed before its successor started.
    assert_eq!(connector.closes(), n - 1);

    eventually(|| connector.opens() == n).await?;
    assert_eq!(connector.live(), 1);
    assert_eq!(connector.max_live(), 1);

    let active = monitor.active().expect("Last selection should be read");
    assert_eq!(active.generation(), n as u64);

    Ok(())
}

#[tokio::test]
async fn same_selection_is_a_no_op() -> Result<()> {
    let connector = ScriptedConnector::new();
    let (mut monitor, _display) = monitor(connector.clone());
    let selection = Selection::new("/dev/fake0", baud(9600));

    monitor.on_selection_changed(selection.clone()).await;
    eventually(|| connector.opens() == 1).await?;

    monitor.on_selection_changed(selection).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(connector.opens(), 1);
    assert_eq!(connector.closes(), 0);
    assert_eq!(monitor.active().map(|a| a.generation()), Some(1));

    Ok(())
}

#[tokio::test]
async fn empty_device_starts_nothing() -> Result<()> {
    let connector = ScriptedConnector::new();
    let (mut monitor, _display) = monitor(connector.clone());

    monitor
        .on_selection_changed(Selection::new("/dev/fake0", baud(9600)))
        .await;
    eventually(|| connector.opens() == 1).await?;

    monitor
        .on_selection_changed(Selection::new("", baud(9600)))
        .await;

    assert!(monitor.active().is_none());
    assert_eq!(connector.closes(), 1);
    assert_eq!(connector.live(), 0);

    Ok(())
}

#[tokio::test]
async fn pause_stops_reading_and_keeps_the_selection() -> Result<()> {
    let connector = ScriptedConnector::new();
    let (mut monitor, _display) = monitor(connector.clone());
    let selection = Selection::new("/dev/fake0", baud(38400));

    monitor.on_selection_changed(selection.clone()).await;
    eventually(|| connector.opens() == 1).await?;

    monitor.pause().await;

    assert!(monitor.active().is_none());
    assert_eq!(connector.closes(), 1);
    assert_eq!(monitor.selection(), &selection);

    // Pausing twice is harmless.
    monitor.pause().await;
    assert_eq!(connector.closes(), 1);

    monitor.resume().await;
    eventually(|| connector.opens() == 2).await?;
    assert_eq!(connector.max_live(), 1);

    Ok(())
}

#[tokio::test]
async fn resume_clears_the_display_and_reconnects() -> Result<()> {
    let connector = ScriptedConnector::new();
    connector.script("/dev/fake0", Plan::data(&[0xAA]));
    let (mut monitor, display) = monitor(connector.clone());

    monitor
        .on_selection_changed(Selection::new("/dev/fake0", baud(115200)))
        .await;
    eventually(|| display.snapshot().text() == "AA").await?;

    monitor.resume().await;

    eventually(|| connector.opens() == 2).await?;
    eventually(|| display.snapshot().chunks.is_empty()).await?;
    assert_eq!(connector.closes(), 1);

    Ok(())
}

#[tokio::test]
async fn resume_clears_the_display_without_waiting_for_the_delay() -> Result<()> {
    let connector = ScriptedConnector::new();
    connector.script("/dev/fake0", Plan::data(&[0xAA]));
    let (mut monitor, display) =
        monitor_with_delay(connector.clone(), Duration::from_millis(500));

    monitor
        .on_selection_changed(Selection::new("/dev/fake0", baud(115200)))
        .await;
    eventually(|| display.snapshot().text() == "AA").await?;

    monitor.resume().await;

    tokio::time::timeout(
        Duration::from_millis(200),
        eventually(|| display.snapshot().chunks.is_empty()),
    )
    .await??;

    Ok(())
}

#[tokio::test]
async fn dropping_the_monitor_releases_the_device() -> Result<()> {
    let connector = ScriptedConnector::new();
    let (mut monitor, _display) = monitor(connector.clone());

    monitor
        .on_selection_changed(Selection::new("/dev/fake0", baud(9600)))
        .await;
    eventually(|| connector.opens() == 1).await?;

    drop(monitor);

    assert_eq!(connector.closes(), 1);
    assert_eq!(connector.live(), 0);

    Ok(())
}

#[tokio::test]
async fn spinning_settings_are_rejected() -> Result<()> {
    for settings in [
        ReaderSettings {
            read_size: 0,
            poll_interval_ms: 10,
        },
        ReaderSettings {
            read_size: 128,
            poll_interval_ms: 0,
        },
    ] {
        let (outbox, _inbox) = events::channel(Duration::ZERO);
        let e = Monitor::new(ScriptedConnector::new(), outbox, settings).unwrap_err();

        assert!(matches!(e, Error::BadConfig(_)), "{e:?}");
    }

    Ok(())
}

#[tokio::test]
async fn data_is_shown_as_hex_in_order() -> Result<()> {
    let connector = ScriptedConnector::new();
    connector.script(
        "/dev/fake0",
        Plan {
            fallback: true,
            steps: vec![
                Step::Data(vec![0x0A, 0xFF]),
                Step::Data(vec![]),
                Step::Data(vec![0x00, 0x1F]),
            ],
            ..Default::default()
        },
    );
    let (mut monitor, display) = monitor(connector.clone());

    monitor
        .on_selection_changed(Selection::new("/dev/fake0", baud(9600)))
        .await;

    eventually(|| display.snapshot().chunks.len() == 3).await?;

    let snapshot = display.snapshot();
    assert_eq!(snapshot.chunks, vec!["0A,FF", "", "00,1F"]);
    assert_eq!(snapshot.baud_control_visible, Some(false));
    assert!(snapshot.notices.is_empty());

    Ok(())
}

#[tokio::test]
async fn baud_control_follows_the_open_mode() -> Result<()> {
    let connector = ScriptedConnector::new();
    connector.script(
        "/dev/plain",
        Plan {
            fallback: true,
            ..Default::default()
        },
    );
    let (mut monitor, display) = monitor(connector.clone());

    monitor
        .on_selection_changed(Selection::new("/dev/native", baud(9600)))
        .await;
    eventually(|| display.snapshot().baud_control_visible == Some(true)).await?;

    monitor
        .on_selection_changed(Selection::new("/dev/plain", baud(9600)))
        .await;
    eventually(|| display.snapshot().baud_control_visible == Some(false)).await?;

    Ok(())
}

#[tokio::test]
async fn open_failure_is_notified() -> Result<()> {
    let connector = ScriptedConnector::new();
    connector.script(
        "/dev/busy",
        Plan::open_error(Error::ConnectionFailed("busy".into())),
    );
    let (mut monitor, display) = monitor(connector.clone());

    monitor
        .on_selection_changed(Selection::new("/dev/busy", baud(9600)))
        .await;

    eventually(|| monitor.active().map_or(false, |a| a.is_finished())).await?;
    assert_eq!(monitor.active().map(|a| a.state()), Some(ReaderState::Failed));

    eventually(|| !display.snapshot().notices.is_empty()).await?;
    assert_eq!(
        display.snapshot().notices,
        vec![Error::ConnectionFailed("busy".into())]
    );
    assert_eq!(connector.opens(), 0);

    // Another device can still be picked.
    monitor
        .on_selection_changed(Selection::new("/dev/fake0", baud(9600)))
        .await;
    eventually(|| connector.opens() == 1).await?;

    Ok(())
}

#[tokio::test]
async fn read_failure_is_notified_and_the_device_closed() -> Result<()> {
    let connector = ScriptedConnector::new();
    connector.script(
        "/dev/flaky",
        Plan {
            steps: vec![
                Step::Data(vec![0x01, 0x02]),
                Step::Fail(io::ErrorKind::BrokenPipe),
                Step::Data(vec![0x03]),
            ],
            ..Default::default()
        },
    );
    let (mut monitor, display) = monitor(connector.clone());

    monitor
        .on_selection_changed(Selection::new("/dev/flaky", baud(9600)))
        .await;

    eventually(|| !display.snapshot().notices.is_empty()).await?;

    let snapshot = display.snapshot();
    assert_eq!(snapshot.text(), "01,02");
    assert!(matches!(
        snapshot.notices.as_slice(),
        [Error::StreamReadFailed(_)]
    ));

    eventually(|| connector.closes() == 1).await?;
    assert_eq!(connector.live(), 0);
    assert_eq!(monitor.active().map(|a| a.state()), Some(ReaderState::Failed));

    Ok(())
}

#[tokio::test]
async fn close_failure_does_not_block_the_next_reader() -> Result<()> {
    let connector = ScriptedConnector::new();
    connector.script(
        "/dev/sticky",
        Plan {
            fail_close: true,
            ..Default::default()
        },
    );
    let (mut monitor, display) = monitor(connector.clone());

    monitor
        .on_selection_changed(Selection::new("/dev/sticky", baud(9600)))
        .await;
    eventually(|| connector.opens() == 1).await?;

    monitor
        .on_selection_changed(Selection::new("/dev/fake0", baud(9600)))
        .await;
    eventually(|| connector.opens() == 2).await?;

    eventually(|| !display.snapshot().notices.is_empty()).await?;
    assert!(matches!(
        display.snapshot().notices.as_slice(),
        [Error::ShutdownFailure(_)]
    ));
    assert_eq!(connector.max_live(), 1);

    Ok(())
}

#[tokio::test]
async fn output_of_replaced_reader_is_not_shown() -> Result<()> {
    let connector = ScriptedConnector::new();
    connector.script(
        "/dev/old",
        Plan {
            fallback: true,
            steps: vec![Step::Data(vec![0xAA])],
            ..Default::default()
        },
    );
    let (mut monitor, display) =
        monitor_with_delay(connector.clone(), Duration::from_millis(300));

    monitor
        .on_selection_changed(Selection::new("/dev/old", baud(9600)))
        .await;
    eventually(|| connector.opens() == 1).await?;

    monitor
        .on_selection_changed(Selection::new("/dev/new", baud(9600)))
        .await;

    eventually(|| display.snapshot().baud_control_visible == Some(true)).await?;

    let snapshot = display.snapshot();
    assert!(snapshot.chunks.is_empty(), "{snapshot:?}");

    Ok(())
}

#[tokio::test]
async fn run_follows_selections_and_signals() -> Result<()> {
    let connector = ScriptedConnector::new();
    let (monitor, _display) = monitor(connector.clone());

    let selection = Selection::new("/dev/fake0", baud(9600));
    let (selection_tx, selection_rx) = watch::channel(selection.clone());
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();

    let running = tokio::spawn(monitor.run(selection_rx, signal_rx));

    eventually(|| connector.opens() == 1).await?;

    selection_tx.send(selection.with_baud(baud(57600)))?;
    eventually(|| connector.opens() == 2 && connector.closes() == 1).await?;

    signal_tx.send(ControlSignal::Pause)?;
    eventually(|| connector.closes() == 2).await?;

    signal_tx.send(ControlSignal::Resume)?;
    eventually(|| connector.opens() == 3).await?;

    signal_tx.send(ControlSignal::Shutdown)?;
    tokio::time::timeout(Duration::from_secs(5), running).await??;

    assert_eq!(connector.closes(), 3);
    assert_eq!(connector.live(), 0);
    assert_eq!(connector.max_live(), 1);

    Ok(())
}

#[tokio::test]
async fn run_ends_when_signals_are_gone() -> Result<()> {
    let connector = ScriptedConnector::new();
    let (monitor, _display) = monitor(connector.clone());

    let (_selection_tx, selection_rx) =
        watch::channel(Selection::new("/dev/fake0", baud(9600)));
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();

    let running = tokio::spawn(monitor.run(selection_rx, signal_rx));
    eventually(|| connector.opens() == 1).await?;

    drop(signal_tx);
    tokio::time::timeout(Duration::from_secs(5), running).await??;

    assert_eq!(connector.live(), 0);

    Ok(())
}
