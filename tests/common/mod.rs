#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use color_eyre::Result;
use serial_hex_monitor::{
    device::DevicePath,
    display::SharedDisplay,
    error::Error,
    events,
    monitor::Monitor,
    reader::ReaderSettings,
    serial::{
        connection::{ByteSource, Connection, OpenMode, ReadOutcome},
        connector::Connector,
        BaudRate,
    },
};
use tokio::time::{sleep, timeout};

/// One thing a fake device does when read.
#[derive(Debug, Clone)]
pub enum Step {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

/// How the next open of a device goes.
/// Devices without a plan open natively and then stay silent.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub open_error: Option<Error>,
    pub panic_on_open: bool,
    pub fallback: bool,
    pub steps: Vec<Step>,
    pub fail_close: bool,
}

impl Plan {
    pub fn data(bytes: &[u8]) -> Self {
        Self {
            steps: vec![Step::Data(bytes.to_vec())],
            ..Default::default()
        }
    }

    pub fn open_error(e: Error) -> Self {
        Self {
            open_error: Some(e),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    closes: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

#[derive(Debug, Default)]
struct Inner {
    plans: Mutex<HashMap<DevicePath, VecDeque<Plan>>>,
    counters: Arc<Counters>,
}

/// A connector handing out fake devices, counting what happens to them.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector(Arc<Inner>);

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plan for the next open of `device`.
    pub fn script<D: Into<DevicePath>>(&self, device: D, plan: Plan) {
        self.0
            .plans
            .lock()
            .unwrap()
            .entry(device.into())
            .or_default()
            .push_back(plan);
    }

    /// Successful opens so far.
    pub fn opens(&self) -> usize {
        self.0.counters.opens.load(Ordering::SeqCst)
    }

    /// Closes so far, successful or not.
    pub fn closes(&self) -> usize {
        self.0.counters.closes.load(Ordering::SeqCst)
    }

    /// Fake devices currently open.
    pub fn live(&self) -> usize {
        self.0.counters.live.load(Ordering::SeqCst)
    }

    /// The most fake devices ever open at once.
    pub fn max_live(&self) -> usize {
        self.0.counters.max_live.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, device: &DevicePath, baud: BaudRate) -> Result<Connection, Error> {
        let plan = self
            .0
            .plans
            .lock()
            .unwrap()
            .get_mut(device)
            .and_then(|plans| plans.pop_front())
            .unwrap_or_default();

        if let Some(e) = plan.open_error {
            return Err(e);
        }

        if plan.panic_on_open {
            panic!("Scripted panic opening {device}");
        }

        let counters = self.0.counters.clone();
        counters.opens.fetch_add(1, Ordering::SeqCst);
        let live = counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_live.fetch_max(live, Ordering::SeqCst);

        let mode = if plan.fallback {
            OpenMode::Fallback
        } else {
            OpenMode::Native(baud)
        };

        let source = FakeSource {
            steps: plan.steps.into(),
            fail_close: plan.fail_close,
            counters,
        };

        Ok(Connection::new(Box::new(source), mode))
    }
}

struct FakeSource {
    steps: VecDeque<Step>,
    fail_close: bool,
    counters: Arc<Counters>,
}

impl ByteSource for FakeSource {
    fn read(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<ReadOutcome> {
        match self.steps.pop_front() {
            Some(Step::Data(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(ReadOutcome::Data(n))
            }
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            None => {
                std::thread::sleep(wait);
                Ok(ReadOutcome::Idle)
            }
        }
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);

        if self.fail_close {
            Err(io::Error::new(io::ErrorKind::Other, "scripted close failure"))
        } else {
            Ok(())
        }
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Reader settings which make tests quick.
pub fn settings() -> ReaderSettings {
    ReaderSettings {
        read_size: 128,
        poll_interval_ms: 10,
    }
}

/// A monitor whose output lands in the returned display, without delay.
pub fn monitor<C: Connector>(connector: C) -> (Monitor<C>, SharedDisplay) {
    monitor_with_delay(connector, Duration::ZERO)
}

/// Like [`monitor`], holding each event back for `delay`.
pub fn monitor_with_delay<C: Connector>(
    connector: C,
    delay: Duration,
) -> (Monitor<C>, SharedDisplay) {
    let (outbox, inbox) = events::channel(delay);
    let display = SharedDisplay::new();

    tokio::spawn(inbox.run(display.clone()));

    let monitor = Monitor::new(connector, outbox, settings()).expect("Valid settings");

    (monitor, display)
}

/// Wait until `condition` holds, failing after a few seconds.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> Result<()> {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    Ok(())
}

pub fn baud(rate: u32) -> BaudRate {
    BaudRate::try_from(rate).expect("Supported rate")
}
