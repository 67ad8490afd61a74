//! Delivery of readers' output to whatever presents it.
//!
//! Producers push into an unbounded channel and never wait for the consumer.
//! A single pump ([`Inbox::run`]) hands events to a [`PresentationSink`] in the order they were produced.
//!
//! Every reader generation gets its own [`EventSender`].
//! Once a newer generation has been started, display events still queued from older ones are dropped
//! instead of delivered.
//!
//! Only display events are held back by the delivery delay.
//! Clears and notifications go out as soon as they reach the front of the queue.

use std::{fmt::Display, time::Duration};

use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};
use tracing::{debug, trace};

use crate::error::Error;

/// Something to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// Bytes read from the device, as hex octets. May be empty.
    DataChunk(String),

    /// The baud rate can be applied, so selecting one makes sense.
    ShowBaudControl,

    /// The baud rate can not be applied.
    HideBaudControl,
}

impl Display for DisplayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayEvent::DataChunk(hex) => write!(f, "data: {hex}"),
            DisplayEvent::ShowBaudControl => write!(f, "show baud control"),
            DisplayEvent::HideBaudControl => write!(f, "hide baud control"),
        }
    }
}

/// The presentation layer.
pub trait PresentationSink: Send + 'static {
    /// Present an event.
    /// Show/hide events should be treated as idempotent toggles.
    fn show(&mut self, event: DisplayEvent);

    /// Forget anything shown so far.
    fn clear(&mut self);

    /// Let the operator know something went wrong.
    fn notify(&mut self, error: &Error);
}

#[derive(Debug)]
enum Delivery {
    Show(DisplayEvent),
    Clear,
    Notify(Error),
}

#[derive(Debug)]
struct Envelope {
    generation: u64,
    produced_at: Instant,
    delivery: Delivery,
}

/// Create the channel between producers and the presentation sink.
///
/// Each display event is held back until `delay` has passed since it was produced.
pub fn channel(delay: Duration) -> (Outbox, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (generation_tx, generation_rx) = watch::channel(0);

    (
        Outbox {
            tx,
            generation: generation_tx,
        },
        Inbox {
            rx,
            generation: generation_rx,
            delay,
        },
    )
}

/// The producing side of the channel, owned by whoever starts readers.
#[derive(Debug)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Envelope>,
    generation: watch::Sender<u64>,
}

impl Outbox {
    /// Start a new generation.
    /// Display events from all earlier generations become stale.
    pub fn next_generation(&self) -> EventSender {
        let generation = *self.generation.borrow() + 1;
        self.generation.send_replace(generation);
        debug!(generation, "New generation");

        self.sender(generation)
    }

    /// A sender for the newest generation.
    pub fn current(&self) -> EventSender {
        self.sender(*self.generation.borrow())
    }

    fn sender(&self, generation: u64) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
            generation,
        }
    }
}

/// Sends events tagged with one generation.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Envelope>,
    generation: u64,
}

impl EventSender {
    /// The generation events from this sender belong to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a display event.
    pub fn show(&self, event: DisplayEvent) {
        self.send(Delivery::Show(event))
    }

    /// Queue clearing the display.
    /// Not held back by the delivery delay.
    pub fn clear(&self) {
        self.send(Delivery::Clear)
    }

    /// Queue an error notification.
    /// These are not held back, and are delivered even if the generation is stale.
    pub fn notify(&self, error: Error) {
        self.send(Delivery::Notify(error))
    }

    fn send(&self, delivery: Delivery) {
        let envelope = Envelope {
            generation: self.generation,
            produced_at: Instant::now(),
            delivery,
        };

        if let Err(e) = self.tx.send(envelope) {
            trace!(delivery = ?e.0.delivery, "No presentation sink, dropping");
        }
    }
}

/// The consuming side of the channel.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
    generation: watch::Receiver<u64>,
    delay: Duration,
}

impl Inbox {
    /// Deliver events to the sink until every producer is gone.
    /// Returns the sink.
    pub async fn run<S: PresentationSink>(mut self, mut sink: S) -> S {
        while let Some(Envelope {
            generation,
            produced_at,
            delivery,
        }) = self.rx.recv().await
        {
            if matches!(delivery, Delivery::Show(_)) && !self.delay.is_zero() {
                self.hold(generation, produced_at + self.delay).await;
            }

            let current = *self.generation.borrow();

            match delivery {
                Delivery::Notify(error) => sink.notify(&error),
                Delivery::Show(_) | Delivery::Clear if generation < current => {
                    trace!(generation, current, "Dropping stale event");
                }
                Delivery::Show(event) => sink.show(event),
                Delivery::Clear => sink.clear(),
            }
        }

        debug!("All producers gone, delivery done");

        sink
    }

    /// Wait until `deadline`, or until `generation` is no longer the newest.
    async fn hold(&mut self, generation: u64, deadline: Instant) {
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        loop {
            if generation < *self.generation.borrow_and_update() {
                return;
            }

            tokio::select! {
                _ = &mut sleep => return,
                changed = self.generation.changed() => {
                    if changed.is_err() {
                        // No more generations can start.
                        sleep.await;
                        return;
                    }
                }
            }
        }
    }
}
