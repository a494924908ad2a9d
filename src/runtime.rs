use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::submission::SubmissionUpdate;

/// Interval of the single scheduler tick. The same tick feeds the history
/// sampler and checks the duration cutoff, so there is only one timer to
/// cancel and nothing to drift apart.
pub const TICK_RATE_MS: u64 = 50;

/// Unified event type consumed by the app loop.
#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Resize,
    FocusGained,
    FocusLost,
    Tick,
    /// A score-submission worker finished; carries the session epoch.
    Submission(SubmissionUpdate),
}

/// Source of app events (keyboard, resize, focus, posted updates).
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<Event, RecvTimeoutError>;
}

/// Production event source: a reader thread forwards crossterm events, and
/// the cloneable sender lets workers post their results into the same queue.
pub struct CrosstermEventSource {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        let reader_tx = tx.clone();
        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => reader_tx.send(Event::Key(key)),
                Ok(CtEvent::Resize(_, _)) => reader_tx.send(Event::Resize),
                Ok(CtEvent::FocusGained) => reader_tx.send(Event::FocusGained),
                Ok(CtEvent::FocusLost) => reader_tx.send(Event::FocusLost),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { tx, rx }
    }

    /// Handle for posting events from outside the reader thread.
    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<Event, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface.
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker.
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(Duration::from_millis(TICK_RATE_MS))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed event source for headless runs and tests.
pub struct ChannelEventSource {
    rx: Receiver<Event>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<Event>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<Event, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the application one event at a time, substituting a `Tick`
/// whenever the tick interval passes without input.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn step(&self) -> Event {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Event::Tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn step_substitutes_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        assert_matches!(runner.step(), Event::Tick);
    }

    #[test]
    fn step_passes_events_through_in_order() {
        let (tx, rx) = mpsc::channel();
        tx.send(Event::Resize).unwrap();
        tx.send(Event::FocusLost).unwrap();

        let runner = Runner::new(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );
        assert_matches!(runner.step(), Event::Resize);
        assert_matches!(runner.step(), Event::FocusLost);
    }

    #[test]
    fn posted_submission_updates_arrive_as_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(Event::Submission(SubmissionUpdate {
            epoch: 3,
            result: Err(crate::submission::SubmitError::AuthRequired),
        }))
        .unwrap();

        let runner = Runner::new(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );
        assert_matches!(runner.step(), Event::Submission(update) if update.epoch == 3);
    }
}
