//! Process-wide log broadcaster
//!
//! Fans structured log events out to every connected observer and keeps a
//! bounded history so late joiners can catch up. Built on tokio's broadcast
//! channel: publishing never blocks on slow or absent subscribers.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::types::{LogEvent, LogLevel};

/// How many recent events are replayed to a newly-connected observer.
pub const HISTORY_CAPACITY: usize = 50;

/// Broadcast channel depth before the slowest subscriber starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Publish/subscribe hub for pipeline log events.
pub struct LogBroadcaster {
    tx: broadcast::Sender<LogEvent>,
    history: Mutex<VecDeque<LogEvent>>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    /// Deliver an event to all current subscribers and record it in the
    /// rolling history. A send error only means nobody is listening.
    pub fn publish(&self, event: LogEvent) {
        {
            let mut history = self.history.lock().expect("log history lock poisoned");
            if history.len() == HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        let _ = self.tx.send(event);
    }

    /// Emit an event and mirror it onto the process tracing output.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Warning => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
        self.publish(LogEvent::new(level, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Register a new observer. Returns the history snapshot for catch-up and
    /// a receiver for everything published from this moment forward. Dropping
    /// the receiver unsubscribes; nothing else is affected.
    pub fn subscribe(&self) -> (Vec<LogEvent>, broadcast::Receiver<LogEvent>) {
        let rx = self.tx.subscribe();
        let history = self
            .history
            .lock()
            .expect("log history lock poisoned")
            .iter()
            .cloned()
            .collect();
        (history, rx)
    }

    /// Current history snapshot without registering an observer.
    pub fn history(&self) -> Vec<LogEvent> {
        self.history
            .lock()
            .expect("log history lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Number of currently-connected observers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
