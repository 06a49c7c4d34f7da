//! Event types for the homedeck event system
//!
//! Provides the shared event definitions and the EventBus that fans job
//! lifecycle and log events out to every connected observer.

mod job_types;

pub use job_types::LogStream;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};
use uuid::Uuid;

/// homedeck event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// All events of one job carry the same `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeckEvent {
    /// Acquisition job accepted; always the first event of a job
    JobStarted {
        /// Job identifier
        job_id: Uuid,
        /// Resource locator the job was started for
        target: String,
        /// When the job was accepted
        timestamp: DateTime<Utc>,
    },

    /// One line of output from the acquisition process
    JobLog {
        /// Job identifier
        job_id: Uuid,
        /// Stream the line was read from
        stream: LogStream,
        /// Line text without the trailing newline
        text: String,
        /// When the line was read
        timestamp: DateTime<Utc>,
    },

    /// Acquisition process exited
    ///
    /// `exit_code` is `None` when the process was terminated by a signal
    /// or killed after exceeding the configured timeout.
    JobFinished {
        /// Job identifier
        job_id: Uuid,
        /// Process exit code, if any
        exit_code: Option<i32>,
        /// When the exit was observed
        timestamp: DateTime<Utc>,
    },

    /// Acquisition process could not be launched
    JobSpawnError {
        /// Job identifier
        job_id: Uuid,
        /// Launch failure description
        message: String,
        /// When the failure was observed
        timestamp: DateTime<Utc>,
    },
}

impl DeckEvent {
    /// Push-channel event name
    pub fn event_type(&self) -> &'static str {
        match self {
            DeckEvent::JobStarted { .. } => "job:started",
            DeckEvent::JobLog { .. } => "job:log",
            DeckEvent::JobFinished { .. } => "job:finished",
            DeckEvent::JobSpawnError { .. } => "job:spawn_error",
        }
    }

    /// Job this event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            DeckEvent::JobStarted { job_id, .. }
            | DeckEvent::JobLog { job_id, .. }
            | DeckEvent::JobFinished { job_id, .. }
            | DeckEvent::JobSpawnError { job_id, .. } => *job_id,
        }
    }

    /// True for the last event a job ever produces
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeckEvent::JobFinished { .. } | DeckEvent::JobSpawnError { .. }
        )
    }

    /// Plain-text payload delivered with the push-channel event
    pub fn payload(&self) -> String {
        match self {
            DeckEvent::JobStarted { target, .. } => target.clone(),
            DeckEvent::JobLog { stream, text, .. } => {
                format!("{}{}", stream.transport_prefix(), text)
            }
            DeckEvent::JobFinished {
                exit_code: Some(code),
                ..
            } => format!("Acquisition process finished with code {}.", code),
            DeckEvent::JobFinished {
                exit_code: None, ..
            } => "Acquisition process finished without an exit code.".to_string(),
            DeckEvent::JobSpawnError { message, .. } => {
                format!("Failed to start acquisition process: {}", message)
            }
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers never block the publisher)
/// - Multiple concurrent subscribers, each with its own read cursor
/// - Automatic cleanup when a subscription is dropped
/// - Lag detection for subscribers that fall more than `capacity` behind
///
/// # Examples
///
/// ```
/// use homedeck_common::events::{DeckEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut subscription = event_bus.subscribe();
///
/// event_bus.publish(DeckEvent::JobStarted {
///     job_id: uuid::Uuid::new_v4(),
///     target: "https://open.spotify.com/track/abc".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// let event = subscription.try_recv().expect("event delivered");
/// assert_eq!(event.event_type(), "job:started");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DeckEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus
    ///
    /// `capacity` is the number of events a single subscriber may fall
    /// behind before it starts skipping the oldest ones.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events published before this call are never delivered.
    pub fn subscribe(&self) -> Subscription {
        let subscription = Subscription {
            rx: self.tx.subscribe(),
            skipped: 0,
        };
        debug!(subscribers = self.subscriber_count(), "EventBus: subscriber added");
        subscription
    }

    /// Publish an event to all current subscribers
    ///
    /// Returns the number of subscribers the event was queued for. Having no
    /// subscribers is not an error: nobody is watching, the event is dropped.
    pub fn publish(&self, event: DeckEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => 0,
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Handle for one EventBus observer
///
/// Dropping the handle unsubscribes it.
pub struct Subscription {
    rx: broadcast::Receiver<DeckEvent>,
    skipped: u64,
}

impl Subscription {
    /// Wait for the next event
    ///
    /// Returns `None` once the bus has been dropped. If this subscriber fell
    /// behind and events were overwritten, the loss is logged and delivery
    /// resumes with the oldest retained event.
    pub async fn recv(&mut self) -> Option<DeckEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(count)) => self.record_lag(count),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<DeckEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(count)) => self.record_lag(count),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Number of events this subscriber missed because it fell behind
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Stop receiving events
    pub fn unsubscribe(self) {
        drop(self);
    }

    fn record_lag(&mut self, count: u64) {
        self.skipped += count;
        warn!(skipped = count, "EventBus: slow subscriber skipped events");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!("EventBus: subscriber removed");
    }
}
