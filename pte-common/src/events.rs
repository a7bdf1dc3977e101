//! Event types for the scoring pipeline
//!
//! Provides the shared event definitions and the EventBus that decouples
//! attempt ingestion from scoring latency.
//!
//! Delivery is at-most-once: a lagging subscriber drops events and an event
//! emitted with no subscriber is lost. The periodic sweep re-requests any
//! attempt that did not reach `scored`, so nothing here has to be reliable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{ScoreResult, SpeakingSubtype};

/// Minimal payload needed to (re-)score an attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub attempt_id: Uuid,
    pub user_id: String,
    pub subtype: SpeakingSubtype,
    pub audio_reference: String,
    pub transcript: Option<String>,
    pub reference_text: Option<String>,
    pub prompt: Option<String>,
    pub duration_ms: u64,
}

/// Pipeline event types
///
/// Events are broadcast via EventBus and can be serialized for transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PteEvent {
    /// An attempt needs scoring
    ///
    /// Triggers:
    /// - Scoring worker: run the Scoring Engine
    ScoringRequested {
        request: ScoringRequest,
        /// Where the request came from ("ingestion" or "sweep")
        origin: String,
        timestamp: DateTime<Utc>,
    },

    /// Scoring produced a usable result (oracle or heuristic)
    ///
    /// Triggers:
    /// - Persistence step: write scores to the durable attempt
    ScoringCompleted {
        attempt_id: Uuid,
        scores: ScoreResult,
        timestamp: DateTime<Utc>,
    },

    /// Scoring could not run at all (e.g. attempt vanished, storage down)
    ///
    /// Triggers:
    /// - Failure recorder: mark the durable attempt `failed`
    ScoringFailed {
        attempt_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Progress snapshot recomputed after a newly scored attempt
    ProgressSynced {
        user_id: String,
        overall_score: u32,
        study_streak: u32,
        timestamp: DateTime<Utc>,
    },
}

impl PteEvent {
    /// Get event type as string for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            PteEvent::ScoringRequested { .. } => "ScoringRequested",
            PteEvent::ScoringCompleted { .. } => "ScoringCompleted",
            PteEvent::ScoringFailed { .. } => "ScoringFailed",
            PteEvent::ProgressSynced { .. } => "ProgressSynced",
        }
    }

    /// Attempt the event refers to, if any
    pub fn attempt_id(&self) -> Option<Uuid> {
        match self {
            PteEvent::ScoringRequested { request, .. } => Some(request.attempt_id),
            PteEvent::ScoringCompleted { attempt_id, .. } => Some(*attempt_id),
            PteEvent::ScoringFailed { attempt_id, .. } => Some(*attempt_id),
            PteEvent::ProgressSynced { .. } => None,
        }
    }
}

/// Central event distribution bus
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PteEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use pte_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(1000);
    /// assert_eq!(event_bus.capacity(), 1000);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PteEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: PteEvent) -> Result<usize, broadcast::error::SendError<PteEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, logging instead of failing when nobody is listening
    pub fn emit_lossy(&self, event: PteEvent) {
        let event_type = event.event_type();
        let attempt_id = event.attempt_id();
        if self.tx.send(event).is_err() {
            tracing::warn!(
                event_type,
                attempt_id = ?attempt_id,
                "No subscribers for event; dropping (sweep will recover scoring work)"
            );
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
