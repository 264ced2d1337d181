use crate::error::EventBusError;
use crate::gate::FaceGateState;
use crate::model::EmotionLabel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Notifications emitted by the detection core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MoodEvent {
    /// The frame gate changed its face framing verdict
    FaceGateChanged {
        state: FaceGateState,
        timestamp: SystemTime,
    },
    /// A classification request was handed to the classifier
    ClassificationStarted { generation: u64 },
    /// The classifier returned scores for the current request
    ClassificationCompleted {
        generation: u64,
        dominant_emotion: EmotionLabel,
    },
    /// The current request failed or timed out
    ClassificationFailed { generation: u64, message: String },
    /// A result arrived for a request nobody is waiting on anymore
    StaleResultDiscarded { generation: u64 },
    /// An entry was accepted into the journal
    EntrySaved {
        entry_id: String,
        date: NaiveDate,
        dominant_emotion: EmotionLabel,
    },
    /// The summary for a date was recomputed
    SummaryUpdated { date: NaiveDate, entry_count: usize },
    /// Classifier and face presence resources were closed
    ResourcesReleased { timestamp: SystemTime },
}

impl MoodEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            MoodEvent::FaceGateChanged { state, .. } => format!("Face gate now {:?}", state),
            MoodEvent::ClassificationStarted { generation } => {
                format!("Classification {} started", generation)
            }
            MoodEvent::ClassificationCompleted {
                generation,
                dominant_emotion,
            } => format!(
                "Classification {} completed: {}",
                generation, dominant_emotion
            ),
            MoodEvent::ClassificationFailed {
                generation,
                message,
            } => format!("Classification {} failed: {}", generation, message),
            MoodEvent::StaleResultDiscarded { generation } => {
                format!("Discarded stale result of classification {}", generation)
            }
            MoodEvent::EntrySaved {
                entry_id,
                date,
                dominant_emotion,
            } => format!("Entry {} saved for {} ({})", entry_id, date, dominant_emotion),
            MoodEvent::SummaryUpdated { date, entry_count } => {
                format!("Summary for {} updated ({} entries)", date, entry_count)
            }
            MoodEvent::ResourcesReleased { .. } => "Model resources released".to_string(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            MoodEvent::FaceGateChanged { .. } => "face_gate_changed",
            MoodEvent::ClassificationStarted { .. } => "classification_started",
            MoodEvent::ClassificationCompleted { .. } => "classification_completed",
            MoodEvent::ClassificationFailed { .. } => "classification_failed",
            MoodEvent::StaleResultDiscarded { .. } => "stale_result_discarded",
            MoodEvent::EntrySaved { .. } => "entry_saved",
            MoodEvent::SummaryUpdated { .. } => "summary_updated",
            MoodEvent::ResourcesReleased { .. } => "resources_released",
        }
    }
}

/// Broadcast bus for core notifications
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MoodEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MoodEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered(&self, filter: EventFilter, name: impl Into<String>) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.into())
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: MoodEvent) -> Result<usize, EventBusError> {
        match &event {
            MoodEvent::ClassificationFailed { message, .. } => {
                warn!("Classification failed: {}", message);
            }
            MoodEvent::EntrySaved { .. } | MoodEvent::ResourcesReleased { .. } => {
                info!("{}", event.description());
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish, treating "nobody is listening" as a non-event
    pub fn notify(&self, event: MoodEvent) {
        if let Err(e) = self.publish(event) {
            debug!("Event dropped: {}", e);
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    Custom(fn(&MoodEvent) -> bool),
}

impl EventFilter {
    pub fn matches(&self, event: &MoodEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<MoodEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<MoodEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<MoodEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

/// Component that reacts to bus events
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&mut self, event: MoodEvent) -> Result<(), EventBusError>;

    fn handler_name(&self) -> &str;

    fn event_filter(&self) -> EventFilter {
        EventFilter::All
    }
}

/// Drive a handler until every bus sender is gone. Lag is logged and skipped.
pub fn spawn_handler<H: EventHandler>(bus: &EventBus, handler: H) -> tokio::task::JoinHandle<H>
where
    H: 'static,
{
    let receiver = bus.subscribe_filtered(handler.event_filter(), handler.handler_name());
    tokio::spawn(drive_handler(receiver, handler))
}

async fn drive_handler<H: EventHandler>(mut receiver: EventReceiver, mut handler: H) -> H {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if let Err(e) = handler.handle_event(event).await {
                    warn!("Handler '{}' failed: {}", handler.handler_name(), e);
                }
            }
            Err(EventBusError::Lagged { .. }) => continue,
            Err(_) => break,
        }
    }
    handler
}
