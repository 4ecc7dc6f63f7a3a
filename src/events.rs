//! Prediction lifecycle events.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PredictionKind {
    LearningStyle,
    Engagement,
    AcademicRisk,
}

impl PredictionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionKind::LearningStyle => "learning-style",
            PredictionKind::Engagement => "engagement",
            PredictionKind::AcademicRisk => "academic-risk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PredictionEvent {
    Started {
        kind: PredictionKind,
        student_id: String,
    },
    Succeeded {
        kind: PredictionKind,
        student_id: String,
        duration_ms: u64,
        result_id: String,
    },
    Failed {
        kind: PredictionKind,
        student_id: String,
        error: String,
    },
}

impl PredictionEvent {
    pub fn kind(&self) -> PredictionKind {
        match self {
            PredictionEvent::Started { kind, .. }
            | PredictionEvent::Succeeded { kind, .. }
            | PredictionEvent::Failed { kind, .. } => *kind,
        }
    }

    pub fn student_id(&self) -> &str {
        match self {
            PredictionEvent::Started { student_id, .. }
            | PredictionEvent::Succeeded { student_id, .. }
            | PredictionEvent::Failed { student_id, .. } => student_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounters {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total_duration_ms: u64,
}

impl KindCounters {
    pub fn average_duration_ms(&self) -> Option<u64> {
        (self.succeeded > 0).then(|| self.total_duration_ms / self.succeeded)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityStats {
    pub learning_style: KindCounters,
    pub engagement: KindCounters,
    pub academic_risk: KindCounters,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ActivityStats {
    pub fn counters(&self, kind: PredictionKind) -> &KindCounters {
        match kind {
            PredictionKind::LearningStyle => &self.learning_style,
            PredictionKind::Engagement => &self.engagement,
            PredictionKind::AcademicRisk => &self.academic_risk,
        }
    }

    fn counters_mut(&mut self, kind: PredictionKind) -> &mut KindCounters {
        match kind {
            PredictionKind::LearningStyle => &mut self.learning_style,
            PredictionKind::Engagement => &mut self.engagement,
            PredictionKind::AcademicRisk => &mut self.academic_risk,
        }
    }

    pub fn record(&mut self, event: &PredictionEvent) {
        let counters = self.counters_mut(event.kind());
        match event {
            PredictionEvent::Started { .. } => counters.started += 1,
            PredictionEvent::Succeeded { duration_ms, .. } => {
                counters.succeeded += 1;
                counters.total_duration_ms += duration_ms;
            }
            PredictionEvent::Failed { .. } => counters.failed += 1,
        }
        self.last_event_at = Some(Utc::now());
    }
}

/// Fan-out of prediction events. Counters are kept on publish; subscribers
/// only observe.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PredictionEvent>,
    stats: Arc<Mutex<ActivityStats>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, stats: Arc::new(Mutex::new(ActivityStats::default())) }
    }

    pub fn publish(&self, event: PredictionEvent) {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).record(&event);
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PredictionEvent> {
        self.sender.subscribe()
    }

    pub fn stats(&self) -> ActivityStats {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Log every event until the bus is dropped.
    pub fn spawn_logger(&self) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => log_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event logger lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

fn log_event(event: &PredictionEvent) {
    let kind = event.kind().as_str();
    let student_id = event.student_id();
    match event {
        PredictionEvent::Started { .. } => tracing::debug!(kind, student_id, "prediction started"),
        PredictionEvent::Succeeded { duration_ms, result_id, .. } => {
            tracing::info!(kind, student_id, duration_ms, result_id = %result_id, "prediction stored")
        }
        PredictionEvent::Failed { error, .. } => tracing::warn!(kind, student_id, error = %error, "prediction failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(kind: PredictionKind) -> PredictionEvent {
        PredictionEvent::Started { kind, student_id: "STU1".into() }
    }

    #[test]
    fn test_stats_count_by_kind() {
        let bus = EventBus::default();
        bus.publish(started(PredictionKind::AcademicRisk));
        bus.publish(PredictionEvent::Succeeded {
            kind: PredictionKind::AcademicRisk,
            student_id: "STU1".into(),
            duration_ms: 40,
            result_id: "r1".into(),
        });
        bus.publish(started(PredictionKind::Engagement));
        bus.publish(PredictionEvent::Failed {
            kind: PredictionKind::Engagement,
            student_id: "STU1".into(),
            error: "bad form".into(),
        });

        let stats = bus.stats();
        assert_eq!(stats.academic_risk, KindCounters { started: 1, succeeded: 1, failed: 0, total_duration_ms: 40 });
        assert_eq!(stats.engagement.failed, 1);
        assert_eq!(stats.learning_style, KindCounters::default());
        assert_eq!(stats.academic_risk.average_duration_ms(), Some(40));
        assert!(stats.last_event_at.is_some());
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(started(PredictionKind::LearningStyle));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), PredictionKind::LearningStyle);
        assert_eq!(event.student_id(), "STU1");
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(started(PredictionKind::AcademicRisk)).unwrap();
        assert_eq!(json["stage"], "started");
        assert_eq!(json["kind"], "academic-risk");
    }
}
