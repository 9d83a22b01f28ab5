//! # Swarm Events
//!
//! Progress events emitted while a run executes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of swarm event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwarmEventKind {
    /// Pipeline started
    PipelineStarted,
    /// Agent started working
    AgentStarted,
    /// Agent completed successfully
    AgentCompleted,
    /// Agent failed
    AgentFailed,
    /// Architect output accepted for fan-out
    DirectionsProposed,
    /// Engineers dispatched
    FanOutStarted,
    /// Pipeline completed
    PipelineCompleted,
    /// Pipeline failed
    PipelineFailed,
    /// Caller cancelled the run or one engineer
    RunCancelled,
}

/// An event in the swarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmEvent {
    /// Unique event ID
    pub id: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Kind of event
    pub kind: SwarmEventKind,
    /// Agent that produced this event
    pub agent: String,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Engineer slot (1-based) if applicable
    #[serde(default)]
    pub slot: Option<usize>,
}

impl SwarmEvent {
    /// Create a new event
    pub fn new(kind: SwarmEventKind, agent: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            agent: agent.to_string(),
            data: None,
            slot: None,
        }
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach the engineer slot
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = SwarmEvent::new(SwarmEventKind::AgentStarted, "engineer_2").with_slot(2);

        assert_eq!(event.agent, "engineer_2");
        assert_eq!(event.slot, Some(2));
        assert!(uuid::Uuid::parse_str(&event.id).is_ok());
    }

    #[test]
    fn test_event_serializes_snake_case_kind() {
        let event = SwarmEvent::new(SwarmEventKind::FanOutStarted, "coordinator")
            .with_data(serde_json::json!({"engineers": 3}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "fan_out_started");
        assert_eq!(json["data"]["engineers"], 3);
    }
}
