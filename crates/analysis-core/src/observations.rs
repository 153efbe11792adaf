use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

/// Kind of read-only observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    /// Whole-screen VLM description
    ScreenDescription,
    /// Check element existence/attributes
    ElementQuery,
    /// Locate an element visually
    ElementFind,
    /// Check whether an app/window is present
    StateCheck,
    /// General vision query against a target prompt
    Vision,
    /// Re-read the most recent vision result without a new screenshot
    VisionBufferRead,
}

impl ObservationType {
    /// Whole-screen observations need no target
    fn requires_target(&self) -> bool {
        !matches!(self, ObservationType::ScreenDescription)
    }
}

/// Observation context (authority routing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationContext {
    Desktop,
    Web,
    File,
    Vision,
    VisionBuffer,
}

/// Immutable, side-effect-free observation request.
///
/// Observations read state; they never trigger actions or retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub observation_type: ObservationType,
    pub context: ObservationContext,
    pub target: Option<String>,
}

impl Observation {
    /// Build an observation, enforcing the target requirement at
    /// construction time.
    pub fn new(
        observation_type: ObservationType,
        context: ObservationContext,
        target: Option<String>,
    ) -> Result<Observation, AgentError> {
        if observation_type.requires_target() && target.as_deref().map_or(true, str::is_empty) {
            return Err(AgentError::Perception(format!(
                "observation type {observation_type:?} requires a target"
            )));
        }
        Ok(Observation {
            observation_type,
            context,
            target,
        })
    }

    /// Vision query against a free-text prompt target
    pub fn vision(target: impl Into<String>) -> Observation {
        Observation {
            observation_type: ObservationType::Vision,
            context: ObservationContext::Vision,
            target: Some(target.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationStatus {
    Success,
    NotFound,
    Error,
}

/// Extra result context: source tag, confidence, raw dump, structured read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationMetadata {
    pub source: Option<String>,
    pub confidence: Option<f64>,
    pub raw_text: Option<String>,
    pub interpretation: Option<Value>,
}

/// Result of an observation query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationResult {
    pub observation: Observation,
    pub status: ObservationStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<ObservationMetadata>,
}

impl ObservationResult {
    pub fn is_success(&self) -> bool {
        self.status == ObservationStatus::Success
    }
}
