//! Conversational state for follow-up resolution.

use analysis_core::{ObservationResult, ObservationStatus};
use serde::{Deserialize, Serialize};

/// Single source of conversational truth: the most recent observation,
/// intent, and response, plus the running transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogueState {
    pub last_observation: Option<ObservationResult>,
    pub last_user_intent: Option<String>,
    pub last_canonical_intent: Option<String>,
    pub last_agent_response: Option<String>,
    pub history: Vec<(String, String)>,
}

impl DialogueState {
    pub fn new() -> DialogueState {
        DialogueState::default()
    }

    /// Only successful observations become follow-up context
    pub fn update_observation(&mut self, result: ObservationResult) {
        if result.status == ObservationStatus::Success {
            self.last_observation = Some(result);
        }
    }

    pub fn update_interaction(
        &mut self,
        user_input: &str,
        canonical_intent: &str,
        agent_response: &str,
    ) {
        self.last_user_intent = Some(user_input.to_string());
        self.last_canonical_intent = Some(canonical_intent.to_string());
        self.last_agent_response = Some(agent_response.to_string());
        self.history.push(("user".to_string(), user_input.to_string()));
        self.history.push(("agent".to_string(), agent_response.to_string()));
    }
}
