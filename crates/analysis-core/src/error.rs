use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Safety rejection: {0}")]
    SafetyRejection(String),
}
