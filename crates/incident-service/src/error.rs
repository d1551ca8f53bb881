use thiserror::Error;

#[derive(Debug, Error)]
pub enum IncidentError {
    /// Missing or oversized form field; nothing was stored
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("a submission is already in flight")]
    SubmissionInFlight,
}

impl IncidentError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
