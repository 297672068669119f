use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShorewatchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Alert targeting unavailable: {0}")]
    TargetingUnavailable(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    #[error("Verification oracle timed out after {0}s")]
    OracleTimeout(u64),

    #[error("Verification oracle error: {0}")]
    OracleError(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl ShorewatchError {
    /// Collapse a collaborator failure into the infrastructure bucket,
    /// keeping the cause chain in the message.
    pub fn infrastructure(error: anyhow::Error) -> Self {
        ShorewatchError::Infrastructure(format!("{error:#}"))
    }

    /// Whether the error is safe to surface to the caller as their fault
    /// (bad input or a missing entity) rather than ours.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            ShorewatchError::Validation(_)
                | ShorewatchError::InvalidGeometry(_)
                | ShorewatchError::NotFound(_)
        )
    }
}
