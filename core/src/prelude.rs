use crate::volume::AcousticVolume;

/// Common error type for every pipeline operation.
#[derive(thiserror::Error, Debug)]
pub enum ProcessingError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("data integrity error: {0}")]
    DataIntegrity(String),
    #[error("coordinate mismatch: {0}")]
    CoordinateMismatch(String),
    #[error("missing variable: {0}")]
    MissingVariable(String),
    #[error("kernel failure: {0}")]
    Kernel(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

impl ProcessingError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity(message.into())
    }
}

/// A pipeline stage: receives one volume and returns a new one.
///
/// Stages never mutate their input, so the caller may keep the original
/// around.
pub trait ProcessingStage {
    fn name(&self) -> &'static str;
    fn execute(&self, input: &AcousticVolume) -> ProcessingResult<AcousticVolume>;
}
