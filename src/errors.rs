//! Generation errors and their boundary status codes

use crate::pipeline::Stage;

/// Status reported to a host caller when an operation succeeds.
pub const STATUS_OK: i32 = 0;
/// Status reported to a host caller when an operation fails.
pub const STATUS_FAILURE: i32 = 1;

/// All the ways a generation request can fail
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    /// (InvalidInput) A volume argument is absent or malformed
    #[error("(InvalidInput) {0}")]
    InvalidInput(String),
    /// (NoVolume) Generation was requested before any volume was set
    #[error("(NoVolume) no volume has been set")]
    NoVolume,
    /// (NoMesh) The mesh was queried before a generation succeeded
    #[error("(NoMesh) no mesh has been generated")]
    NoMesh,
    /// (MeshProcessing) A pipeline stage could not produce a usable mesh
    #[error("(MeshProcessing) stage `{stage}` failed: {reason}")]
    MeshProcessing { stage: Stage, reason: String },
    /// (InvalidConfig) Generation parameters could not be decoded
    #[error("(InvalidConfig) {0}")]
    InvalidConfig(String),
}

impl GenerationError {
    pub(crate) fn processing(stage: Stage, reason: impl Into<String>) -> Self {
        GenerationError::MeshProcessing {
            stage,
            reason: reason.into(),
        }
    }

    /// Integer status of this error at the host boundary.
    pub const fn status(&self) -> i32 {
        STATUS_FAILURE
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Collapse a result into the `0 = success, 1 = failure` convention.
pub fn status_of<T>(result: &GenerationResult<T>) -> i32 {
    match result {
        Ok(_) => STATUS_OK,
        Err(err) => err.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_kind() {
        let err = GenerationError::InvalidInput("missing samples".into());
        assert_eq!(err.to_string(), "(InvalidInput) missing samples");

        let err = GenerationError::processing(Stage::Decimate, "index 9 out of range");
        assert_eq!(
            err.to_string(),
            "(MeshProcessing) stage `decimate` failed: index 9 out of range"
        );
    }

    #[test]
    fn status_codes() {
        let ok: GenerationResult<()> = Ok(());
        let failed: GenerationResult<()> = Err(GenerationError::NoVolume);
        assert_eq!(status_of(&ok), STATUS_OK);
        assert_eq!(status_of(&failed), STATUS_FAILURE);
    }
}
