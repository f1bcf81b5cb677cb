//! Error types for the generation pipeline

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerateError>;

/// Everything that can go wrong between pressing Generate and seeing an image.
///
/// The `Display` text is shown verbatim in the UI error banner, so variants
/// carry formatted cause chains rather than raw source errors from the
/// model backend.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Model client construction failed: bad credentials, unreachable or
    /// unauthorized weights, no usable accelerator device.
    #[error("failed to load model '{model_id}': {reason}")]
    ModelLoad { model_id: String, reason: String },

    /// The loaded model failed during synthesis, typically device
    /// out-of-memory.
    #[error("image synthesis failed: {reason}")]
    Synthesis { reason: String },

    /// The backend returned an empty result set for the request.
    #[error("the model returned no images")]
    EmptyResult,

    #[error("failed to save image to {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("output directory error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_text_is_user_presentable() {
        let err = GenerateError::ModelLoad {
            model_id: "CompVis/stable-diffusion-v1-4".to_string(),
            reason: "401 Unauthorized".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to load model 'CompVis/stable-diffusion-v1-4': 401 Unauthorized"
        );

        let err = GenerateError::Synthesis {
            reason: "out of device memory".to_string(),
        };
        assert!(err.to_string().contains("out of device memory"));
    }

    #[test]
    fn save_error_includes_path() {
        let err = GenerateError::Save {
            path: PathBuf::from("/tmp/out/generatedimage.png"),
            source: image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )),
        };
        let text = err.to_string();
        assert!(text.contains("generatedimage.png"));
        assert!(text.contains("permission denied"));
    }
}
