use thiserror::Error;

/// Structured library errors.
///
/// Matching outcomes (not found, missed, invalid, duplicate) are not errors and
/// live in `matching::MatchResult`. These enums cover the failures that come
/// from collaborators: screens, template files and configuration.

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to initialize screen capturer")]
    InitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to capture screen")]
    CaptureFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("No displays found")]
    NoDisplays,

    #[error("Invalid display index: {0}")]
    InvalidDisplayIndex(usize),

    #[error("Capture region {region:?} lies outside the {width}x{height} frame")]
    OutOfBounds {
        region: [u32; 4],
        width: u32,
        height: u32,
    },
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template directory not found: {0}")]
    MissingDirectory(String),

    #[error("Failed to decode template image {path}")]
    DecodeFailed {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Template {name} has a mask of {mask_w}x{mask_h}, expected {width}x{height}")]
    MaskMismatch {
        name: String,
        width: u32,
        height: u32,
        mask_w: u32,
        mask_h: u32,
    },

    #[error("Invalid template name pattern")]
    Pattern(#[from] regex::Error),

    #[error("Failed to read template directory {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Failed to start detection thread")]
    ThreadSpawnFailed(#[source] std::io::Error),

    #[error(transparent)]
    Transition(#[from] crate::state::TransitionError),
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = TemplateError::MissingDirectory("templates".to_string());
        assert_eq!(err.to_string(), "Template directory not found: templates");

        let err = DetectionError::from(crate::state::TransitionError::NotRunning);
        assert_eq!(err.to_string(), crate::state::TransitionError::NotRunning.to_string());

        let err = CaptureError::OutOfBounds {
            region: [10, 10, 50, 50],
            width: 20,
            height: 20,
        };
        assert!(err.to_string().contains("20x20"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let config_err = ConfigError::LoadFailed {
            path: "/test/config.json".to_string(),
            source: Box::new(io_err),
        };

        assert!(config_err.source().is_some());
        assert_eq!(
            config_err.to_string(),
            "Failed to load configuration from /test/config.json"
        );
    }
}
