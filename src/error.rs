//! Error types for the face swap library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An image could not be read or decoded
    #[error("Could not decode image: {0}")]
    ImageDecode(String),

    /// No face was detected where one was required
    #[error("No face detected in {0}")]
    NoFaceFound(String),

    /// Identity index does not refer to a registered identity
    #[error("Identity index {index} out of range (registered: {len})")]
    IdentityOutOfRange {
        /// Requested index
        index: usize,
        /// Number of registered identities
        len: usize,
    },

    /// Video input could not be opened or read
    #[error("Could not open video: {0}")]
    VideoOpen(String),

    /// Detection, landmark or encoding collaborator failed
    #[error("Detection error: {0}")]
    Detection(String),

    /// Filter initialization or processing error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Geometric warp failed
    #[error("Warp error: {0}")]
    WarpError(String),

    /// Mask construction or compositing failed
    #[error("Blend error: {0}")]
    BlendError(String),

    /// An optional capability was requested but is not available in this build
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
