/// Result alias that carries the custom [`SphereVizError`] type.
pub type Result<T> = std::result::Result<T, SphereVizError>;

/// Common error type for the core crate.
///
/// The event and loading pipeline never surfaces errors to its callers; this
/// type covers the fallible edges around it (configuration files and
/// decoding work done inside load handlers).
#[derive(Debug, thiserror::Error)]
pub enum SphereVizError {
    /// Free-form message for failures without a more specific variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or manifest that is not valid JSON for the expected shape.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("glTF import failed: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
    /// Rejected argument, such as an analyser size that is not a power of two.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl SphereVizError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for SphereVizError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SphereVizError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
