pub type StudioResult<T> = Result<T, StudioError>;

#[derive(thiserror::Error, Debug)]
pub enum StudioError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("analysis error: {0}")]
    Analysis(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StudioError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }
}
