use std::path::PathBuf;

/// Result alias that carries the custom [`StoryMixError`] type.
pub type Result<T> = std::result::Result<T, StoryMixError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum StoryMixError {
    /// The persisted timeline could not be decoded into a descriptor. Raised
    /// before any audio is touched.
    #[error("malformed timeline `{}`: {}", .path.display(), .reason)]
    MalformedTimeline { path: PathBuf, reason: String },
    #[error("timeline file not found: {}", .0.display())]
    TimelineNotFound(PathBuf),
    /// The base narration track is missing or cannot be decoded. Fatal for
    /// the whole mix.
    #[error("narration `{}` is unreadable: {}", .path.display(), .reason)]
    NarrationUnreadable { path: PathBuf, reason: String },
    /// A single cue clip is missing or cannot be decoded. The mixer records
    /// this as a warning and carries on with the remaining cues.
    #[error("cue resource `{}` is missing: {}", .path.display(), .reason)]
    CueResourceMissing { path: PathBuf, reason: String },
    /// A cue offset does not fit in the track's addressable length.
    #[error("offset {0}s is out of range")]
    OffsetOutOfRange(f64),
    #[error("audio track cannot grow to the requested length")]
    TrackTooLong,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A generation service refused or failed a request.
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Wav(#[from] hound::Error),
    #[error("{0}")]
    Regex(#[from] regex::Error),
    #[error("{0}")]
    Resample(#[from] rubato::ResampleError),
    #[error("{0}")]
    ResamplerSetup(#[from] rubato::ResamplerConstructionError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl StoryMixError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for StoryMixError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for StoryMixError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
