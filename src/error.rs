//! Error taxonomy shared by the lesson, tutor, cache and speech paths.
//!
//! Validation and remote failures on the lesson path propagate to the HTTP/WS layer.
//! Storage and speech failures are handled where they happen and never reach a client.

use thiserror::Error;

/// Bad input from the caller. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("input is empty")]
  Empty,
  #[error("input is too long ({len} chars, max {max})")]
  TooLong { len: usize, max: usize },
}

/// Failure of one content generation attempt. No partial lesson survives any of these.
#[derive(Debug, Error)]
pub enum GenerationError {
  #[error(transparent)]
  Validation(#[from] ValidationError),
  #[error("remote service error: {0}")]
  Remote(String),
  #[error("malformed lesson payload: {0}")]
  Parse(String),
  #[error("generation provider is not configured")]
  Unavailable,
}

/// What `LessonResolver::resolve` reports. Tier misses are not errors.
#[derive(Debug, Error)]
pub enum ResolutionError {
  #[error("invalid topic: {0}")]
  Validation(#[from] ValidationError),
  #[error("failed to generate lesson content: {0}")]
  Generation(GenerationError),
}

impl From<GenerationError> for ResolutionError {
  fn from(e: GenerationError) -> Self {
    match e {
      GenerationError::Validation(v) => ResolutionError::Validation(v),
      other => ResolutionError::Generation(other),
    }
  }
}

impl ResolutionError {
  /// Remote and parse failures can be retried by the user; validation failures cannot.
  pub fn is_retryable(&self) -> bool {
    matches!(self, ResolutionError::Generation(_))
  }
}

#[derive(Debug, Error)]
pub enum TutorError {
  #[error(transparent)]
  Validation(#[from] ValidationError),
  #[error("tutor service error: {0}")]
  Remote(String),
  #[error("tutor provider is not configured")]
  Unavailable,
}

/// Cache write/read failure. Recovered inside `CacheStore`.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("quota exceeded for '{namespace}' ({size} bytes, quota {quota})")]
  QuotaExceeded { namespace: String, size: usize, quota: usize },
  #[error("storage io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("storage serialization error: {0}")]
  Serde(#[from] serde_json::Error),
}

/// Playback failure. Degrades to "no audio produced".
#[derive(Debug, Error)]
pub enum SpeechError {
  #[error("playback was interrupted")]
  Interrupted,
  #[error("audio output failed: {0}")]
  Output(String),
}
