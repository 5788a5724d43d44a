//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - lesson resolution and chapter listing
//!   - tutor replies (apology on failure, Markdown emphasis stripped)
//!   - sentence explanation (apology when the model gives nothing back)
//!   - remote speech for the HTTP surface

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::{Chapter, ChatRole, ChatTurn, LessonContent, Locale};
use crate::error::{ResolutionError, TutorError, ValidationError};
use crate::seeds;
use crate::speech::{REMOTE_CHANNELS, REMOTE_SAMPLE_RATE};
use crate::state::AppState;
use crate::util::{strip_emphasis, validate_input};

/// Chapter plus its derived illustration URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterView {
  #[serde(flatten)]
  pub chapter: Chapter,
  pub image_url: Option<String>,
}

pub fn chapter_views(locale: Locale) -> Vec<ChapterView> {
  seeds::chapters(locale)
    .iter()
    .map(|c| ChapterView { chapter: c.clone(), image_url: c.image_url() })
    .collect()
}

#[instrument(level = "info", skip(state, topic), fields(%locale))]
pub async fn load_lesson(state: &AppState, topic: &str, locale: Locale) -> Result<LessonContent, ResolutionError> {
  let res = state.resolver.resolve(topic, locale).await;
  if let Err(e) = &res {
    warn!(target: "lesson", %locale, error = %e, retryable = e.is_retryable(), "Lesson unavailable");
  }
  res
}

/// The conversation a tutor session starts from.
pub fn opening_history(locale: Locale) -> Vec<ChatTurn> {
  vec![ChatTurn { role: ChatRole::Model, text: locale.tutor_greeting().to_string() }]
}

/// One tutor turn. Provider failures become the locale's apology; only bad input is an error.
#[instrument(level = "info", skip(state, history, message), fields(%locale, turns = history.len(), message_len = message.len()))]
pub async fn tutor_reply(
  state: &AppState,
  history: &[ChatTurn],
  message: &str,
  locale: Locale,
) -> Result<String, ValidationError> {
  validate_input(message, state.limits.max_input_chars)?;
  let opening;
  let history = if history.is_empty() {
    opening = opening_history(locale);
    &opening[..]
  } else {
    history
  };

  match state.tutor.converse(history, message, locale).await {
    Ok(text) => {
      let reply = strip_emphasis(&text);
      if reply.is_empty() {
        warn!(target: "tutor", "Tutor returned an empty reply");
        return Ok(locale.tutor_apology().to_string());
      }
      info!(target: "tutor", reply_len = reply.len(), "Tutor replied");
      Ok(reply)
    }
    Err(TutorError::Validation(v)) => Err(v),
    Err(e) => {
      warn!(target: "tutor", error = %e, "Tutor unavailable; sending apology");
      Ok(locale.tutor_apology().to_string())
    }
  }
}

#[instrument(level = "info", skip(state, text), fields(%locale, text_len = text.len()))]
pub async fn explain(state: &AppState, text: &str, locale: Locale) -> Result<String, ValidationError> {
  validate_input(text, state.limits.max_input_chars)?;
  let out = state.tutor.explain(text, locale).await;
  if out.trim().is_empty() {
    return Ok(locale.explain_apology().to_string());
  }
  Ok(out)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAudio {
  pub audio_base64: String,
  pub sample_rate: u32,
  pub channels: usize,
}

/// Remote audio for `text`, or `None` when nothing can be produced.
pub async fn speech_audio(state: &AppState, text: &str, locale: Locale) -> Result<Option<SpeechAudio>, ValidationError> {
  validate_input(text, state.limits.max_input_chars)?;
  Ok(state.remote_speech.audio_base64(text, locale).await.map(|audio_base64| SpeechAudio {
    audio_base64,
    sample_rate: REMOTE_SAMPLE_RATE,
    channels: REMOTE_CHANNELS,
  }))
}
