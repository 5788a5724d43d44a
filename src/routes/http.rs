//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{rejection::QueryRejection, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::domain::{LessonContent, Locale};
use crate::error::{ResolutionError, ValidationError};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

/// JSON error body with a retry hint for the front-end.
pub struct ApiError {
  status: StatusCode,
  body: ErrorOut,
}

impl From<ValidationError> for ApiError {
  fn from(e: ValidationError) -> Self {
    Self { status: StatusCode::BAD_REQUEST, body: ErrorOut { error: e.to_string(), retryable: false } }
  }
}

impl From<ResolutionError> for ApiError {
  fn from(e: ResolutionError) -> Self {
    match e {
      ResolutionError::Validation(v) => v.into(),
      other => Self {
        status: StatusCode::BAD_GATEWAY,
        body: ErrorOut { error: other.to_string(), retryable: other.is_retryable() },
      },
    }
  }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self {
    Self { status: StatusCode::BAD_REQUEST, body: ErrorOut { error: e.body_text(), retryable: false } }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status, Json(self.body)).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(q))]
pub async fn http_get_chapters(
  q: Result<Query<LocaleQuery>, QueryRejection>,
) -> Result<Json<Vec<ChapterView>>, ApiError> {
  let Query(q) = q?;
  let locale = q.locale.unwrap_or(Locale::Tw);
  Ok(Json(chapter_views(locale)))
}

#[instrument(level = "info", skip(state, q))]
pub async fn http_get_lesson(
  State(state): State<Arc<AppState>>,
  q: Result<Query<LessonQuery>, QueryRejection>,
) -> Result<Json<LessonContent>, ApiError> {
  let Query(q) = q?;
  info!(target: "lesson", locale = %q.locale, topic_len = q.topic.len(), "HTTP lesson requested");
  let lesson = load_lesson(&state, &q.topic, q.locale).await?;
  info!(target: "lesson", locale = %q.locale, title = %lesson.title, "HTTP lesson served");
  Ok(Json(lesson))
}

#[instrument(level = "info", skip(state, body), fields(locale = %body.locale, text_len = body.text.len()))]
pub async fn http_post_speech(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SpeechIn>,
) -> Result<Response, ApiError> {
  Ok(match speech_audio(&state, &body.text, body.locale).await? {
    Some(audio) => Json(audio).into_response(),
    None => StatusCode::NO_CONTENT.into_response(),
  })
}

#[instrument(level = "info", skip(state, body), fields(locale = %body.locale, turns = body.history.len()))]
pub async fn http_post_tutor_message(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TutorIn>,
) -> Result<Json<TextOut>, ApiError> {
  let text = tutor_reply(&state, &body.history, &body.message, body.locale).await?;
  Ok(Json(TextOut { text }))
}

#[instrument(level = "info", skip(state, body), fields(locale = %body.locale, text_len = body.text.len()))]
pub async fn http_post_tutor_explain(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ExplainIn>,
) -> Result<Json<TextOut>, ApiError> {
  let text = explain(&state, &body.text, body.locale).await?;
  Ok(Json(TextOut { text }))
}
