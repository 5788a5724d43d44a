//! Minimal Gemini client for our use-cases, plus the provider traits the rest of the crate
//! depends on.
//!
//! We only call `models/{model}:generateContent` and request either plain text, a strict JSON
//! object (lesson generation) or inline audio (speech synthesis).
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key; it travels in the `x-goog-api-key` header.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::config::{Prompts, Settings};
use crate::domain::{ChatRole, ChatTurn, LessonContent, Locale};
use crate::error::{GenerationError, TutorError};
use crate::schema::{accept_lesson, lesson_response_schema};
use crate::speech::clean_for_speech;
use crate::util::{fill_template, validate_input};

/// Produces a lesson for a topic. No caching here; that is the resolver's job.
#[async_trait]
pub trait LessonGenerator: Send + Sync {
  async fn generate(&self, topic: &str, locale: Locale) -> Result<LessonContent, GenerationError>;
}

/// Remote text-to-speech. Returns base64 PCM16 (24 kHz mono) or `None`; never errors.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
  async fn synthesize_speech(&self, text: &str, locale: Locale) -> Option<String>;
}

/// Conversational tutor and sentence explanation.
#[async_trait]
pub trait TutorModel: Send + Sync {
  /// Uncached: every call sends the whole prior conversation.
  async fn converse(&self, history: &[ChatTurn], message: &str, locale: Locale) -> Result<String, TutorError>;
  /// Empty string on any failure.
  async fn explain(&self, text: &str, locale: Locale) -> String;
}

/// Stand-in used when no API key is configured.
pub struct Offline;

#[async_trait]
impl LessonGenerator for Offline {
  async fn generate(&self, _topic: &str, _locale: Locale) -> Result<LessonContent, GenerationError> {
    Err(GenerationError::Unavailable)
  }
}

#[async_trait]
impl SpeechSynthesizer for Offline {
  async fn synthesize_speech(&self, _text: &str, _locale: Locale) -> Option<String> {
    None
  }
}

#[async_trait]
impl TutorModel for Offline {
  async fn converse(&self, _history: &[ChatTurn], _message: &str, _locale: Locale) -> Result<String, TutorError> {
    Err(TutorError::Unavailable)
  }

  async fn explain(&self, _text: &str, _locale: Locale) -> String {
    String::new()
  }
}

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub text_model: String,
  pub tts_model: String,
  pub voice: String,
  prompts: Prompts,
  max_input_chars: usize,
  thinking_budget: u32,
}

impl Gemini {
  /// Construct the client if an API key is configured; otherwise return None.
  pub fn from_settings(settings: &Settings, prompts: Prompts, max_input_chars: usize, thinking_budget: u32) -> Option<Self> {
    let api_key = settings.gemini_api_key.clone()?;
    let client = reqwest::Client::builder().timeout(settings.timeout).build().ok()?;
    Some(Self {
      client,
      api_key,
      base_url: settings.gemini_base_url.trim_end_matches('/').to_string(),
      text_model: settings.text_model.clone(),
      tts_model: settings.tts_model.clone(),
      voice: settings.voice.clone(),
      prompts,
      max_input_chars,
      thinking_budget,
    })
  }

  /// One `generateContent` round trip. Returns the first candidate's parts.
  #[instrument(level = "info", skip_all, fields(%model))]
  async fn generate_content(&self, model: &str, req: &GenerateContentRequest) -> Result<Vec<Part>, String> {
    let url = format!("{}/models/{}:generateContent", self.base_url, model);
    let start = std::time::Instant::now();

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "vietlearn-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(req)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or(body);
      return Err(format!("Gemini HTTP {}: {}", status, msg));
    }

    let body: GenerateContentResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage_metadata {
      info!(
        elapsed = ?start.elapsed(),
        prompt_tokens = ?usage.prompt_token_count,
        candidates_tokens = ?usage.candidates_token_count,
        total_tokens = ?usage.total_token_count,
        "Gemini usage"
      );
    }
    Ok(body.candidates.into_iter().next().and_then(|c| c.content).map(|c| c.parts).unwrap_or_default())
  }
}

/// Concatenated non-thought text parts.
fn parts_text(parts: &[Part]) -> String {
  parts
    .iter()
    .filter(|p| !p.thought.unwrap_or(false))
    .filter_map(|p| p.text.as_deref())
    .collect::<String>()
    .trim()
    .to_string()
}

fn user_turn(text: &str) -> Content {
  Content { role: Some("user".into()), parts: vec![PartReq { text: text.to_string() }] }
}

fn system(text: &str) -> Content {
  Content { role: None, parts: vec![PartReq { text: text.to_string() }] }
}

#[async_trait]
impl LessonGenerator for Gemini {
  #[instrument(level = "info", skip(self), fields(model = %self.text_model))]
  async fn generate(&self, topic: &str, locale: Locale) -> Result<LessonContent, GenerationError> {
    validate_input(topic, self.max_input_chars)?;
    let topic = topic.trim();
    let instruction = fill_template(self.prompts.lesson_instruction(locale), &[("topic", topic)]);
    let user = fill_template(&self.prompts.lesson_user_template, &[("topic", topic)]);

    let req = GenerateContentRequest {
      contents: vec![user_turn(&user)],
      system_instruction: Some(system(&instruction)),
      generation_config: Some(json!({
        "responseMimeType": "application/json",
        "responseSchema": lesson_response_schema(),
        "thinkingConfig": { "thinkingBudget": self.thinking_budget }
      })),
    };

    let parts = self.generate_content(&self.text_model, &req).await.map_err(|e| {
      error!(target: "lesson", %locale, %topic, error = %e, "Lesson generation call failed");
      GenerationError::Remote(e)
    })?;
    let text = parts_text(&parts);
    let lesson = accept_lesson(&text, locale).map_err(|e| {
      error!(target: "lesson", %locale, %topic, error = %e, response_len = text.len(), "Lesson payload rejected");
      e
    })?;

    info!(
      target: "lesson",
      title = %lesson.title,
      dialogue = lesson.dialogue.len(),
      vocabulary = lesson.vocabulary.len(),
      quiz = lesson.quiz.len(),
      "Lesson generated"
    );
    Ok(lesson)
  }
}

#[async_trait]
impl SpeechSynthesizer for Gemini {
  #[instrument(level = "info", skip(self, text), fields(model = %self.tts_model, text_len = text.len()))]
  async fn synthesize_speech(&self, text: &str, locale: Locale) -> Option<String> {
    if validate_input(text, self.max_input_chars).is_err() {
      return None;
    }
    let clean = clean_for_speech(text, locale);
    if clean.is_empty() {
      warn!(target: "speech", "Audio generation skipped: text empty after cleaning");
      return None;
    }

    let req = GenerateContentRequest {
      contents: vec![user_turn(&clean)],
      system_instruction: None,
      generation_config: Some(json!({
        "responseModalities": ["AUDIO"],
        "speechConfig": { "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.voice } } }
      })),
    };

    match self.generate_content(&self.tts_model, &req).await {
      Ok(parts) => parts.into_iter().find_map(|p| p.inline_data).map(|d| d.data).filter(|d| !d.is_empty()),
      Err(e) => {
        error!(target: "speech", error = %e, "TTS call failed");
        None
      }
    }
  }
}

#[async_trait]
impl TutorModel for Gemini {
  #[instrument(level = "info", skip(self, history, message), fields(turns = history.len(), message_len = message.len()))]
  async fn converse(&self, history: &[ChatTurn], message: &str, locale: Locale) -> Result<String, TutorError> {
    validate_input(message, self.max_input_chars)?;

    let mut contents: Vec<Content> = history
      .iter()
      .map(|t| Content {
        role: Some(match t.role {
          ChatRole::User => "user".into(),
          ChatRole::Model => "model".into(),
        }),
        parts: vec![PartReq { text: t.text.clone() }],
      })
      .collect();
    contents.push(user_turn(message.trim()));

    let req = GenerateContentRequest {
      contents,
      system_instruction: Some(system(self.prompts.tutor_instruction(locale))),
      generation_config: None,
    };

    let parts = self.generate_content(&self.text_model, &req).await.map_err(|e| {
      error!(target: "tutor", error = %e, "Tutor chat call failed");
      TutorError::Remote(e)
    })?;
    Ok(parts_text(&parts))
  }

  #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
  async fn explain(&self, text: &str, locale: Locale) -> String {
    if validate_input(text, self.max_input_chars).is_err() {
      return String::new();
    }
    let prompt = fill_template(self.prompts.explain_template(locale), &[("text", text.trim())]);
    let req = GenerateContentRequest { contents: vec![user_turn(&prompt)], system_instruction: None, generation_config: None };

    match self.generate_content(&self.text_model, &req).await {
      Ok(parts) => parts_text(&parts),
      Err(e) => {
        error!(target: "tutor", error = %e, "Explanation call failed");
        String::new()
      }
    }
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  generation_config: Option<Value>,
}
#[derive(Serialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  parts: Vec<PartReq>,
}
#[derive(Serialize)]
struct PartReq { text: String }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<CandidateContent> }
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<Part> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
  #[serde(default)] text: Option<String>,
  #[serde(default)] thought: Option<bool>,
  #[serde(default)] inline_data: Option<InlineData>,
}
#[derive(Deserialize)]
struct InlineData { data: String }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_serializes_in_provider_shape() {
    let req = GenerateContentRequest {
      contents: vec![user_turn("Xin chào")],
      system_instruction: Some(system("be nice")),
      generation_config: Some(json!({ "responseMimeType": "application/json" })),
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["contents"][0]["role"], "user");
    assert_eq!(v["contents"][0]["parts"][0]["text"], "Xin chào");
    assert_eq!(v["systemInstruction"]["parts"][0]["text"], "be nice");
    assert!(v["systemInstruction"].get("role").is_none());
    assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
  }

  #[test]
  fn response_text_skips_thought_parts() {
    let body: GenerateContentResponse = serde_json::from_str(
      r#"{"candidates":[{"content":{"parts":[{"text":"plan...","thought":true},{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
    )
    .unwrap();
    let parts = body.candidates.into_iter().next().unwrap().content.unwrap().parts;
    assert_eq!(parts_text(&parts), "{\"a\":1}");
  }

  #[test]
  fn inline_audio_is_read_from_parts() {
    let body: GenerateContentResponse = serde_json::from_str(
      r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"audio/L16;rate=24000","data":"AAAA"}}]}}],
          "usageMetadata":{"promptTokenCount":3,"totalTokenCount":9}}"#,
    )
    .unwrap();
    assert_eq!(body.usage_metadata.as_ref().and_then(|u| u.total_token_count), Some(9));
    let data = body.candidates.into_iter().flat_map(|c| c.content).flat_map(|c| c.parts).find_map(|p| p.inline_data);
    assert_eq!(data.map(|d| d.data), Some("AAAA".to_string()));
  }

  #[test]
  fn extracts_error_message() {
    let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
    assert_eq!(extract_gemini_error(body), Some("Resource has been exhausted".into()));
    assert_eq!(extract_gemini_error("<html>"), None);
  }

  #[tokio::test]
  async fn offline_provider_degrades_softly() {
    assert!(matches!(Offline.generate("Số Đếm", Locale::Tw).await, Err(GenerationError::Unavailable)));
    assert_eq!(Offline.synthesize_speech("Xin chào", Locale::Tw).await, None);
    assert_eq!(Offline.explain("Xin chào", Locale::Tw).await, "");
  }
}
