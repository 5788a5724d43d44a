//! Lesson response schema (sent to the model) and the strict decode step applied to its output.
//!
//! Decoding is all-or-nothing: a payload that does not match `LessonContent` is a parse failure
//! and no partial lesson is produced. Accepted lessons then get their quiz items repaired or
//! dropped and, for Chinese targets, missing pinyin completed.

use rand::Rng;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::{LessonContent, Locale};
use crate::error::GenerationError;
use crate::pinyin::fill_missing_pronunciation;

/// Structured-output schema in the provider's OpenAPI subset.
pub fn lesson_response_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "title": { "type": "STRING" },
      "introduction": { "type": "STRING", "description": "Short intro in the student's native language" },
      "dialogue": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "speaker": { "type": "STRING" },
            "vietnamese": { "type": "STRING", "description": "Target Language Text (Vietnamese for TW students, Chinese for VN students)." },
            "mandarin": { "type": "STRING", "description": "Explanation/Native Language Text." }
          },
          "required": ["speaker", "vietnamese", "mandarin"]
        }
      },
      "vocabulary": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "word": { "type": "STRING", "description": "The word to learn (Target Language)" },
            "meaning": { "type": "STRING", "description": "Meaning in Student's Native Language" },
            "pronunciation": { "type": "STRING", "description": "IPA (for Vietnamese) or Pinyin (for Chinese)" },
            "han_viet": { "type": "STRING", "description": "Sino-Vietnamese equivalent (Hán Việt)" },
            "type": { "type": "STRING" }
          },
          "required": ["word", "meaning", "pronunciation", "han_viet", "type"]
        }
      },
      "grammar": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "title": { "type": "STRING" },
            "explanation": { "type": "STRING", "description": "Explanation in Student's Native Language" },
            "exampleViet": { "type": "STRING", "description": "Example in Target Language" },
            "exampleMandarin": { "type": "STRING", "description": "Meaning in Student's Native Language" }
          },
          "required": ["title", "explanation", "exampleViet", "exampleMandarin"]
        }
      },
      "practice_quiz": {
        "type": "ARRAY",
        "description": "A sentence scrambling game.",
        "items": {
          "type": "OBJECT",
          "properties": {
            "question": { "type": "STRING", "description": "Instruction in Student's Native Language" },
            "correct_sentence": { "type": "STRING", "description": "Correct sentence in Target Language" },
            "scrambled_words": { "type": "ARRAY", "items": { "type": "STRING" }, "description": "List of words including 1 distractor" },
            "explanation": { "type": "STRING", "description": "Explanation in Student's Native Language" }
          },
          "required": ["question", "correct_sentence", "scrambled_words", "explanation"]
        }
      }
    },
    "required": ["title", "introduction", "dialogue", "vocabulary", "grammar", "practice_quiz"]
  })
}

/// Models occasionally wrap JSON in a Markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
  let t = text.trim();
  let Some(rest) = t.strip_prefix("```") else { return t };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Decode and accept a lesson payload using the thread-local RNG for quiz repair.
pub fn accept_lesson(text: &str, locale: Locale) -> Result<LessonContent, GenerationError> {
  decode_lesson(text, locale, &mut rand::thread_rng())
}

pub fn decode_lesson<R: Rng + ?Sized>(
  text: &str,
  locale: Locale,
  rng: &mut R,
) -> Result<LessonContent, GenerationError> {
  let body = strip_code_fence(text);
  if body.is_empty() {
    return Err(GenerationError::Parse("no content generated".into()));
  }
  let mut lesson: LessonContent =
    serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;
  if lesson.title.trim().is_empty() {
    return Err(GenerationError::Parse("lesson has an empty title".into()));
  }

  let (dialogue_before, vocab_before) = (lesson.dialogue.len(), lesson.vocabulary.len());
  lesson.dialogue.retain(|l| !l.target.trim().is_empty());
  lesson.vocabulary.retain(|v| !v.word.trim().is_empty());
  if lesson.dialogue.len() != dialogue_before || lesson.vocabulary.len() != vocab_before {
    debug!(target: "lesson", title = %lesson.title, "Dropped blank dialogue/vocabulary entries");
  }

  lesson.sanitize_quizzes(rng);
  fill_missing_pronunciation(&mut lesson, locale);
  Ok(lesson)
}
