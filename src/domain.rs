//! Domain models: locales, lesson content, quiz items, tutor turns and chapters.
//!
//! Field names on the wire (and in the on-disk cache) keep the historical lesson JSON layout:
//! `vietnamese`/`mandarin` hold target/native text whichever way the learner is going.

use std::{collections::HashMap, fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which learner the app is serving. The two locales mirror each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
  /// Taiwanese learner: target Vietnamese, native Traditional Chinese.
  #[serde(rename = "TW")]
  Tw,
  /// Vietnamese learner: target Traditional Chinese, native Vietnamese.
  #[serde(rename = "VN")]
  Vn,
}

impl Locale {
  pub fn code(self) -> &'static str {
    match self {
      Locale::Tw => "TW",
      Locale::Vn => "VN",
    }
  }

  /// The language being learned, as spoken output.
  pub fn target_speech(self) -> SpeechLang {
    match self {
      Locale::Tw => SpeechLang::Vietnamese,
      Locale::Vn => SpeechLang::Chinese,
    }
  }

  pub fn explain_apology(self) -> &'static str {
    match self {
      Locale::Tw => "暫時無法翻譯。",
      Locale::Vn => "Không thể dịch ngay bây giờ.",
    }
  }

  pub fn tutor_apology(self) -> &'static str {
    match self {
      Locale::Tw => "抱歉，系統忙碌中。",
      Locale::Vn => "Xin lỗi, hệ thống đang bận.",
    }
  }

  /// First model turn of every tutor conversation.
  pub fn tutor_greeting(self) -> &'static str {
    match self {
      Locale::Tw => "Xin chào! Bạn khỏe không? (你好！你好嗎？)",
      Locale::Vn => "你好！你好嗎? (Xin chào! Bạn khỏe không?)",
    }
  }
}

impl fmt::Display for Locale {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

impl FromStr for Locale {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "TW" => Ok(Locale::Tw),
      "VN" => Ok(Locale::Vn),
      other => Err(format!("unknown locale '{}'", other)),
    }
  }
}

/// Spoken language for synthesis. Carries the BCP-47 tag and the learner-friendly rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechLang {
  Vietnamese,
  Chinese,
}

impl SpeechLang {
  pub fn tag(self) -> &'static str {
    match self {
      SpeechLang::Vietnamese => "vi-VN",
      SpeechLang::Chinese => "zh-TW",
    }
  }

  /// Slower than the engine default (1.0); Vietnamese is slowed a bit more.
  pub fn learner_rate(self) -> f32 {
    match self {
      SpeechLang::Vietnamese => 0.85,
      SpeechLang::Chinese => 0.9,
    }
  }
}

/// Composite cache/seed key: `<LOCALE>-<topic>`.
pub fn lesson_key(locale: Locale, topic: &str) -> String {
  format!("{}-{}", locale.code(), topic.trim())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
  pub speaker: String,
  /// Target-language text.
  #[serde(rename = "vietnamese")]
  pub target: String,
  /// Native-language explanation.
  #[serde(rename = "mandarin")]
  pub native: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VocabularyItem {
  pub word: String,
  pub meaning: String,
  /// IPA for Vietnamese, tone-marked pinyin for Chinese.
  pub pronunciation: String,
  /// Sino-Vietnamese reading (either direction).
  pub han_viet: String,
  #[serde(rename = "type")]
  pub category: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrammarPoint {
  pub title: String,
  pub explanation: String,
  #[serde(rename = "exampleViet")]
  pub example_target: String,
  #[serde(rename = "exampleMandarin")]
  pub example_native: String,
}

/// A sentence scrambling exercise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizItem {
  pub question: String,
  pub correct_sentence: String,
  pub scrambled_words: Vec<String>,
  pub explanation: String,
}

/// Lowercase and drop `. , ? !` so answers compare punctuation-insensitively.
pub fn normalize_sentence(s: &str) -> String {
  s.to_lowercase()
    .chars()
    .filter(|c| !matches!(c, '.' | ',' | '?' | '!'))
    .collect::<String>()
    .trim()
    .to_string()
}

fn normalized_words<'a, I: IntoIterator<Item = &'a str>>(parts: I) -> Vec<String> {
  parts
    .into_iter()
    .flat_map(|p| p.split_whitespace())
    .map(normalize_sentence)
    .filter(|w| !w.is_empty())
    .collect()
}

impl QuizItem {
  /// Normalized whitespace tokens of the correct sentence.
  pub fn sentence_tokens(&self) -> Vec<String> {
    normalized_words([self.correct_sentence.as_str()])
  }

  /// Normalized pool words. Multi-word pool entries ("Đài Loan") count word by word.
  fn pool_words(&self) -> Vec<String> {
    normalized_words(self.scrambled_words.iter().map(String::as_str))
  }

  /// Sentence tokens not covered by the pool (multiset difference), in sentence order.
  pub fn missing_tokens(&self) -> Vec<String> {
    let mut pool: HashMap<String, usize> = HashMap::new();
    for w in self.pool_words() {
      *pool.entry(w).or_default() += 1;
    }
    let mut missing = Vec::new();
    for t in self.sentence_tokens() {
      match pool.get_mut(&t) {
        Some(n) if *n > 0 => *n -= 1,
        _ => missing.push(t),
      }
    }
    missing
  }

  /// Every sentence token is in the pool and at least one distractor remains.
  pub fn is_playable(&self) -> bool {
    let tokens = self.sentence_tokens();
    !tokens.is_empty() && self.missing_tokens().is_empty() && self.pool_words().len() > tokens.len()
  }

  /// Insert missing sentence tokens at random pool positions.
  /// Returns `None` when the item still has no distractor (unplayable).
  pub fn repair<R: Rng + ?Sized>(mut self, rng: &mut R) -> Option<QuizItem> {
    let originals: Vec<String> = self.correct_sentence.split_whitespace().map(str::to_string).collect();
    for token in self.missing_tokens() {
      // Prefer the sentence's own spelling of the token over its normalized form.
      let text = originals
        .iter()
        .find(|o| normalize_sentence(o) == token)
        .cloned()
        .unwrap_or(token);
      let at = rng.gen_range(0..=self.scrambled_words.len());
      self.scrambled_words.insert(at, text);
    }
    if self.is_playable() { Some(self) } else { None }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LessonContent {
  pub title: String,
  pub introduction: String,
  pub dialogue: Vec<DialogueLine>,
  pub vocabulary: Vec<VocabularyItem>,
  pub grammar: Vec<GrammarPoint>,
  #[serde(rename = "practice_quiz")]
  pub quiz: Vec<QuizItem>,
}

impl LessonContent {
  /// Repair or drop quiz items that break the token-pool invariant.
  pub fn sanitize_quizzes<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    let before = self.quiz.len();
    let items = std::mem::take(&mut self.quiz);
    self.quiz = items
      .into_iter()
      .filter_map(|q| {
        if q.is_playable() {
          return Some(q);
        }
        let sentence = q.correct_sentence.clone();
        let repaired = q.repair(&mut *rng);
        if repaired.is_none() {
          warn!(target: "lesson", %sentence, "Dropping unplayable quiz item (no distractor)");
        }
        repaired
      })
      .collect();
    if self.quiz.len() != before {
      warn!(target: "lesson", title = %self.title, before, after = self.quiz.len(), "Quiz items dropped");
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
  User,
  Model,
}

/// One turn of a tutor conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
  pub role: ChatRole,
  pub text: String,
}

/// A curriculum entry. Its `title` is the topic key used for lesson resolution.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
  pub id: &'static str,
  pub title: &'static str,
  pub description: &'static str,
  pub image_seed: u32,
  pub image_prompt: &'static str,
}

const IMAGE_BASE_URL: &str = "https://image.pollinations.ai/prompt/";

impl Chapter {
  /// Deterministic illustration URL (fixed seed keeps images stable across reloads).
  pub fn image_url(&self) -> Option<String> {
    let mut url = reqwest::Url::parse(IMAGE_BASE_URL).ok()?;
    {
      let mut segs = url.path_segments_mut().ok()?;
      segs.pop_if_empty();
      segs.push(if self.image_prompt.is_empty() { self.title } else { self.image_prompt });
    }
    url
      .query_pairs_mut()
      .append_pair("width", "800")
      .append_pair("height", "500")
      .append_pair("nologo", "true")
      .append_pair("seed", &self.image_seed.to_string())
      .append_pair("model", "flux");
    Some(url.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{rngs::StdRng, SeedableRng};

  fn quiz(sentence: &str, words: &[&str]) -> QuizItem {
    QuizItem {
      question: "Sắp xếp câu".into(),
      correct_sentence: sentence.into(),
      scrambled_words: words.iter().map(|w| w.to_string()).collect(),
      explanation: String::new(),
    }
  }

  #[test]
  fn locale_parses_case_insensitively_and_serializes_as_code() {
    assert_eq!("tw".parse::<Locale>(), Ok(Locale::Tw));
    assert_eq!(" VN ".parse::<Locale>(), Ok(Locale::Vn));
    assert!("EN".parse::<Locale>().is_err());
    assert_eq!(serde_json::to_string(&Locale::Vn).unwrap(), "\"VN\"");
  }

  #[test]
  fn lesson_key_uses_locale_prefix() {
    assert_eq!(lesson_key(Locale::Tw, " Xin Chào (打招呼) "), "TW-Xin Chào (打招呼)");
  }

  #[test]
  fn playable_quiz_needs_all_tokens_and_a_distractor() {
    assert!(quiz("Tôi là Lan", &["Lan", "là", "Tôi", "bạn"]).is_playable());
    assert!(!quiz("Tôi là Lan", &["Lan", "là", "Tôi"]).is_playable());
    assert!(!quiz("Tôi là là Lan", &["Lan", "là", "Tôi", "bạn"]).is_playable());
  }

  #[test]
  fn multi_word_pool_entries_and_punctuation_are_tolerated() {
    assert!(quiz("Bạn là người Đài Loan.", &["Bạn", "là", "Việt Nam", "người", "Đài Loan"]).is_playable());
  }

  #[test]
  fn normalize_sentence_strips_listed_punctuation_only() {
    assert_eq!(normalize_sentence(" Tôi là Lan. "), "tôi là lan");
    assert_eq!(normalize_sentence("Bạn khỏe không?!"), "bạn khỏe không");
    assert_eq!(normalize_sentence("你 好。"), "你 好。");
  }

  #[test]
  fn repair_inserts_missing_tokens() {
    let mut rng = StdRng::seed_from_u64(7);
    let fixed = quiz("Em là người Việt", &["là", "người", "Em", "anh"])
      .repair(&mut rng)
      .expect("repairable");
    assert!(fixed.is_playable());
    assert_eq!(fixed.scrambled_words.len(), 5);
    assert!(fixed.scrambled_words.iter().any(|w| w == "Việt"));
  }

  #[test]
  fn repair_gives_up_without_distractor() {
    let mut rng = StdRng::seed_from_u64(7);
    assert!(quiz("Tôi là Lan", &["Tôi", "là"]).repair(&mut rng).is_none());
  }

  #[test]
  fn sanitize_drops_only_unplayable_items() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut lesson = LessonContent {
      title: "t".into(),
      introduction: "i".into(),
      dialogue: vec![],
      vocabulary: vec![],
      grammar: vec![],
      quiz: vec![
        quiz("Tôi là Lan", &["Lan", "là", "Tôi", "bạn"]),
        quiz("Tôi là Lan", &["Tôi"]),
      ],
    };
    lesson.sanitize_quizzes(&mut rng);
    assert_eq!(lesson.quiz.len(), 1);
  }

  #[test]
  fn lesson_json_keeps_historical_field_names() {
    let line = DialogueLine { speaker: "Hùng".into(), target: "Chào em".into(), native: "你好".into() };
    let v = serde_json::to_value(&line).unwrap();
    assert_eq!(v["vietnamese"], "Chào em");
    assert_eq!(v["mandarin"], "你好");
  }

  #[test]
  fn chapter_image_url_is_encoded_and_seeded() {
    let ch = Chapter {
      id: "Bai 1",
      title: "Xin Chào",
      description: "",
      image_seed: 124,
      image_prompt: "two students, sunny street",
    };
    let url = ch.image_url().expect("url");
    assert!(url.starts_with("https://image.pollinations.ai/prompt/two%20students"));
    assert!(!url.contains(' '));
    assert!(url.contains("seed=124"));
    assert!(url.ends_with("model=flux"));
  }
}
