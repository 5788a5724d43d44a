//! Configuration: environment settings plus optional TOML overrides for prompts and limits.
//!
//! See `AgentConfig`, `Prompts` and `Limits` for the TOML schema.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Locale;
use crate::util::MAX_INPUT_CHARS;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub limits: Limits,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
  /// Ceiling for topics, tutor messages, explain/speech text.
  pub max_input_chars: usize,
  /// Model thinking budget for lesson generation (long structured output).
  pub thinking_budget: u32,
}

impl Default for Limits {
  fn default() -> Self {
    Self { max_input_chars: MAX_INPUT_CHARS, thinking_budget: 4096 }
  }
}

/// Prompts sent to the generative model. `{topic}` and `{text}` are template keys.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub lesson_tw: String,
  pub lesson_vn: String,
  pub lesson_user_template: String,
  pub tutor_tw: String,
  pub tutor_vn: String,
  pub explain_tw: String,
  pub explain_vn: String,
}

impl Prompts {
  pub fn lesson_instruction(&self, locale: Locale) -> &str {
    match locale {
      Locale::Tw => &self.lesson_tw,
      Locale::Vn => &self.lesson_vn,
    }
  }

  pub fn tutor_instruction(&self, locale: Locale) -> &str {
    match locale {
      Locale::Tw => &self.tutor_tw,
      Locale::Vn => &self.tutor_vn,
    }
  }

  pub fn explain_template(&self, locale: Locale) -> &str {
    match locale {
      Locale::Tw => &self.explain_tw,
      Locale::Vn => &self.explain_vn,
    }
  }
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      lesson_tw: r#"
You are a professional Vietnamese language teacher for Taiwanese students.
Create a detailed lesson plan based on the topic: "{topic}".

Pedagogical Requirements:
1. **Target Language**: Vietnamese. **Native Language**: Traditional Chinese.
2. **Pronunciation**: Provide IPA transcription in the 'pronunciation' field (e.g., /sin tɕaːw/).
3. **Hán Việt**: Provide Sino-Vietnamese equivalents in the 'han_viet' field (e.g., "Xin Chào" -> "漢越：欣朝").
4. **Structure**:
   - 'vietnamese' field = PURE Vietnamese text (Target).
   - 'mandarin' field = Traditional Chinese text (Meaning).
5. **Strict Output**: No Chinese characters in the 'vietnamese' field.
6. **Quantity**:
   - Vocabulary: Provide **AT LEAST 20** essential words related to the topic.
   - Quiz: Provide **AT LEAST 10** sentence scrambling questions.
7. **Quiz tokens**: 'scrambled_words' must contain every word of 'correct_sentence' plus at least one distractor.
"#
      .into(),
      lesson_vn: r#"
You are a professional Chinese (Mandarin) language teacher for Vietnamese students.
Create a detailed lesson plan based on the topic: "{topic}".

Pedagogical Requirements:
1. **Target Language**: Traditional Chinese (Taiwan usage). **Native Language**: Vietnamese.
2. **Pronunciation**: Provide Pinyin with tone marks in the 'pronunciation' field (e.g., nǐ hǎo).
3. **Hán Việt**: Provide the Sino-Vietnamese sound of the Chinese characters in the 'han_viet' field (e.g., "你好" -> "Nhĩ Hảo").
4. **Structure**:
   - 'vietnamese' field = PURE Chinese text (Target). (The schema key is 'vietnamese' but you must put CHINESE here.)
   - 'mandarin' field = Vietnamese text (Meaning).
5. **Quantity**:
   - Vocabulary: Provide **AT LEAST 20** essential words related to the topic.
   - Quiz: Provide **AT LEAST 10** sentence scrambling questions.
6. **Quiz tokens**: write 'correct_sentence' with single spaces between words (e.g., "你 是 台灣 人");
   'scrambled_words' must contain every one of those words plus at least one distractor.
"#
      .into(),
      lesson_user_template: "Topic: \"{topic}\".\nFollow the JSON schema strictly.".into(),
      tutor_tw: "You are a friendly Vietnamese tutor for a Taiwanese student. Reply in Vietnamese.".into(),
      tutor_vn: "You are a friendly Chinese (Taiwanese Mandarin) tutor for a Vietnamese student. Reply in Chinese."
        .into(),
      explain_tw: r#"
請針對以下越南文句子進行解析： "{text}"

嚴格規則：
1. **絕對禁止使用英文**。
2. 請使用**繁體中文**回答。
3. 格式必須完全符合以下三行，確保簡潔有效率：
   【翻譯】(自然流暢的中文翻譯)
   【單字】(列出 1-2 個關鍵單字與意思)
   【文法】(用**一句話**簡潔解釋句型結構)
"#
      .into(),
      explain_vn: r#"
Vui lòng phân tích câu tiếng Trung (Đài Loan) sau: "{text}"

Quy tắc nghiêm ngặt:
1. **TUYỆT ĐỐI KHÔNG DÙNG TIẾNG ANH**.
2. Trả lời bằng **Tiếng Việt**.
3. Định dạng phải chính xác như sau để ngắn gọn:
   【Dịch】(Dịch nghĩa tự nhiên)
   【Từ vựng】(Liệt kê 1-2 từ khóa và nghĩa)
   【Ngữ pháp】(Giải thích cấu trúc trong **một câu** ngắn gọn)
"#
      .into(),
    }
  }
}

/// Environment-level settings, read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
  pub gemini_api_key: Option<String>,
  pub gemini_base_url: String,
  pub text_model: String,
  pub tts_model: String,
  pub voice: String,
  pub timeout: Duration,
  pub cache_dir: PathBuf,
  pub cache_quota_bytes: usize,
}

impl Settings {
  pub fn from_env() -> Self {
    let var = |k: &str, d: &str| std::env::var(k).unwrap_or_else(|_| d.to_string());
    let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS").ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(90);
    let cache_quota_bytes =
      std::env::var("CACHE_QUOTA_BYTES").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(5 * 1024 * 1024);

    Self {
      gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
      gemini_base_url: var("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com/v1beta"),
      text_model: var("GEMINI_TEXT_MODEL", "gemini-2.5-flash"),
      tts_model: var("GEMINI_TTS_MODEL", "gemini-2.5-flash-preview-tts"),
      voice: var("GEMINI_VOICE", "Kore"),
      timeout: Duration::from_secs(timeout_secs),
      cache_dir: PathBuf::from(var("CACHE_DIR", "./cache")),
      cache_quota_bytes,
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "vietlearn", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "vietlearn", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "vietlearn", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_remaining_defaults() {
    let cfg: AgentConfig = toml::from_str(
      r#"
      [prompts]
      tutor_tw = "Bạn là gia sư."
      [limits]
      max_input_chars = 500
      "#,
    )
    .expect("valid toml");
    assert_eq!(cfg.prompts.tutor_instruction(Locale::Tw), "Bạn là gia sư.");
    assert_eq!(cfg.prompts.tutor_vn, Prompts::default().tutor_vn);
    assert_eq!(cfg.limits.max_input_chars, 500);
    assert_eq!(cfg.limits.thinking_budget, 4096);
  }

  #[test]
  fn default_prompts_carry_template_keys() {
    let p = Prompts::default();
    for locale in [Locale::Tw, Locale::Vn] {
      assert!(p.lesson_instruction(locale).contains("{topic}"));
      assert!(p.lesson_instruction(locale).contains("AT LEAST 20"));
      assert!(p.explain_template(locale).contains("{text}"));
    }
  }
}
