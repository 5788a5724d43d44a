//! Small utility helpers used across modules.

use crate::error::ValidationError;

/// Default ceiling for any free-text input sent to the model.
pub const MAX_INPUT_CHARS: usize = 2000;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Reject empty (after trimming) or oversized input.
pub fn validate_input(text: &str, max_chars: usize) -> Result<(), ValidationError> {
  if text.trim().is_empty() {
    return Err(ValidationError::Empty);
  }
  let len = text.chars().count();
  if len > max_chars {
    return Err(ValidationError::TooLong { len, max: max_chars });
  }
  Ok(())
}

/// True if unicode char belongs to CJK ranges.
pub fn is_cjk(ch: char) -> bool {
  (ch >= '\u{4E00}' && ch <= '\u{9FFF}')
    || (ch >= '\u{3400}' && ch <= '\u{4DBF}')
    || (ch >= '\u{20000}' && ch <= '\u{2A6DF}')
    || (ch >= '\u{2A700}' && ch <= '\u{2B73F}')
    || (ch >= '\u{2B740}' && ch <= '\u{2B81F}')
    || (ch >= '\u{2B820}' && ch <= '\u{2CEAF}')
    || (ch >= '\u{F900}' && ch <= '\u{FAFF}')
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop Markdown emphasis markers the chat model likes to sprinkle in.
pub fn strip_emphasis(s: &str) -> String {
  s.replace('*', "").trim().to_string()
}

/// Log-safe truncation for large strings (char boundary aware).
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validate_rejects_blank_and_oversized() {
    assert_eq!(validate_input("   ", 10), Err(ValidationError::Empty));
    assert_eq!(
      validate_input("abcdef", 5),
      Err(ValidationError::TooLong { len: 6, max: 5 })
    );
    assert!(validate_input("Số Đếm (數字)", MAX_INPUT_CHARS).is_ok());
  }

  #[test]
  fn length_is_counted_in_chars_not_bytes() {
    // 5 Han characters are 15 bytes in UTF-8.
    assert!(validate_input("你叫什麼名", 5).is_ok());
  }

  #[test]
  fn fill_template_replaces_all_keys() {
    let out = fill_template("Topic: \"{topic}\" / {topic}", &[("topic", "Mua Sắm")]);
    assert_eq!(out, "Topic: \"Mua Sắm\" / Mua Sắm");
  }

  #[test]
  fn emphasis_and_whitespace_helpers() {
    assert_eq!(strip_emphasis("**Chào** bạn!*"), "Chào bạn!");
    assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    assert_eq!(trunc_for_log("xin chào", 3), "xin… (9 bytes total)");
  }
}
