//! Hanzi → Hanyu Pinyin (tone diacritics, space-separated), copy non-Chinese as-is.
//!
//! Used to complete vocabulary pronunciations the model left blank for Chinese targets.
//!
//! Example:
//!   輸入: "你好 2025！"
//!   輸出: "nǐ hǎo 2025！"
use pinyin::ToPinyin;
use tracing::debug;

use crate::domain::{LessonContent, Locale};

/// Convert Chinese text into Hanyu Pinyin with tone diacritics, space-separated.
/// Per-character conversion (no word segmentation): polyphonic characters get their default reading.
pub fn to_pinyin_diacritics(text: &str) -> String {
  let mut out = String::with_capacity(text.len() * 2);
  let mut last_was_hanzi = false;

  for ch in text.chars() {
    if let Some(py) = ch.to_pinyin() {
      if last_was_hanzi {
        out.push(' ');
      }
      out.push_str(py.with_tone());
      last_was_hanzi = true;
    } else {
      out.push(ch);
      last_was_hanzi = false;
    }
  }

  out
}

/// Fill empty `pronunciation` fields when the target language is Chinese.
/// Returns how many items were completed.
pub fn fill_missing_pronunciation(lesson: &mut LessonContent, locale: Locale) -> usize {
  if locale != Locale::Vn {
    return 0;
  }
  let mut filled = 0;
  for item in lesson.vocabulary.iter_mut().filter(|v| v.pronunciation.trim().is_empty()) {
    item.pronunciation = to_pinyin_diacritics(&item.word);
    filled += 1;
  }
  if filled > 0 {
    debug!(target: "lesson", title = %lesson.title, filled, "Completed vocabulary pinyin locally");
  }
  filled
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::VocabularyItem;

  fn lesson_with(word: &str, pronunciation: &str) -> LessonContent {
    LessonContent {
      title: "t".into(),
      introduction: "i".into(),
      dialogue: vec![],
      vocabulary: vec![VocabularyItem {
        word: word.into(),
        meaning: "m".into(),
        pronunciation: pronunciation.into(),
        han_viet: String::new(),
        category: String::new(),
      }],
      grammar: vec![],
      quiz: vec![],
    }
  }

  #[test]
  fn converts_hanzi_and_keeps_other_chars() {
    assert_eq!(to_pinyin_diacritics("你好"), "nǐ hǎo");
    assert_eq!(to_pinyin_diacritics("你好 2025！"), "nǐ hǎo 2025！");
  }

  #[test]
  fn fills_only_blank_pronunciations_for_chinese_target() {
    let mut vn = lesson_with("謝謝", "");
    assert_eq!(fill_missing_pronunciation(&mut vn, Locale::Vn), 1);
    assert_eq!(vn.vocabulary[0].pronunciation, "xiè xiè");

    let mut kept = lesson_with("你好", "nǐ hǎo!");
    assert_eq!(fill_missing_pronunciation(&mut kept, Locale::Vn), 0);
    assert_eq!(kept.vocabulary[0].pronunciation, "nǐ hǎo!");

    let mut tw = lesson_with("Xin chào", "");
    assert_eq!(fill_missing_pronunciation(&mut tw, Locale::Tw), 0);
  }
}
