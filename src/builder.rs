//! Sentence reconstruction exercise: the learner rebuilds `correct_sentence` from a token pool.
//!
//! Tokens are identified by their position in the quiz's `scrambled_words`, so duplicate words
//! ("là", "là") are selectable independently. States: idle → (submit) → correct | incorrect.
//! Any edit after `incorrect` returns to idle; `correct` freezes edits until `reset`/`load`.

use serde::{Deserialize, Serialize};

use crate::domain::{normalize_sentence, QuizItem};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderStatus {
  #[default]
  Idle,
  Correct,
  Incorrect,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Token {
  pub id: usize,
  pub text: String,
}

/// What the client renders.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuilderSnapshot {
  pub question: String,
  pub status: BuilderStatus,
  pub assembly: Vec<Token>,
  pub pool: Vec<Token>,
}

#[derive(Clone, Debug, Default)]
pub struct SentenceBuilder {
  question: String,
  target: String,
  tokens: Vec<Token>,
  assembly: Vec<usize>,
  status: BuilderStatus,
}

fn comparable(s: &str) -> String {
  normalize_sentence(s).split_whitespace().collect::<Vec<_>>().join(" ")
}

impl SentenceBuilder {
  pub fn new(quiz: &QuizItem) -> Self {
    let mut builder = Self::default();
    builder.load(quiz);
    builder
  }

  /// Swap in a new quiz item: idle, empty assembly, pool rebuilt.
  pub fn load(&mut self, quiz: &QuizItem) {
    self.question = quiz.question.clone();
    self.target = quiz.correct_sentence.clone();
    self.tokens = quiz
      .scrambled_words
      .iter()
      .enumerate()
      .map(|(id, text)| Token { id, text: text.clone() })
      .collect();
    self.reset();
  }

  pub fn reset(&mut self) {
    self.assembly.clear();
    self.status = BuilderStatus::Idle;
  }

  pub fn status(&self) -> BuilderStatus {
    self.status
  }

  fn in_pool(&self, id: usize) -> bool {
    id < self.tokens.len() && !self.assembly.contains(&id)
  }

  /// Move token `id` from the pool to the end of the assembly. Returns whether anything changed.
  pub fn select(&mut self, id: usize) -> bool {
    if self.status == BuilderStatus::Correct || !self.in_pool(id) {
      return false;
    }
    self.assembly.push(id);
    self.status = BuilderStatus::Idle;
    true
  }

  /// Move token `id` back to the pool; remaining assembly order is kept.
  pub fn deselect(&mut self, id: usize) -> bool {
    if self.status == BuilderStatus::Correct {
      return false;
    }
    let Some(pos) = self.assembly.iter().position(|&t| t == id) else { return false };
    self.assembly.remove(pos);
    self.status = BuilderStatus::Idle;
    true
  }

  /// Check the assembly against the target, punctuation- and case-insensitively.
  /// An empty assembly is not checked.
  pub fn submit(&mut self) -> BuilderStatus {
    if self.status == BuilderStatus::Correct || self.assembly.is_empty() {
      return self.status;
    }
    let attempt = self.assembly.iter().map(|&id| self.tokens[id].text.as_str()).collect::<Vec<_>>().join(" ");
    self.status = if comparable(&attempt) == comparable(&self.target) {
      BuilderStatus::Correct
    } else {
      BuilderStatus::Incorrect
    };
    self.status
  }

  pub fn assembly(&self) -> Vec<Token> {
    self.assembly.iter().map(|&id| self.tokens[id].clone()).collect()
  }

  /// Tokens not in the assembly, in pool order.
  pub fn pool(&self) -> Vec<Token> {
    self.tokens.iter().filter(|t| !self.assembly.contains(&t.id)).cloned().collect()
  }

  pub fn snapshot(&self) -> BuilderSnapshot {
    BuilderSnapshot {
      question: self.question.clone(),
      status: self.status,
      assembly: self.assembly(),
      pool: self.pool(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn quiz(sentence: &str, pool: &[&str]) -> QuizItem {
    QuizItem {
      question: "Sắp xếp câu".into(),
      correct_sentence: sentence.into(),
      scrambled_words: pool.iter().map(|s| s.to_string()).collect(),
      explanation: String::new(),
    }
  }

  /// Select tokens by text, first unselected occurrence each time.
  fn pick(b: &mut SentenceBuilder, words: &[&str]) {
    for w in words {
      let id = b.pool().iter().find(|t| t.text == *w).map(|t| t.id).unwrap();
      assert!(b.select(id));
    }
  }

  #[test]
  fn sentence_order_is_correct_and_punctuation_insensitive() {
    let mut b = SentenceBuilder::new(&quiz("Tôi là Lan.", &["Lan", "bạn", "Tôi", "là"]));
    pick(&mut b, &["Tôi", "là", "Lan"]);
    assert_eq!(b.submit(), BuilderStatus::Correct);
  }

  #[test]
  fn wrong_order_is_incorrect_and_edit_returns_to_idle() {
    let mut b = SentenceBuilder::new(&quiz("Tôi là Lan", &["Lan", "bạn", "Tôi", "là"]));
    pick(&mut b, &["Lan", "là", "Tôi"]);
    assert_eq!(b.submit(), BuilderStatus::Incorrect);
    let last = b.assembly().last().unwrap().id;
    assert!(b.deselect(last));
    assert_eq!(b.status(), BuilderStatus::Idle);

    pick(&mut b, &["bạn"]);
    assert_eq!(b.submit(), BuilderStatus::Incorrect);
    pick(&mut b, &["Tôi"]);
    assert_eq!(b.status(), BuilderStatus::Idle);
  }

  #[test]
  fn correct_freezes_edits_until_reset() {
    let mut b = SentenceBuilder::new(&quiz("Tôi là Lan", &["Lan", "bạn", "Tôi", "là"]));
    pick(&mut b, &["Tôi", "là", "Lan"]);
    assert_eq!(b.submit(), BuilderStatus::Correct);
    let before = b.snapshot();
    let spare = b.pool()[0].id;
    assert!(!b.select(spare));
    assert!(!b.deselect(before.assembly[0].id));
    assert_eq!(b.snapshot(), before);

    b.reset();
    assert_eq!(b.status(), BuilderStatus::Idle);
    assert!(b.assembly().is_empty());
  }

  #[test]
  fn reset_is_idempotent() {
    let mut b = SentenceBuilder::new(&quiz("Tôi là Lan", &["Lan", "bạn", "Tôi", "là"]));
    pick(&mut b, &["Lan", "Tôi"]);
    b.submit();
    b.reset();
    let once = b.snapshot();
    b.reset();
    assert_eq!(b.snapshot(), once);
    assert_eq!(once.pool.len(), 4);
  }

  #[test]
  fn duplicate_words_are_tracked_by_identity() {
    let mut b = SentenceBuilder::new(&quiz("Đây là nhà là", &["là", "nhà", "là", "Đây", "không"]));
    assert!(b.select(0));
    assert!(b.select(2));
    assert!(!b.select(0));
    assert_eq!(b.pool().iter().filter(|t| t.text == "là").count(), 0);

    assert!(b.deselect(0));
    let pool: Vec<usize> = b.pool().iter().map(|t| t.id).collect();
    assert!(pool.contains(&0));
    assert!(!pool.contains(&2));
    assert_eq!(b.assembly(), vec![Token { id: 2, text: "là".into() }]);
  }

  #[test]
  fn deselect_keeps_remaining_order() {
    let mut b = SentenceBuilder::new(&quiz("a b c", &["a", "b", "c", "d"]));
    for id in [0, 1, 2] {
      b.select(id);
    }
    b.deselect(1);
    assert_eq!(b.assembly().iter().map(|t| t.id).collect::<Vec<_>>(), vec![0, 2]);
    b.select(1);
    assert_eq!(b.assembly().iter().map(|t| t.id).collect::<Vec<_>>(), vec![0, 2, 1]);
  }

  #[test]
  fn empty_submit_and_unknown_tokens_are_ignored() {
    let mut b = SentenceBuilder::new(&quiz("a b", &["a", "b", "c"]));
    assert_eq!(b.submit(), BuilderStatus::Idle);
    assert!(!b.select(99));
    assert!(!b.deselect(0));
  }

  #[test]
  fn loading_a_new_quiz_rebuilds_the_pool() {
    let mut b = SentenceBuilder::new(&quiz("a b", &["a", "b", "c"]));
    b.select(0);
    b.submit();
    b.load(&quiz("你 好", &["好", "你", "嗎"]));
    let snap = b.snapshot();
    assert_eq!(snap.status, BuilderStatus::Idle);
    assert!(snap.assembly.is_empty());
    assert_eq!(snap.pool.iter().map(|t| t.text.as_str()).collect::<Vec<_>>(), vec!["好", "你", "嗎"]);
  }
}
