//! Lesson resolution: seed catalog → lesson cache → generation (with write-through).
//!
//! Lookup tiers are independent `Tier` impls queried in order; they only ever miss, never fail.
//! Generation is the last step and the only one that can fail the call.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::cache::{CacheStore, Namespace};
use crate::domain::{lesson_key, LessonContent, Locale};
use crate::error::ResolutionError;
use crate::gemini::LessonGenerator;
use crate::pinyin::fill_missing_pronunciation;
use crate::seeds;
use crate::util::validate_input;

/// One lookup layer of the resolution chain.
pub trait Tier: Send + Sync {
  fn name(&self) -> &'static str;
  fn try_get(&self, locale: Locale, topic: &str) -> Option<LessonContent>;
}

/// Built-in lessons; exact key match only.
pub struct SeedTier;

impl Tier for SeedTier {
  fn name(&self) -> &'static str {
    "Static"
  }

  fn try_get(&self, locale: Locale, topic: &str) -> Option<LessonContent> {
    seeds::lookup(locale, topic)
  }
}

/// Previously generated lessons. Entries written by older builds are re-sanitized on read.
pub struct CacheTier {
  cache: CacheStore,
}

impl CacheTier {
  pub fn new(cache: CacheStore) -> Self {
    Self { cache }
  }
}

impl Tier for CacheTier {
  fn name(&self) -> &'static str {
    "Storage"
  }

  fn try_get(&self, locale: Locale, topic: &str) -> Option<LessonContent> {
    let mut lesson: LessonContent = self.cache.get(Namespace::Lessons, &lesson_key(locale, topic))?;
    lesson.sanitize_quizzes(&mut rand::thread_rng());
    fill_missing_pronunciation(&mut lesson, locale);
    Some(lesson)
  }
}

pub struct LessonResolver {
  tiers: Vec<Box<dyn Tier>>,
  cache: CacheStore,
  generator: Arc<dyn LessonGenerator>,
  max_input_chars: usize,
}

impl LessonResolver {
  /// Standard chain: seeds, then the lesson cache.
  pub fn new(cache: CacheStore, generator: Arc<dyn LessonGenerator>, max_input_chars: usize) -> Self {
    let tiers: Vec<Box<dyn Tier>> = vec![Box::new(SeedTier), Box::new(CacheTier::new(cache.clone()))];
    Self::with_tiers(tiers, cache, generator, max_input_chars)
  }

  pub fn with_tiers(
    tiers: Vec<Box<dyn Tier>>,
    cache: CacheStore,
    generator: Arc<dyn LessonGenerator>,
    max_input_chars: usize,
  ) -> Self {
    Self { tiers, cache, generator, max_input_chars }
  }

  /// Concurrent calls for the same uncached key may both generate; the later write wins.
  #[instrument(level = "info", skip(self, topic), fields(%locale, topic_len = topic.len()))]
  pub async fn resolve(&self, topic: &str, locale: Locale) -> Result<LessonContent, ResolutionError> {
    validate_input(topic, self.max_input_chars)?;
    let topic = topic.trim();
    let key = lesson_key(locale, topic);

    for tier in &self.tiers {
      if let Some(lesson) = tier.try_get(locale, topic) {
        info!(target: "lesson", tier = tier.name(), %key, "{} hit", tier.name());
        return Ok(lesson);
      }
    }

    info!(target: "lesson", %key, "API call");
    let lesson = self.generator.generate(topic, locale).await?;
    self.cache.set(Namespace::Lessons, &key, &lesson);
    Ok(lesson)
  }
}
