//! Speech: text cleanup, remote audio (cached), local-engine utterances and the
//! single-flight dispatcher that owns the "currently speaking" id.
//!
//! Two strategies sit side by side:
//!   - remote: synthesize (or hit the audio cache) → base64 PCM16 → `AudioBuffer` → `AudioOutput`
//!   - local: build an `Utterance` (learner rate, best-effort voice) → `LocalSpeechEngine`
//!
//! Starting a new utterance cancels whatever is active. Failures degrade to "no audio".

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::AbortHandle};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{CacheStore, Namespace};
use crate::domain::{Locale, SpeechLang};
use crate::error::SpeechError;
use crate::gemini::SpeechSynthesizer;
use crate::util::{collapse_whitespace, is_cjk};

/// Remote synthesis output format.
pub const REMOTE_SAMPLE_RATE: u32 = 24_000;
pub const REMOTE_CHANNELS: usize = 1;

fn strip_bracketed(text: &str) -> String {
  const OPEN: [char; 2] = ['(', '（'];
  const CLOSE: [char; 2] = [')', '）'];
  let chars: Vec<char> = text.chars().collect();
  let mut out = String::with_capacity(text.len());
  let mut i = 0;
  while i < chars.len() {
    if OPEN.contains(&chars[i]) {
      if let Some(end) = chars[i + 1..].iter().position(|c| CLOSE.contains(c)) {
        i += end + 2;
        continue;
      }
    }
    out.push(chars[i]);
    i += 1;
  }
  out
}

/// Prepare text for synthesis:
///   1. drop parenthetical asides, ASCII or full-width `( … )` / `（ … ）`
///   2. collapse whitespace
///   3. Vietnamese target (TW learner): drop Han characters
///
/// An empty result means there is nothing to say.
pub fn clean_for_speech(text: &str, locale: Locale) -> String {
  let clean = collapse_whitespace(&strip_bracketed(text));
  match locale.target_speech() {
    SpeechLang::Vietnamese => collapse_whitespace(&clean.chars().filter(|c| !is_cjk(*c)).collect::<String>()),
    SpeechLang::Chinese => clean,
  }
}

/// Decoded, de-interleaved audio ready for playback.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
  pub sample_rate: u32,
  /// One sample vector per channel, values in [-1.0, 1.0].
  pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
  pub fn frames(&self) -> usize {
    self.channels.first().map_or(0, Vec::len)
  }

  pub fn duration_secs(&self) -> f32 {
    if self.sample_rate == 0 { 0.0 } else { self.frames() as f32 / self.sample_rate as f32 }
  }

  /// Re-encode as interleaved PCM16 little-endian, base64.
  pub fn to_pcm16_base64(&self) -> String {
    let mut bytes = Vec::with_capacity(self.frames() * self.channels.len() * 2);
    for i in 0..self.frames() {
      for ch in &self.channels {
        let v = (ch[i] * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
      }
    }
    base64::engine::general_purpose::STANDARD.encode(bytes)
  }
}

/// Interleaved PCM16 LE → per-channel f32. A trailing odd byte or partial frame is ignored.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, num_channels: usize) -> AudioBuffer {
  let num_channels = num_channels.max(1);
  let samples: Vec<i16> = bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect();
  let frames = samples.len() / num_channels;
  let channels = (0..num_channels)
    .map(|ch| (0..frames).map(|i| samples[i * num_channels + ch] as f32 / 32768.0).collect())
    .collect();
  AudioBuffer { sample_rate, channels }
}

pub fn decode_base64_pcm16(data: &str, sample_rate: u32, num_channels: usize) -> Option<AudioBuffer> {
  match base64::engine::general_purpose::STANDARD.decode(data) {
    Ok(bytes) => Some(decode_pcm16(&bytes, sample_rate, num_channels)),
    Err(e) => {
      error!(target: "speech", error = %e, "Failed to decode base64 audio");
      None
    }
  }
}

/// Remote strategy: audio cache in front of the synthesizer.
pub struct RemoteSpeech {
  synthesizer: Arc<dyn SpeechSynthesizer>,
  cache: CacheStore,
}

impl RemoteSpeech {
  pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, cache: CacheStore) -> Self {
    Self { synthesizer, cache }
  }

  /// Base64 PCM16 for `text`, from the audio namespace or a fresh synthesis (then cached).
  #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
  pub async fn audio_base64(&self, text: &str, locale: Locale) -> Option<String> {
    let clean = clean_for_speech(text, locale);
    if clean.is_empty() {
      warn!(target: "speech", "Audio generation skipped: text empty after cleaning");
      return None;
    }
    let key = format!("{}-{}", locale.code(), clean);
    if let Some(hit) = self.cache.get::<String>(Namespace::Audio, &key) {
      debug!(target: "speech", preview = %clean.chars().take(10).collect::<String>(), "Storage hit (audio)");
      return Some(hit);
    }
    let audio = self.synthesizer.synthesize_speech(&clean, locale).await?;
    self.cache.set(Namespace::Audio, &key, &audio);
    Some(audio)
  }

  pub async fn audio(&self, text: &str, locale: Locale) -> Option<AudioBuffer> {
    let data = self.audio_base64(text, locale).await?;
    let buffer = decode_base64_pcm16(&data, REMOTE_SAMPLE_RATE, REMOTE_CHANNELS)?;
    debug!(target: "speech", secs = buffer.duration_secs(), "Audio decoded");
    Some(buffer)
  }
}

/// A voice offered by a local speech engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Voice {
  pub name: String,
  pub lang: String,
}

/// What the local engine is asked to say.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Utterance {
  pub text: String,
  pub lang: &'static str,
  pub rate: f32,
  /// `None` means the engine's default voice.
  pub voice: Option<Voice>,
}

const PREFERRED_VOICE_VENDORS: [&str; 4] = ["Google", "Samantha", "Mei-Jia", "Microsoft"];

/// Best-effort voice choice: exact tag from a preferred vendor, then any exact tag,
/// then same language prefix (`vi`, `zh`). `None` falls back to the engine default.
pub fn pick_voice(voices: &[Voice], lang: SpeechLang) -> Option<Voice> {
  let tag = lang.tag();
  let prefix = tag.split('-').next().unwrap_or(tag);
  voices
    .iter()
    .find(|v| v.lang == tag && PREFERRED_VOICE_VENDORS.iter().any(|n| v.name.contains(n)))
    .or_else(|| voices.iter().find(|v| v.lang == tag))
    .or_else(|| voices.iter().find(|v| v.lang.split(['-', '_']).next() == Some(prefix)))
    .cloned()
}

pub fn utterance_for(text: &str, locale: Locale, voices: &[Voice]) -> Utterance {
  let lang = locale.target_speech();
  Utterance {
    text: clean_for_speech(text, locale),
    lang: lang.tag(),
    rate: lang.learner_rate(),
    voice: pick_voice(voices, lang),
  }
}

/// Plays decoded audio; resolves when playback ends.
#[async_trait]
pub trait AudioOutput: Send + Sync {
  async fn play(&self, id: &str, buffer: AudioBuffer) -> Result<(), SpeechError>;
  /// Stop playback of `id`; it may already be playing or not yet started.
  fn halt(&self, id: &str);
}

/// Platform speech engine; `speak` resolves on the engine's end/error event.
#[async_trait]
pub trait LocalSpeechEngine: Send + Sync {
  fn voices(&self) -> Vec<Voice>;
  async fn speak(&self, id: &str, utterance: Utterance) -> Result<(), SpeechError>;
  fn cancel(&self, id: &str);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechEngine {
  #[default]
  Remote,
  Local,
}

#[derive(Clone, Debug)]
pub struct SpeechRequest {
  pub id: String,
  pub text: String,
  pub locale: Locale,
}

#[derive(Default)]
struct Active {
  id: Option<String>,
  engine: SpeechEngine,
  ticket: u64,
  task: Option<AbortHandle>,
}

/// Single-flight playback. Owns the active id; consumers read it through
/// `speaking()` or `subscribe()`.
pub struct SpeechDispatch {
  remote: Arc<RemoteSpeech>,
  output: Arc<dyn AudioOutput>,
  engine: Arc<dyn LocalSpeechEngine>,
  active: Mutex<Active>,
  speaking: watch::Sender<Option<String>>,
}

impl SpeechDispatch {
  pub fn new(remote: Arc<RemoteSpeech>, output: Arc<dyn AudioOutput>, engine: Arc<dyn LocalSpeechEngine>) -> Arc<Self> {
    let (speaking, _) = watch::channel(None);
    Self::with_speaking(remote, output, engine, speaking)
  }

  /// Like `new`, but publishes the active id on a caller-owned channel, so outputs built
  /// before the dispatcher can hold a receiver. The active id is replaced before the previous
  /// playback is halted.
  pub fn with_speaking(
    remote: Arc<RemoteSpeech>,
    output: Arc<dyn AudioOutput>,
    engine: Arc<dyn LocalSpeechEngine>,
    speaking: watch::Sender<Option<String>>,
  ) -> Arc<Self> {
    Arc::new(Self { remote, output, engine, active: Mutex::new(Active::default()), speaking })
  }

  pub fn speaking(&self) -> Option<String> {
    self.speaking.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
    self.speaking.subscribe()
  }

  /// Start playback for `req`, cancelling any other active utterance.
  /// Returns false (no-op) when `req.id` is already the active one.
  pub fn speak(self: &Arc<Self>, req: SpeechRequest, engine: SpeechEngine) -> bool {
    let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
    if active.id.as_deref() == Some(req.id.as_str()) {
      debug!(target: "speech", id = %req.id, "Already speaking; ignoring");
      return false;
    }
    let prev = self.detach_locked(&mut active);

    active.ticket += 1;
    let ticket = active.ticket;
    active.id = Some(req.id.clone());
    active.engine = engine;
    self.speaking.send_replace(Some(req.id.clone()));
    self.release(prev);

    info!(target: "speech", id = %req.id, ?engine, text_len = req.text.len(), "Playback started");
    let this = Arc::clone(self);
    let handle = tokio::spawn(async move {
      if let Err(e) = this.play(&req, engine).await {
        warn!(target: "speech", id = %req.id, error = %e, "Playback failed");
      }
      this.finish(ticket);
    });
    active.task = Some(handle.abort_handle());
    true
  }

  /// Cancel the active utterance, if any.
  pub fn stop(&self) {
    let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
    let prev = self.detach_locked(&mut active);
    active.ticket += 1;
    self.speaking.send_replace(None);
    self.release(prev);
  }

  fn detach_locked(&self, active: &mut Active) -> Option<(String, SpeechEngine)> {
    if let Some(task) = active.task.take() {
      task.abort();
    }
    active.id.take().map(|id| (id, active.engine))
  }

  /// Tell whichever side was playing `prev` to stop it.
  fn release(&self, prev: Option<(String, SpeechEngine)>) {
    let Some((id, engine)) = prev else { return };
    debug!(target: "speech", %id, ?engine, "Cancelling active playback");
    match engine {
      SpeechEngine::Remote => self.output.halt(&id),
      SpeechEngine::Local => self.engine.cancel(&id),
    }
  }

  fn finish(&self, ticket: u64) {
    let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
    if active.ticket == ticket && active.id.is_some() {
      active.id = None;
      active.task = None;
      self.speaking.send_replace(None);
    }
  }

  async fn play(&self, req: &SpeechRequest, engine: SpeechEngine) -> Result<(), SpeechError> {
    match engine {
      SpeechEngine::Remote => match self.remote.audio(&req.text, req.locale).await {
        Some(buffer) => self.output.play(&req.id, buffer).await,
        None => {
          debug!(target: "speech", id = %req.id, "No audio produced");
          Ok(())
        }
      },
      SpeechEngine::Local => {
        let utterance = utterance_for(&req.text, req.locale, &self.engine.voices());
        if utterance.text.is_empty() {
          return Ok(());
        }
        self.engine.speak(&req.id, utterance).await
      }
    }
  }
}
