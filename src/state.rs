//! Application state: settings, the lesson cache, the resolver chain and the remote providers.
//!
//! This module owns:
//!   - the on-disk cache store (shared by lessons and audio)
//!   - the lesson resolver (seed → cache → generation)
//!   - the remote speech path (audio cache → synthesis)
//!   - the tutor provider
//!
//! Without GEMINI_API_KEY every provider is `Offline`: seeds and cached content still work,
//! generation fails with a retryable error, speech and tutor degrade softly.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::cache::CacheStore;
use crate::config::{load_agent_config_from_env, AgentConfig, Limits, Settings};
use crate::gemini::{Gemini, LessonGenerator, Offline, SpeechSynthesizer, TutorModel};
use crate::resolver::LessonResolver;
use crate::speech::RemoteSpeech;

pub struct AppState {
    pub limits: Limits,
    pub resolver: LessonResolver,
    pub remote_speech: Arc<RemoteSpeech>,
    pub tutor: Arc<dyn TutorModel>,
}

impl AppState {
    /// Build state from env: load config, open the cache, init Gemini.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let settings = Settings::from_env();
        let cfg = load_agent_config_from_env().unwrap_or_default();
        let cache = CacheStore::on_disk(&settings.cache_dir, settings.cache_quota_bytes);
        info!(
            target: "vietlearn",
            cache_dir = %settings.cache_dir.display(),
            quota_bytes = settings.cache_quota_bytes,
            "Cache store opened"
        );

        let gemini = Gemini::from_settings(
            &settings,
            cfg.prompts.clone(),
            cfg.limits.max_input_chars,
            cfg.limits.thinking_budget,
        );
        match gemini {
            Some(g) => {
                info!(
                    target: "vietlearn",
                    base_url = %g.base_url,
                    text_model = %g.text_model,
                    tts_model = %g.tts_model,
                    voice = %g.voice,
                    "Gemini enabled."
                );
                let g = Arc::new(g);
                Self::from_parts(cfg, cache, g.clone(), g.clone(), g)
            }
            None => {
                warn!(target: "vietlearn", "Gemini disabled (no GEMINI_API_KEY). Serving seeded and cached lessons only.");
                let offline = Arc::new(Offline);
                Self::from_parts(cfg, cache, offline.clone(), offline.clone(), offline)
            }
        }
    }

    pub fn from_parts(
        cfg: AgentConfig,
        cache: CacheStore,
        generator: Arc<dyn LessonGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        tutor: Arc<dyn TutorModel>,
    ) -> Self {
        let resolver = LessonResolver::new(cache.clone(), generator, cfg.limits.max_input_chars);
        let remote_speech = Arc::new(RemoteSpeech::new(synthesizer, cache));
        Self { limits: cfg.limits, resolver, remote_speech, tutor }
    }
}
