//! WebSocket upgrade + session loop.
//!
//! Each connection gets its own session: a speech dispatcher that plays through the client,
//! a sentence builder and a liveness flag. Replies go through one outbound channel so spawned
//! work (lesson generation, tutor calls, playback) can push messages while the loop keeps reading.

use std::{
  collections::HashMap,
  future::Future,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};
use async_trait::async_trait;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::{
  sync::{mpsc, oneshot, watch},
  task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::builder::SentenceBuilder;
use crate::error::SpeechError;
use crate::logic::{explain, load_lesson, tutor_reply};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::speech::{AudioBuffer, AudioOutput, LocalSpeechEngine, SpeechDispatch, SpeechRequest, Utterance, Voice};
use crate::state::AppState;
use crate::util::{trunc_for_log, validate_input};

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "vietlearn", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
  let session_id = Uuid::new_v4();
  info!(target: "vietlearn", %session_id, "WebSocket connected");
  let (mut sink, mut stream) = socket.split();
  let (tx, mut rx) = mpsc::unbounded_channel::<ServerWsMessage>();

  let writer = tokio::spawn(async move {
    while let Some(msg) = rx.recv().await {
      let out = serde_json::to_string(&msg).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
      });
      if let Err(e) = sink.send(Message::Text(out)).await {
        error!(target: "vietlearn", error = %e, "WS send error");
        break;
      }
    }
  });

  let mut session = Session::new(state, tx);
  while let Some(Ok(msg)) = stream.next().await {
    match msg {
      Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "vietlearn", "WS received: {}", trunc_for_log(&txt, 200));
          session.handle(incoming);
        }
        Err(e) => session.send(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }),
      },
      Message::Close(_) => break,
      _ => {}
    }
  }

  session.close();
  writer.abort();
  info!(target: "vietlearn", %session_id, "WebSocket disconnected");
}

/// Plays through the client: audio and local-engine requests are sent over the socket and
/// complete when the client reports `playback_ended` for that id. Cancelling an id sends
/// `stop_audio` for it.
///
/// `active` mirrors the dispatcher's active id. A request is only sent while its id is still
/// active, and the check and the send happen under the `pending` lock, as does `stop_audio`.
/// A superseded request therefore never reaches the client after its stop.
struct ClientPlayback {
  out: mpsc::UnboundedSender<ServerWsMessage>,
  active: watch::Receiver<Option<String>>,
  pending: Mutex<HashMap<String, oneshot::Sender<()>>>,
  voices: Mutex<Vec<Voice>>,
}

impl ClientPlayback {
  fn new(out: mpsc::UnboundedSender<ServerWsMessage>, active: watch::Receiver<Option<String>>) -> Self {
    Self { out, active, pending: Mutex::default(), voices: Mutex::default() }
  }

  async fn until_ended(&self, id: &str, msg: ServerWsMessage) -> Result<(), SpeechError> {
    let (done, ended) = oneshot::channel();
    {
      let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
      if self.active.borrow().as_deref() != Some(id) {
        debug!(target: "speech", %id, "Playback superseded before reaching the client");
        return Err(SpeechError::Interrupted);
      }
      if self.out.send(msg).is_err() {
        return Err(SpeechError::Output("session closed".into()));
      }
      pending.insert(id.to_string(), done);
    }
    ended.await.map_err(|_| SpeechError::Interrupted)
  }

  fn ended(&self, id: &str) {
    if let Some(done) = self.pending.lock().unwrap_or_else(|p| p.into_inner()).remove(id) {
      let _ = done.send(());
    }
  }

  fn set_voices(&self, voices: Vec<Voice>) {
    *self.voices.lock().unwrap_or_else(|p| p.into_inner()) = voices;
  }

  fn stop(&self, id: &str) {
    let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
    pending.remove(id);
    let _ = self.out.send(ServerWsMessage::StopAudio { id: id.to_string() });
  }
}

#[async_trait]
impl AudioOutput for ClientPlayback {
  async fn play(&self, id: &str, buffer: AudioBuffer) -> Result<(), SpeechError> {
    let msg = ServerWsMessage::Audio {
      id: id.to_string(),
      sample_rate: buffer.sample_rate,
      channels: buffer.channels.len(),
      audio_base64: buffer.to_pcm16_base64(),
    };
    self.until_ended(id, msg).await
  }

  fn halt(&self, id: &str) {
    self.stop(id);
  }
}

#[async_trait]
impl LocalSpeechEngine for ClientPlayback {
  fn voices(&self) -> Vec<Voice> {
    self.voices.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  async fn speak(&self, id: &str, utterance: Utterance) -> Result<(), SpeechError> {
    let msg = ServerWsMessage::SpeakLocal {
      id: id.to_string(),
      text: utterance.text,
      lang: utterance.lang.to_string(),
      rate: utterance.rate,
      voice: utterance.voice.map(|v| v.name),
    };
    self.until_ended(id, msg).await
  }

  fn cancel(&self, id: &str) {
    self.stop(id);
  }
}

struct Session {
  state: Arc<AppState>,
  out: mpsc::UnboundedSender<ServerWsMessage>,
  alive: Arc<AtomicBool>,
  playback: Arc<ClientPlayback>,
  speech: Arc<SpeechDispatch>,
  speaking_fwd: JoinHandle<()>,
  builder: Option<SentenceBuilder>,
}

impl Session {
  fn new(state: Arc<AppState>, out: mpsc::UnboundedSender<ServerWsMessage>) -> Self {
    let (active_tx, active_rx) = watch::channel(None);
    let playback = Arc::new(ClientPlayback::new(out.clone(), active_rx));
    let speech =
      SpeechDispatch::with_speaking(state.remote_speech.clone(), playback.clone(), playback.clone(), active_tx);

    let mut speaking = speech.subscribe();
    let fwd = out.clone();
    let speaking_fwd = tokio::spawn(async move {
      while speaking.changed().await.is_ok() {
        let id = speaking.borrow_and_update().clone();
        if fwd.send(ServerWsMessage::Speaking { id }).is_err() {
          break;
        }
      }
    });

    Self {
      state,
      out,
      alive: Arc::new(AtomicBool::new(true)),
      playback,
      speech,
      speaking_fwd,
      builder: None,
    }
  }

  fn send(&self, msg: ServerWsMessage) {
    let _ = self.out.send(msg);
  }

  /// Run a suspended call off the read loop; its result is dropped if the session closed meanwhile.
  fn spawn_guarded<F>(&self, work: F)
  where
    F: Future<Output = ServerWsMessage> + Send + 'static,
  {
    let alive = self.alive.clone();
    let out = self.out.clone();
    tokio::spawn(async move {
      let msg = work.await;
      if alive.load(Ordering::Acquire) {
        let _ = out.send(msg);
      } else {
        debug!(target: "vietlearn", "Session closed; discarding late result");
      }
    });
  }

  fn builder_update(&mut self, edit: impl FnOnce(&mut SentenceBuilder)) {
    match self.builder.as_mut() {
      Some(b) => {
        edit(b);
        let state = b.snapshot();
        self.send(ServerWsMessage::Builder { state });
      }
      None => self.send(ServerWsMessage::Error { message: "No quiz loaded".into() }),
    }
  }

  fn handle(&mut self, msg: ClientWsMessage) {
    match msg {
      ClientWsMessage::Ping => self.send(ServerWsMessage::Pong),

      ClientWsMessage::Lesson { locale, topic } => {
        let state = self.state.clone();
        self.spawn_guarded(async move {
          match load_lesson(&state, &topic, locale).await {
            Ok(lesson) => {
              info!(target: "lesson", %locale, title = %lesson.title, "WS lesson served");
              ServerWsMessage::Lesson { lesson }
            }
            Err(e) => ServerWsMessage::LessonError { message: e.to_string(), retryable: e.is_retryable() },
          }
        });
      }

      ClientWsMessage::Speak { id, text, locale, engine } => {
        if let Err(e) = validate_input(&text, self.state.limits.max_input_chars) {
          warn!(target: "speech", %id, error = %e, "Rejected speak request");
          self.send(ServerWsMessage::Error { message: e.to_string() });
          return;
        }
        self.speech.speak(SpeechRequest { id, text, locale }, engine);
      }

      ClientWsMessage::StopSpeech => self.speech.stop(),

      ClientWsMessage::PlaybackEnded { id } => self.playback.ended(&id),

      ClientWsMessage::Voices { voices } => {
        debug!(target: "speech", count = voices.len(), "Client voices updated");
        self.playback.set_voices(voices);
      }

      ClientWsMessage::BuilderLoad { quiz } => {
        let quiz = if quiz.is_playable() { Some(quiz) } else { quiz.repair(&mut rand::thread_rng()) };
        match quiz {
          Some(quiz) => {
            self.builder = Some(SentenceBuilder::new(&quiz));
            self.builder_update(|_| {});
          }
          None => {
            warn!(target: "vietlearn", "Rejected unplayable quiz");
            self.send(ServerWsMessage::Error { message: "Quiz cannot be played".into() });
          }
        }
      }
      ClientWsMessage::BuilderSelect { token } => self.builder_update(|b| {
        b.select(token);
      }),
      ClientWsMessage::BuilderDeselect { token } => self.builder_update(|b| {
        b.deselect(token);
      }),
      ClientWsMessage::BuilderSubmit => self.builder_update(|b| {
        b.submit();
      }),
      ClientWsMessage::BuilderReset => self.builder_update(SentenceBuilder::reset),

      ClientWsMessage::Tutor { history, message, locale } => {
        let state = self.state.clone();
        self.spawn_guarded(async move {
          match tutor_reply(&state, &history, &message, locale).await {
            Ok(text) => ServerWsMessage::TutorReply { text },
            Err(e) => ServerWsMessage::Error { message: e.to_string() },
          }
        });
      }

      ClientWsMessage::Explain { text, locale } => {
        let state = self.state.clone();
        self.spawn_guarded(async move {
          match explain(&state, &text, locale).await {
            Ok(text) => ServerWsMessage::Explanation { text },
            Err(e) => ServerWsMessage::Error { message: e.to_string() },
          }
        });
      }
    }
  }

  /// Mark the session inert and stop any playback.
  fn close(&mut self) {
    self.alive.store(false, Ordering::Release);
    self.speech.stop();
    self.speaking_fwd.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builder::BuilderStatus;
  use crate::domain::{Locale, QuizItem};
  use crate::logic::tests::{state_with, Scripted};
  use crate::speech::SpeechEngine;

  fn session(provider: Scripted) -> (Session, mpsc::UnboundedReceiver<ServerWsMessage>) {
    let (_, state) = state_with(provider);
    let (tx, rx) = mpsc::unbounded_channel();
    (Session::new(Arc::new(state), tx), rx)
  }

  async fn settle() {
    for _ in 0..50 {
      tokio::task::yield_now().await;
    }
  }

  fn speak(id: &str, engine: SpeechEngine) -> ClientWsMessage {
    ClientWsMessage::Speak { id: id.into(), text: "Xin chào".into(), locale: Locale::Tw, engine }
  }

  fn playback_events(rx: &mut mpsc::UnboundedReceiver<ServerWsMessage>) -> Vec<String> {
    let mut seen = Vec::new();
    while let Ok(msg) = rx.try_recv() {
      match msg {
        ServerWsMessage::Audio { id, .. } => seen.push(format!("audio:{}", id)),
        ServerWsMessage::SpeakLocal { id, .. } => seen.push(format!("local:{}", id)),
        ServerWsMessage::StopAudio { id } => seen.push(format!("stop:{}", id)),
        _ => {}
      }
    }
    seen
  }

  async fn next_non_speaking(rx: &mut mpsc::UnboundedReceiver<ServerWsMessage>) -> ServerWsMessage {
    loop {
      match rx.recv().await.unwrap() {
        ServerWsMessage::Speaking { .. } => continue,
        other => return other,
      }
    }
  }

  #[tokio::test]
  async fn builder_round_trip_over_the_session() {
    let (mut s, mut rx) = session(Scripted::default());
    let quiz = QuizItem {
      question: "排列".into(),
      correct_sentence: "Tôi là Lan.".into(),
      scrambled_words: vec!["là".into(), "Lan".into(), "Tôi".into(), "không".into()],
      explanation: String::new(),
    };
    s.handle(ClientWsMessage::BuilderLoad { quiz });
    for token in [2, 0, 1] {
      s.handle(ClientWsMessage::BuilderSelect { token });
    }
    s.handle(ClientWsMessage::BuilderSubmit);

    let mut last = None;
    for _ in 0..5 {
      if let ServerWsMessage::Builder { state } = rx.recv().await.unwrap() {
        last = Some(state);
      }
    }
    let state = last.unwrap();
    assert_eq!(state.status, BuilderStatus::Correct);
    assert_eq!(state.pool.len(), 1);
  }

  #[tokio::test]
  async fn unsolvable_quiz_is_rejected_and_keeps_the_loaded_one() {
    let (mut s, mut rx) = session(Scripted::default());
    s.handle(ClientWsMessage::BuilderLoad {
      quiz: QuizItem {
        question: "排列".into(),
        correct_sentence: "Chào em".into(),
        scrambled_words: vec!["em".into(), "Chào".into(), "anh".into()],
        explanation: String::new(),
      },
    });
    assert!(matches!(rx.recv().await.unwrap(), ServerWsMessage::Builder { .. }));

    s.handle(ClientWsMessage::BuilderLoad {
      quiz: QuizItem {
        question: "排列".into(),
        correct_sentence: "Tôi là Lan".into(),
        scrambled_words: vec!["Tôi".into()],
        explanation: String::new(),
      },
    });
    match rx.recv().await.unwrap() {
      ServerWsMessage::Error { message } => assert_eq!(message, "Quiz cannot be played"),
      other => panic!("unexpected {:?}", other),
    }
    assert_eq!(s.builder.as_ref().map(|b| b.snapshot().question), Some("排列".to_string()));
    assert_eq!(s.builder.as_ref().map(|b| b.snapshot().pool.len()), Some(3));
  }

  #[tokio::test]
  async fn quiz_missing_a_word_is_repaired_on_load() {
    let (mut s, mut rx) = session(Scripted::default());
    s.handle(ClientWsMessage::BuilderLoad {
      quiz: QuizItem {
        question: "排列".into(),
        correct_sentence: "Tôi là Lan".into(),
        scrambled_words: vec!["Lan".into(), "không".into(), "Tôi".into()],
        explanation: String::new(),
      },
    });
    let ServerWsMessage::Builder { state } = rx.recv().await.unwrap() else { panic!("expected builder") };
    let mut words: Vec<_> = state.pool.iter().map(|t| t.text.as_str()).collect();
    words.sort_unstable();
    assert_eq!(words, vec!["Lan", "Tôi", "không", "là"]);
    assert_eq!(state.status, BuilderStatus::Idle);
  }

  #[tokio::test]
  async fn builder_edit_without_quiz_is_an_error() {
    let (mut s, mut rx) = session(Scripted::default());
    s.handle(ClientWsMessage::BuilderSubmit);
    assert!(matches!(rx.recv().await.unwrap(), ServerWsMessage::Error { .. }));
  }

  #[tokio::test]
  async fn lesson_failure_is_reported_as_retryable() {
    let (mut s, mut rx) = session(Scripted::default());
    s.handle(ClientWsMessage::Lesson { locale: Locale::Tw, topic: "Mua sắm".into() });
    match next_non_speaking(&mut rx).await {
      ServerWsMessage::LessonError { retryable, .. } => assert!(retryable),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test]
  async fn closed_session_discards_late_results() {
    let (mut s, mut rx) = session(Scripted::default());
    s.close();
    s.handle(ClientWsMessage::Lesson { locale: Locale::Vn, topic: "Xin Chào (你好)".into() });
    for _ in 0..20 {
      tokio::task::yield_now().await;
    }
    while let Ok(msg) = rx.try_recv() {
      assert!(!matches!(msg, ServerWsMessage::Lesson { .. }));
    }
  }

  #[tokio::test]
  async fn remote_playback_completes_on_playback_ended() {
    let (mut s, mut rx) = session(Scripted { audio: Some("AAABAA==".into()), ..Default::default() });
    s.handle(ClientWsMessage::Speak {
      id: "line-1".into(),
      text: "Xin chào".into(),
      locale: Locale::Tw,
      engine: SpeechEngine::Remote,
    });

    match next_non_speaking(&mut rx).await {
      ServerWsMessage::Audio { id, sample_rate, channels, audio_base64 } => {
        assert_eq!(id, "line-1");
        assert_eq!((sample_rate, channels), (24_000, 1));
        assert_eq!(audio_base64, "AAABAA==");
      }
      other => panic!("unexpected {:?}", other),
    }
    assert_eq!(s.speech.speaking().as_deref(), Some("line-1"));

    s.handle(ClientWsMessage::PlaybackEnded { id: "line-1".into() });
    for _ in 0..20 {
      tokio::task::yield_now().await;
    }
    assert_eq!(s.speech.speaking(), None);
  }

  #[tokio::test]
  async fn preempted_playback_is_stopped_before_the_next_starts() {
    let (mut s, mut rx) = session(Scripted { audio: Some("AAABAA==".into()), ..Default::default() });
    s.handle(speak("a", SpeechEngine::Remote));
    settle().await;
    s.handle(speak("b", SpeechEngine::Remote));
    settle().await;
    assert_eq!(playback_events(&mut rx), vec!["audio:a", "stop:a", "audio:b"]);

    s.handle(ClientWsMessage::StopSpeech);
    settle().await;
    assert_eq!(playback_events(&mut rx), vec!["stop:b"]);
    assert_eq!(s.speech.speaking(), None);
  }

  #[tokio::test]
  async fn local_utterance_is_stopped_when_cancelled() {
    let (mut s, mut rx) = session(Scripted::default());
    s.handle(speak("v-1", SpeechEngine::Local));
    settle().await;
    s.close();
    assert_eq!(playback_events(&mut rx), vec!["local:v-1", "stop:v-1"]);
  }

  #[tokio::test]
  async fn superseded_playback_is_never_sent() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_active_tx, active_rx) = watch::channel(Some("b".to_string()));
    let playback = ClientPlayback::new(tx, active_rx);
    let buffer = AudioBuffer { sample_rate: 24_000, channels: vec![vec![0.0, 0.5]] };

    let res = playback.play("a", buffer).await;
    assert!(matches!(res, Err(SpeechError::Interrupted)));
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn local_engine_request_carries_voice_and_rate() {
    let (mut s, mut rx) = session(Scripted::default());
    s.handle(ClientWsMessage::Voices { voices: vec![Voice { name: "Mei-Jia".into(), lang: "zh-TW".into() }] });
    s.handle(ClientWsMessage::Speak {
      id: "v-3".into(),
      text: "你好（nǐ hǎo）".into(),
      locale: Locale::Vn,
      engine: SpeechEngine::Local,
    });
    match next_non_speaking(&mut rx).await {
      ServerWsMessage::SpeakLocal { text, lang, rate, voice, .. } => {
        assert_eq!(text, "你好");
        assert_eq!(lang, "zh-TW");
        assert_eq!(rate, 0.9);
        assert_eq!(voice.as_deref(), Some("Mei-Jia"));
      }
      other => panic!("unexpected {:?}", other),
    }
  }
}
