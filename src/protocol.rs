//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::builder::BuilderSnapshot;
use crate::domain::{ChatTurn, LessonContent, Locale, QuizItem};
use crate::speech::{SpeechEngine, Voice};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Lesson {
        locale: Locale,
        topic: String,
    },
    Speak {
        id: String,
        text: String,
        locale: Locale,
        #[serde(default)]
        engine: SpeechEngine,
    },
    StopSpeech,
    /// The client finished (or gave up on) playing `id`.
    PlaybackEnded {
        id: String,
    },
    /// Voices the client's local speech engine offers.
    Voices {
        voices: Vec<Voice>,
    },
    BuilderLoad {
        quiz: QuizItem,
    },
    BuilderSelect {
        token: usize,
    },
    BuilderDeselect {
        token: usize,
    },
    BuilderSubmit,
    BuilderReset,
    Tutor {
        #[serde(default)]
        history: Vec<ChatTurn>,
        message: String,
        locale: Locale,
    },
    Explain {
        text: String,
        locale: Locale,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Lesson {
        lesson: LessonContent,
    },
    LessonError {
        message: String,
        retryable: bool,
    },
    Audio {
        id: String,
        #[serde(rename = "sampleRate")]
        sample_rate: u32,
        channels: usize,
        #[serde(rename = "audioBase64")]
        audio_base64: String,
    },
    /// Ask the client's local engine to speak.
    SpeakLocal {
        id: String,
        text: String,
        lang: String,
        rate: f32,
        voice: Option<String>,
    },
    /// Stop the audio or local utterance for `id` right away.
    StopAudio {
        id: String,
    },
    Speaking {
        id: Option<String>,
    },
    Builder {
        state: BuilderSnapshot,
    },
    TutorReply {
        text: String,
    },
    Explanation {
        text: String,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct LocaleQuery {
    pub locale: Option<Locale>,
}

#[derive(Debug, Deserialize)]
pub struct LessonQuery {
    pub locale: Locale,
    pub topic: String,
}

#[derive(Deserialize)]
pub struct SpeechIn {
    pub text: String,
    pub locale: Locale,
}

#[derive(Deserialize)]
pub struct TutorIn {
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub locale: Locale,
}

#[derive(Deserialize)]
pub struct ExplainIn {
    pub text: String,
    pub locale: Locale,
}

#[derive(Serialize)]
pub struct TextOut {
    pub text: String,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub retryable: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
