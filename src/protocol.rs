//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{
    AchievementDef, Broadcast, CategoryStats, HazardCategory, Language, Recommendations, Scenario,
};
use crate::session::{GamePhase, GameSession};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartGame {
        category: HazardCategory,
        #[serde(default, rename = "timerSeconds")]
        timer_seconds: Option<u32>,
    },
    SubmitAnswer {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "choiceIndex")]
        choice_index: usize,
        #[serde(default, rename = "timeRemaining")]
        time_remaining: Option<u16>,
    },
    TimeExpired {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    NextQuestion {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    EndGame {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    RestartGame {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    LeaveGame {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    CheckBroadcast,
    ChatMessage {
        #[serde(rename = "contactId")]
        contact_id: String,
        history: String,
    },
    GetRecommendations,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    GameStarted {
        session: SessionOut,
    },
    AnswerResult {
        #[serde(rename = "sessionId")]
        session_id: String,
        result: AnswerOut,
    },
    QuestionAdvanced {
        session: SessionOut,
    },
    GameOver {
        #[serde(rename = "sessionId")]
        session_id: String,
        result: GameOverOut,
    },
    Left {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Broadcast {
        broadcast: Broadcast,
        unlocked: Vec<AchievementDef>,
    },
    ChatReply {
        #[serde(rename = "contactId")]
        contact_id: String,
        text: String,
        unlocked: Vec<AchievementDef>,
    },
    Recommendations {
        recommendations: Recommendations,
    },
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for session delivery. The full question
/// payload (correct index and feedback included) travels to the client,
/// which renders feedback locally; scoring stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub id: String,
    pub category: HazardCategory,
    pub phase: GamePhase,
    pub safety_score: i32,
    pub question_count: u32,
    pub timer_seconds: Option<u16>,
    pub time_remaining: Option<u16>,
    pub streak: u32,
    pub best_streak: u32,
    pub scenario: Option<Scenario>,
    pub error: Option<String>,
}

/// Convert the internal session to the public DTO.
pub fn to_out(s: &GameSession) -> SessionOut {
    SessionOut {
        id: s.id.clone(),
        category: s.category,
        phase: s.phase,
        safety_score: s.safety_score,
        question_count: s.question_count,
        timer_seconds: s.timer.duration(),
        time_remaining: s.time_remaining,
        streak: s.streak,
        best_streak: s.best_streak,
        scenario: s.scenario.clone(),
        error: s.error.clone(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub correct: bool,
    pub correct_choice_index: usize,
    pub feedback: String,
    pub safety_score: i32,
    pub streak: u32,
    pub speed_bonus_xp: u32,
    pub unlocked: Vec<AchievementDef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverOut {
    pub safety_score: i32,
    pub grade: &'static str,
    pub passed: bool,
    pub base_xp: u32,
    pub bonus_xp: u32,
    pub total_xp: u32,
    pub leveled_up: bool,
    pub level: u32,
    pub current_xp: u32,
    pub xp_to_next_level: u32,
    pub summary: String,
    pub unlocked: Vec<AchievementDef>,
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct StartGameIn {
    pub category: HazardCategory,
    #[serde(default, rename = "timerSeconds")]
    pub timer_seconds: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SessionRefIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "choiceIndex")]
    pub choice_index: usize,
    #[serde(default, rename = "timeRemaining")]
    pub time_remaining: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct ChatIn {
    #[serde(rename = "contactId")]
    pub contact_id: String,
    pub history: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReplyOut {
    pub contact_id: String,
    pub text: String,
    pub unlocked: Vec<AchievementDef>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastQuery {
    pub language: Option<Language>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastOut {
    pub broadcast: Broadcast,
    pub unlocked: Vec<AchievementDef>,
}

#[derive(Debug, Deserialize)]
pub struct LanguageIn {
    pub language: Language,
}

#[derive(Debug, Deserialize)]
pub struct LocationIn {
    /// None clears the stored region (the "change location" action).
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SoundIn {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct KeyIn {
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatusOut {
    pub has_key: bool,
    pub key_preview: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOut {
    pub language: Language,
    pub level: u32,
    pub current_xp: u32,
    pub xp_to_next_level: u32,
    pub location: Option<String>,
    pub unlocked_achievements: Vec<String>,
    pub performance: HashMap<String, CategoryStats>,
    pub sound_enabled: bool,
}

/// Catalog entry plus the player's unlock state.
#[derive(Debug, Serialize)]
pub struct AchievementStatusOut {
    #[serde(flatten)]
    pub def: AchievementDef,
    pub unlocked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactOut {
    pub id: &'static str,
    pub name_key: &'static str,
    pub avatar: &'static str,
    pub opener: &'static str,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
