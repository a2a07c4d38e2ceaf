//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::error::ApiError;
use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "prepzone_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "prepzone_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "prepzone_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "prepzone_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "prepzone_backend", "WebSocket disconnected");
}

fn err_reply(e: ApiError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartGame { category, timer_seconds } => {
      match start_game(state, category, timer_seconds).await {
        Ok(session) => {
          tracing::info!(target: "session", id = %session.id, "WS game started");
          ServerWsMessage::GameStarted { session }
        }
        Err(e) => err_reply(e),
      }
    }

    ClientWsMessage::SubmitAnswer { session_id, choice_index, time_remaining } => {
      match submit_answer(state, &session_id, choice_index, time_remaining).await {
        Ok(result) => {
          tracing::info!(target: "session", id = %session_id, correct = result.correct, "WS answer evaluated");
          ServerWsMessage::AnswerResult { session_id, result }
        }
        Err(e) => err_reply(e),
      }
    }

    ClientWsMessage::TimeExpired { session_id } => {
      match expire_timer(state, &session_id).await {
        Ok(result) => ServerWsMessage::AnswerResult { session_id, result },
        Err(e) => err_reply(e),
      }
    }

    ClientWsMessage::NextQuestion { session_id } => {
      match advance_question(state, &session_id).await {
        Ok(session) => ServerWsMessage::QuestionAdvanced { session },
        Err(e) => err_reply(e),
      }
    }

    ClientWsMessage::EndGame { session_id } => {
      match end_game(state, &session_id).await {
        Ok(result) => {
          tracing::info!(target: "session", id = %session_id, score = result.safety_score, "WS game ended");
          ServerWsMessage::GameOver { session_id, result }
        }
        Err(e) => err_reply(e),
      }
    }

    ClientWsMessage::RestartGame { session_id } => {
      match restart_game(state, &session_id).await {
        Ok(session) => ServerWsMessage::GameStarted { session },
        Err(e) => err_reply(e),
      }
    }

    ClientWsMessage::LeaveGame { session_id } => {
      leave_game(state, &session_id).await;
      ServerWsMessage::Left { session_id }
    }

    ClientWsMessage::CheckBroadcast => {
      match check_broadcast(state, None).await {
        Ok(out) => ServerWsMessage::Broadcast { broadcast: out.broadcast, unlocked: out.unlocked },
        Err(e) => err_reply(e),
      }
    }

    ClientWsMessage::ChatMessage { contact_id, history } => {
      match chat_reply(state, &contact_id, &history).await {
        Ok(out) => ServerWsMessage::ChatReply {
          contact_id: out.contact_id,
          text: out.text,
          unlocked: out.unlocked,
        },
        Err(e) => err_reply(e),
      }
    }

    ClientWsMessage::GetRecommendations => {
      match recommendations(state).await {
        Ok(recommendations) => ServerWsMessage::Recommendations { recommendations },
        Err(e) => err_reply(e),
      }
    }
  }
}
