//! HTTP endpoint handlers. These are thin wrappers that forward to core
//! logic and map domain errors onto HTTP statuses via `ApiError`.

use std::sync::Arc;
use axum::{extract::{Query, State}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::catalog;
use crate::error::ApiError;
use crate::logic::*;
use crate::progress::xp_to_next_level;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body), fields(category = body.category.key()))]
pub async fn http_start_game(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartGameIn>,
) -> Result<Json<SessionOut>, ApiError> {
  let out = start_game(&state, body.category, body.timer_seconds).await?;
  info!(target: "session", id = %out.id, "HTTP game started");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(%q.session_id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SessionRefIn>,
) -> Result<Json<SessionOut>, ApiError> {
  Ok(Json(get_session(&state, &q.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id, choice_index = body.choice_index))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  let out = submit_answer(&state, &body.session_id, body.choice_index, body.time_remaining).await?;
  info!(target: "session", id = %body.session_id, correct = out.correct, score = out.safety_score, "HTTP answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id))]
pub async fn http_post_expire(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionRefIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  Ok(Json(expire_timer(&state, &body.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id))]
pub async fn http_post_next(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionRefIn>,
) -> Result<Json<SessionOut>, ApiError> {
  Ok(Json(advance_question(&state, &body.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id))]
pub async fn http_post_end(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionRefIn>,
) -> Result<Json<GameOverOut>, ApiError> {
  let out = end_game(&state, &body.session_id).await?;
  info!(target: "session", id = %body.session_id, score = out.safety_score, xp = out.total_xp, "HTTP game ended");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id))]
pub async fn http_post_restart(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionRefIn>,
) -> Result<Json<SessionOut>, ApiError> {
  Ok(Json(restart_game(&state, &body.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id))]
pub async fn http_post_leave(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionRefIn>,
) -> impl IntoResponse {
  leave_game(&state, &body.session_id).await;
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_profile(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let p = state.profile_snapshot().await;
  Json(ProfileOut {
    language: p.language,
    level: p.level,
    current_xp: p.current_xp,
    xp_to_next_level: xp_to_next_level(p.level),
    location: p.location,
    unlocked_achievements: p.unlocked_achievements,
    performance: p.performance,
    sound_enabled: p.sound_enabled,
  })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_language(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LanguageIn>,
) -> Result<Json<HealthOut>, ApiError> {
  state.set_language(body.language).await?;
  Ok(Json(HealthOut { ok: true }))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_location(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LocationIn>,
) -> Result<Json<HealthOut>, ApiError> {
  state.set_location(body.location).await?;
  Ok(Json(HealthOut { ok: true }))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_sound(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SoundIn>,
) -> Result<Json<HealthOut>, ApiError> {
  state.set_sound_enabled(body.enabled).await?;
  Ok(Json(HealthOut { ok: true }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_key_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.key_status().await)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_key(
  State(state): State<Arc<AppState>>,
  Json(body): Json<KeyIn>,
) -> Result<Json<KeyStatusOut>, ApiError> {
  Ok(Json(state.set_api_key(&body.key).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_broadcast(
  State(state): State<Arc<AppState>>,
  Query(q): Query<BroadcastQuery>,
) -> Result<Json<BroadcastOut>, ApiError> {
  Ok(Json(check_broadcast(&state, q.language).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.contact_id))]
pub async fn http_post_chat(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ChatIn>,
) -> Result<Json<ChatReplyOut>, ApiError> {
  Ok(Json(chat_reply(&state, &body.contact_id, &body.history).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_recommendations(
  State(state): State<Arc<AppState>>,
) -> Result<Json<crate::domain::Recommendations>, ApiError> {
  Ok(Json(recommendations(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_achievements(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let p = state.profile_snapshot().await;
  let list: Vec<AchievementStatusOut> = catalog::ACHIEVEMENTS
    .iter()
    .map(|def| AchievementStatusOut { def: *def, unlocked: p.is_unlocked(def.id) })
    .collect();
  Json(list)
}

#[instrument(level = "info")]
pub async fn http_get_contacts() -> impl IntoResponse {
  let list: Vec<ContactOut> = catalog::CHAT_CONTACTS
    .iter()
    .map(|c| ContactOut { id: c.id, name_key: c.name_key, avatar: c.avatar, opener: c.opener })
    .collect();
  Json(list)
}

#[instrument(level = "info")]
pub async fn http_get_states() -> impl IntoResponse {
  Json(catalog::NIGERIAN_STATES.to_vec())
}
