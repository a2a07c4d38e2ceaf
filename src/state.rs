//! Application state: live sessions, the player profile and its store, the
//! prompts, and the optional Gemini client.
//!
//! This module owns:
//!   - the session store (by id)
//!   - the player profile plus its durable store; every ledger mutation
//!     goes through a wrapper here and is written to disk before returning
//!   - the prompts struct (from TOML or defaults)
//!   - the optional Gemini client, swappable at runtime when the user
//!     enters an API key

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::{load_agent_config_from_env, Prompts};
use crate::domain::{AchievementDef, HazardCategory, Language};
use crate::error::ProfileError;
use crate::gemini::{self, Gemini};
use crate::progress::{xp_to_next_level, PlayerProfile, XpAward};
use crate::protocol::KeyStatusOut;
use crate::session::GameSession;
use crate::storage::ProfileStore;

/// Ledger snapshot taken right after an XP award, for the game-over reply.
#[derive(Clone, Copy, Debug)]
pub struct LedgerSnapshot {
    pub level: u32,
    pub current_xp: u32,
    pub xp_to_next_level: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, GameSession>>>,
    pub profile: Arc<RwLock<PlayerProfile>>,
    pub store: ProfileStore,
    pub gemini: Arc<RwLock<Option<Gemini>>>,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load config and profile, init the client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::with_store(ProfileStore::from_env())
    }

    pub fn with_store(store: ProfileStore) -> Self {
        let prompts = load_agent_config_from_env()
            .map(|c| c.prompts)
            .unwrap_or_default();

        let profile = store.load();
        info!(
            target: "ledger",
            level = profile.level,
            xp = profile.current_xp,
            achievements = profile.unlocked_achievements.len(),
            categories_played = profile.performance.len(),
            "Startup profile inventory"
        );

        // Env key wins; otherwise fall back to the stored credential.
        let gemini = Gemini::from_env().or_else(|| {
            profile
                .api_key
                .as_deref()
                .filter(|k| gemini::validate_api_key(k))
                .and_then(|k| Gemini::new(k.trim().to_string()))
        });
        if let Some(g) = &gemini {
            info!(target: "prepzone_backend", base_url = %g.base_url, model = %g.model, "Gemini enabled.");
        } else {
            info!(target: "prepzone_backend", "Gemini disabled (no API key yet). Content endpoints will ask for one.");
        }

        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            profile: Arc::new(RwLock::new(profile)),
            store,
            gemini: Arc::new(RwLock::new(gemini)),
            prompts,
        }
    }

    /// Best-effort persistence for game-path mutations: a disk hiccup must
    /// not lose a finished game's reply, so failures are logged instead of
    /// propagated. Settings endpoints persist with `try_persist` and do
    /// surface the error.
    fn persist(&self, profile: &PlayerProfile) {
        if let Err(e) = self.store.save(profile) {
            error!(target: "ledger", error = %e, path = %self.store.path().display(), "Failed to persist profile");
        }
    }

    fn try_persist(&self, profile: &PlayerProfile) -> Result<(), ProfileError> {
        self.store.save(profile)
    }

    // --- Session store ---

    #[instrument(level = "debug", skip(self, session), fields(id = %session.id))]
    pub async fn insert_session(&self, session: GameSession) {
        self.sessions.write().await.insert(session.id.clone(), session);
    }

    pub async fn get_session(&self, id: &str) -> Option<GameSession> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove_session(&self, id: &str) -> Option<GameSession> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_none() {
            warn!(target: "session", %id, "Tried to remove unknown session");
        }
        removed
    }

    // --- Ledger operations (each persists before returning) ---

    pub async fn profile_snapshot(&self) -> PlayerProfile {
        self.profile.read().await.clone()
    }

    pub async fn unlock_achievement(&self, id: &str) -> Option<AchievementDef> {
        let mut profile = self.profile.write().await;
        let def = profile.unlock(id).copied();
        if def.is_some() {
            self.persist(&profile);
        }
        def
    }

    pub async fn award_xp(&self, amount: u32) -> (XpAward, LedgerSnapshot) {
        let mut profile = self.profile.write().await;
        let award = profile.award_xp(amount);
        self.persist(&profile);
        let snapshot = LedgerSnapshot {
            level: profile.level,
            current_xp: profile.current_xp,
            xp_to_next_level: xp_to_next_level(profile.level),
        };
        (award, snapshot)
    }

    pub async fn record_category_outcome(&self, category: HazardCategory, is_perfect: bool) {
        let mut profile = self.profile.write().await;
        profile.record_category_outcome(category, is_perfect);
        self.persist(&profile);
    }

    // --- Settings ---

    pub async fn set_language(&self, language: Language) -> Result<(), ProfileError> {
        let mut profile = self.profile.write().await;
        profile.language = language;
        self.try_persist(&profile)
    }

    pub async fn set_location(&self, location: Option<String>) -> Result<(), ProfileError> {
        let mut profile = self.profile.write().await;
        profile.location = location;
        self.try_persist(&profile)
    }

    pub async fn set_sound_enabled(&self, enabled: bool) -> Result<(), ProfileError> {
        let mut profile = self.profile.write().await;
        profile.sound_enabled = enabled;
        self.try_persist(&profile)
    }

    /// Validate, persist, and activate a user-supplied API key.
    #[instrument(level = "info", skip_all)]
    pub async fn set_api_key(&self, key: &str) -> Result<KeyStatusOut, ProfileError> {
        if !gemini::validate_api_key(key) {
            return Err(ProfileError::InvalidKey);
        }
        let trimmed = key.trim().to_string();
        let client = Gemini::new(trimmed.clone()).ok_or(ProfileError::ClientInit)?;

        {
            let mut profile = self.profile.write().await;
            profile.api_key = Some(trimmed);
            self.try_persist(&profile)?;
        }
        let preview = client.key_preview();
        *self.gemini.write().await = Some(client);
        info!(target: "prepzone_backend", "Gemini key configured at runtime.");
        Ok(KeyStatusOut { has_key: true, key_preview: Some(preview) })
    }

    pub async fn key_status(&self) -> KeyStatusOut {
        match self.gemini.read().await.as_ref() {
            Some(g) => KeyStatusOut { has_key: true, key_preview: Some(g.key_preview()) },
            None => KeyStatusOut { has_key: false, key_preview: None },
        }
    }
}
