//! Durable profile persistence: one JSON document on local disk.
//!
//! Writes are synchronous and unbuffered; every ledger mutation is flushed
//! before the triggering request completes. A missing or unreadable document
//! yields a default profile rather than an error, so a fresh install needs
//! no setup.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::ProfileError;
use crate::progress::PlayerProfile;

const DEFAULT_PROFILE_PATH: &str = "./data/profile.json";

#[derive(Clone, Debug)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build from PROFILE_PATH or the default location.
    pub fn from_env() -> Self {
        let path = std::env::var("PROFILE_PATH").unwrap_or_else(|_| DEFAULT_PROFILE_PATH.into());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored profile, falling back to defaults on any problem.
    pub fn load(&self) -> PlayerProfile {
        match fs::read_to_string(&self.path) {
            Ok(s) => match serde_json::from_str::<PlayerProfile>(&s) {
                Ok(profile) => {
                    info!(target: "ledger", path = %self.path.display(), level = profile.level, "Loaded player profile");
                    profile
                }
                Err(e) => {
                    error!(target: "ledger", path = %self.path.display(), error = %e, "Corrupt profile document; starting fresh");
                    PlayerProfile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(target: "ledger", path = %self.path.display(), "No profile document yet; starting fresh");
                PlayerProfile::default()
            }
            Err(e) => {
                warn!(target: "ledger", path = %self.path.display(), error = %e, "Failed to read profile document; starting fresh");
                PlayerProfile::default()
            }
        }
    }

    /// Persist the profile. Writes to a sibling temp file first, then
    /// renames over the document so a crash mid-write cannot corrupt it.
    pub fn save(&self, profile: &PlayerProfile) -> Result<(), ProfileError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_string_pretty(profile)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
