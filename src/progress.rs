//! Persistent player progression: level, XP, achievements, and lifetime
//! per-category statistics.
//!
//! The profile is plain data; every mutation goes through one of the ledger
//! operations below (`award_xp`, `unlock`, `record_category_outcome`) and is
//! written to durable storage by the caller immediately afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::achievement_by_id;
use crate::domain::{AchievementDef, CategoryStats, HazardCategory, Language};

/// XP required to clear the given level.
pub fn xp_to_next_level(level: u32) -> u32 {
    (100.0 * 1.5f64.powi(level as i32 - 1)).floor() as u32
}

/// Result of one XP award.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XpAward {
    pub levels_gained: u32,
}

impl XpAward {
    pub fn leveled_up(&self) -> bool {
        self.levels_gained > 0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerProfile {
    pub language: Language,
    pub level: u32,
    pub current_xp: u32,
    pub location: Option<String>,
    /// Unlocked achievement ids, in unlock order, duplicate-free.
    pub unlocked_achievements: Vec<String>,
    /// Lifetime stats keyed by category key.
    pub performance: HashMap<String, CategoryStats>,
    pub sound_enabled: bool,
    pub api_key: Option<String>,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            language: Language::En,
            level: 1,
            current_xp: 0,
            location: None,
            unlocked_achievements: Vec::new(),
            performance: HashMap::new(),
            sound_enabled: true,
            api_key: None,
        }
    }
}

impl PlayerProfile {
    /// Add XP and apply level-ups. One award may clear several thresholds;
    /// the loop carries the remainder forward until it fits below the
    /// current threshold.
    pub fn award_xp(&mut self, amount: u32) -> XpAward {
        let mut levels_gained = 0;
        self.current_xp += amount;
        while self.current_xp >= xp_to_next_level(self.level) {
            self.current_xp -= xp_to_next_level(self.level);
            self.level += 1;
            levels_gained += 1;
        }
        if levels_gained > 0 {
            info!(target: "ledger", amount, level = self.level, xp = self.current_xp, levels_gained, "Level up");
        }
        XpAward { levels_gained }
    }

    /// Idempotent unlock. Returns the catalog entry only on a fresh unlock
    /// so callers can raise exactly one notification per achievement.
    pub fn unlock(&mut self, id: &str) -> Option<&'static AchievementDef> {
        if self.unlocked_achievements.iter().any(|a| a == id) {
            return None;
        }
        let def = achievement_by_id(id)?;
        self.unlocked_achievements.push(id.to_string());
        info!(target: "ledger", achievement = id, "Achievement unlocked");
        Some(def)
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked_achievements.iter().any(|a| a == id)
    }

    /// Count a finished game for the category. Attempts always increment;
    /// the perfect counter only on a perfect run.
    pub fn record_category_outcome(&mut self, category: HazardCategory, is_perfect: bool) {
        let stats = self.performance.entry(category.key().to_string()).or_default();
        stats.total += 1;
        if is_perfect {
            stats.correct += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_table() {
        assert_eq!(xp_to_next_level(1), 100);
        assert_eq!(xp_to_next_level(2), 150);
        assert_eq!(xp_to_next_level(3), 225);
        assert_eq!(xp_to_next_level(4), 337);
        assert_eq!(xp_to_next_level(5), 506);
    }

    #[test]
    fn award_below_threshold_keeps_level() {
        let mut p = PlayerProfile::default();
        let award = p.award_xp(99);
        assert_eq!(p.level, 1);
        assert_eq!(p.current_xp, 99);
        assert!(!award.leveled_up());
    }

    #[test]
    fn award_at_threshold_levels_up_with_zero_remainder() {
        let mut p = PlayerProfile::default();
        p.current_xp = 60;
        let award = p.award_xp(40);
        assert_eq!(p.level, 2);
        assert_eq!(p.current_xp, 0);
        assert_eq!(award.levels_gained, 1);
    }

    #[test]
    fn award_carries_remainder() {
        let mut p = PlayerProfile::default();
        p.current_xp = 90;
        p.award_xp(25);
        assert_eq!(p.level, 2);
        assert_eq!(p.current_xp, 15);
    }

    #[test]
    fn large_award_cascades_through_levels() {
        let mut p = PlayerProfile::default();
        // 100 clears level 1, 150 clears level 2, 10 remain.
        let award = p.award_xp(260);
        assert_eq!(p.level, 3);
        assert_eq!(p.current_xp, 10);
        assert_eq!(award.levels_gained, 2);
    }

    #[test]
    fn unlock_is_idempotent() {
        let mut p = PlayerProfile::default();
        assert!(p.unlock("first_game").is_some());
        assert!(p.unlock("first_game").is_none());
        assert_eq!(
            p.unlocked_achievements.iter().filter(|a| *a == "first_game").count(),
            1
        );
    }

    #[test]
    fn unlock_unknown_id_is_rejected() {
        let mut p = PlayerProfile::default();
        assert!(p.unlock("no_such_achievement").is_none());
        assert!(p.unlocked_achievements.is_empty());
    }

    #[test]
    fn category_outcomes_count_attempts_and_perfects() {
        let mut p = PlayerProfile::default();
        p.record_category_outcome(HazardCategory::UrbanFire, false);
        p.record_category_outcome(HazardCategory::UrbanFire, true);
        let stats = p.performance.get("urbanFire").unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.correct, 1);
        assert!(p.performance.get("floodResponse").is_none());
    }
}
