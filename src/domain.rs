//! Domain models used by the backend: hazard categories, questions and
//! scenarios, session history, achievements, broadcasts and recommendations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ContractError;

/// The four training scenarios offered to the user.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum HazardCategory {
    UrbanFire,
    FloodResponse,
    RoadAccident,
    MarketplaceStampede,
}

impl HazardCategory {
    pub const ALL: [HazardCategory; 4] = [
        HazardCategory::UrbanFire,
        HazardCategory::FloodResponse,
        HazardCategory::RoadAccident,
        HazardCategory::MarketplaceStampede,
    ];

    /// Stable key used on the wire, in prompts and in the stats map.
    pub fn key(self) -> &'static str {
        match self {
            HazardCategory::UrbanFire => "urbanFire",
            HazardCategory::FloodResponse => "floodResponse",
            HazardCategory::RoadAccident => "roadAccident",
            HazardCategory::MarketplaceStampede => "marketplaceStampede",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, ContractError> {
        Self::ALL
            .into_iter()
            .find(|c| c.key() == key)
            .ok_or_else(|| ContractError::UnknownCategoryKey(key.to_string()))
    }

    /// Human-readable label embedded in prompts.
    pub fn label(self) -> &'static str {
        match self {
            HazardCategory::UrbanFire => "Urban Fire Emergency",
            HazardCategory::FloodResponse => "Flood Response",
            HazardCategory::RoadAccident => "Road Traffic Accident",
            HazardCategory::MarketplaceStampede => "Marketplace Stampede",
        }
    }

    /// Two hazards have a dedicated end-of-game achievement.
    pub fn dedicated_achievement(self) -> Option<&'static str> {
        match self {
            HazardCategory::UrbanFire => Some("fire_fighter"),
            HazardCategory::FloodResponse => Some("flood_expert"),
            _ => None,
        }
    }
}

/// Supported interface languages. Translation strings live in the frontend;
/// the backend only needs the display name to steer generated content.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ha,
    Ig,
    Yo,
    Pcm,
}

impl Language {
    pub fn display_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ha => "Hausa",
            Language::Ig => "Igbo",
            Language::Yo => "Yoruba",
            Language::Pcm => "Nigerian Pidgin",
        }
    }
}

/// Per-question countdown configuration. Only four settings exist; anything
/// else is rejected at the protocol boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerSetting {
    Off,
    Seconds15,
    Seconds20,
    Seconds30,
}

impl TimerSetting {
    pub fn try_from_secs(secs: Option<u32>) -> Result<Self, u32> {
        match secs {
            None => Ok(TimerSetting::Off),
            Some(15) => Ok(TimerSetting::Seconds15),
            Some(20) => Ok(TimerSetting::Seconds20),
            Some(30) => Ok(TimerSetting::Seconds30),
            Some(other) => Err(other),
        }
    }

    pub fn duration(self) -> Option<u16> {
        match self {
            TimerSetting::Off => None,
            TimerSetting::Seconds15 => Some(15),
            TimerSetting::Seconds20 => Some(20),
            TimerSetting::Seconds30 => Some(30),
        }
    }
}

/// One multiple-choice scenario question as produced by the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub choices: Vec<String>,
    pub correct_choice_index: usize,
    pub feedback: Vec<String>,
}

impl Question {
    /// Contract check applied to every model payload before it reaches a
    /// session. Violations reject the payload as a whole.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.question.trim().is_empty() {
            return Err(ContractError::EmptyQuestion);
        }
        if self.choices.len() < 2 || self.choices.len() > 3 {
            return Err(ContractError::ChoiceCount(self.choices.len()));
        }
        if let Some(i) = self.choices.iter().position(|c| c.trim().is_empty()) {
            return Err(ContractError::EmptyChoice(i));
        }
        if self.correct_choice_index >= self.choices.len() {
            return Err(ContractError::CorrectIndexOutOfRange {
                index: self.correct_choice_index,
                len: self.choices.len(),
            });
        }
        if self.feedback.len() != self.choices.len() {
            return Err(ContractError::FeedbackMismatch {
                feedback: self.feedback.len(),
                choices: self.choices.len(),
            });
        }
        Ok(())
    }
}

/// A question paired with its illustrative image.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub image_url: String,
    pub question: Question,
}

/// Record of one answered question. Appended once per answer, never mutated;
/// the full list becomes the transcript for the end-of-session summary.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    pub question: String,
    pub user_choice: String,
    pub correct_choice: String,
    pub is_correct: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Legendary,
}

/// Static catalog entry. Unlock state lives in the player profile.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDef {
    pub id: &'static str,
    pub name_key: &'static str,
    pub description_key: &'static str,
    pub rarity: Rarity,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Alert,
    Warning,
    Info,
}

/// A cited source attached to a broadcast by search grounding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub uri: String,
    pub title: String,
}

/// One simulated emergency broadcast.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<SourceRef>,
}

/// Personalized guidance generated from the player's profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub contextual_alert: String,
    pub training_recommendation_key: String,
    pub training_recommendation_reason: String,
    pub preparedness_tip: String,
}

impl Recommendations {
    /// The recommended scenario must name a real category key.
    pub fn validate(&self) -> Result<(), ContractError> {
        HazardCategory::from_key(&self.training_recommendation_key).map(|_| ())
    }
}

/// Lifetime per-category counters kept in the player profile.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryStats {
    pub total: u32,
    pub correct: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question {
            question: "Smoke is filling the corridor. What do you do first?".into(),
            choices: vec!["Stay low and move to the exit".into(), "Take the lift".into()],
            correct_choice_index: 0,
            feedback: vec!["Correct, smoke rises.".into(), "Lifts can fail in a fire.".into()],
        }
    }

    #[test]
    fn valid_question_passes() {
        assert!(question().validate().is_ok());
    }

    #[test]
    fn empty_question_rejected() {
        let mut q = question();
        q.question = "  ".into();
        assert_eq!(q.validate(), Err(ContractError::EmptyQuestion));
    }

    #[test]
    fn choice_count_bounds_enforced() {
        let mut q = question();
        q.choices = vec!["only one".into()];
        q.feedback = vec!["f".into()];
        assert_eq!(q.validate(), Err(ContractError::ChoiceCount(1)));

        let mut q = question();
        q.choices = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        q.feedback = vec!["f".into(); 4];
        assert_eq!(q.validate(), Err(ContractError::ChoiceCount(4)));
    }

    #[test]
    fn correct_index_must_be_in_range() {
        let mut q = question();
        q.correct_choice_index = 2;
        assert_eq!(
            q.validate(),
            Err(ContractError::CorrectIndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn feedback_must_match_choices() {
        let mut q = question();
        q.feedback.pop();
        assert_eq!(
            q.validate(),
            Err(ContractError::FeedbackMismatch { feedback: 1, choices: 2 })
        );
    }

    #[test]
    fn category_keys_round_trip() {
        for c in HazardCategory::ALL {
            assert_eq!(HazardCategory::from_key(c.key()).unwrap(), c);
        }
        assert!(HazardCategory::from_key("earthquake").is_err());
    }

    #[test]
    fn timer_setting_rejects_odd_durations() {
        assert_eq!(TimerSetting::try_from_secs(None).unwrap(), TimerSetting::Off);
        assert_eq!(
            TimerSetting::try_from_secs(Some(20)).unwrap().duration(),
            Some(20)
        );
        assert_eq!(TimerSetting::try_from_secs(Some(45)), Err(45));
    }

    #[test]
    fn recommendations_key_is_checked() {
        let mut r = Recommendations {
            contextual_alert: "a".into(),
            training_recommendation_key: "floodResponse".into(),
            training_recommendation_reason: "b".into(),
            preparedness_tip: "c".into(),
        };
        assert!(r.validate().is_ok());
        r.training_recommendation_key = "tsunami".into();
        assert!(r.validate().is_err());
    }
}
