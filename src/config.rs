//! Loading agent configuration (prompt templates) from TOML.
//!
//! See `AgentConfig` and `Prompts` for expected schema.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts used by the Gemini client. Defaults are sensible for Nigerian
/// disaster-preparedness training. Override them in TOML to tune tone or
/// structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  // Scenario question generation
  pub question_system: String,
  pub initial_question_template: String,
  pub next_question_template: String,
  // End-of-session summary
  pub summary_template: String,
  // Comms hub
  pub broadcast_template: String,
  pub chat_system_template: String,
  pub chat_user_template: String,
  // Personalization
  pub recommendations_system: String,
  pub recommendations_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_system: "You are an expert disaster-preparedness instructor creating an interactive training simulation for a Nigerian audience. Present one realistic scenario question at a time with 2 to 3 possible actions. Exactly one action is the objectively safest best practice. Keep language clear and supportive. Respond ONLY with strict JSON matching the provided schema.".into(),
      initial_question_template: "Create the first challenging scenario question for: '{category}' in {location}.".into(),
      next_question_template: "The scenario is '{category}' in {location}. Here is what just happened: {context}. Now, create the next logical question and choices in this scenario.".into(),
      summary_template: "You are a supportive safety coach. The trainee just finished a '{category}' training session. Here is the transcript of their answers as JSON: {transcript}. Write a short performance summary (3-5 sentences): praise what they did well, point out the most important mistake if any, and give one concrete preparedness tip. Address the trainee directly.".into(),
      broadcast_template: "Using Google Search for the latest information, act as the Nigerian National Emergency Management Agency (NEMA). Generate one realistic and recent public safety announcement or emergency alert relevant to Nigeria. The alert must be in {language}. Your response MUST be a single JSON object with three keys: \"title\" (string), \"message\" (string), and \"severity\" (string, which must be one of 'Alert', 'Warning', 'Info'). Do not include any other text or markdown formatting like ```json.".into(),
      chat_system_template: "You are simulating a person named '{contact}' in a private chat during a potential emergency in Nigeria. Your replies should be short, realistic, and in {language}. Keep the tone appropriate for the contact (e.g., caring for family, formal for community watch).".into(),
      chat_user_template: "This is our chat history. The last message was from me. Please reply as {contact}.\n\nChat History:\n{history}".into(),
      recommendations_system: "Generate only the JSON object based on the user's profile. Be concise and highly relevant to their context.".into(),
      recommendations_template: "You are a personalization AI for the NEMA PrepZone app. The user is at Level {level}, located in {location}, Nigeria. Their performance stats are: {stats}. Based on this, generate a JSON object in {language} with the specified schema.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO
/// error, returns None and the compiled-in defaults are used.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "prepzone_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "prepzone_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "prepzone_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::fill_template;

  #[test]
  fn default_templates_have_placeholders() {
    let p = Prompts::default();
    let filled = fill_template(
      &p.next_question_template,
      &[("category", "Flood Response"), ("location", "Lagos"), ("context", "ctx")],
    );
    assert!(filled.contains("Flood Response"));
    assert!(filled.contains("Lagos"));
    assert!(!filled.contains('{'));
  }

  #[test]
  fn partial_toml_overrides_merge_with_defaults() {
    // serde(default) on `prompts` only applies at the table level; a full
    // prompts table must carry every field, so an empty config falls back.
    let cfg: AgentConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.prompts.question_system, Prompts::default().question_system);
  }
}
