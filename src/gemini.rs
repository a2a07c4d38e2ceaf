//! Minimal Gemini client for our use-cases.
//!
//! We only call models/*:generateContent and request either plain text or a
//! schema-constrained JSON object. Calls are instrumented and log model
//! names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.
//! Model output is decoded fail-closed: fence-stripped, strictly parsed, and
//! contract-checked before it reaches a session.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Broadcast, Question, Recommendations, Severity, SourceRef};
use crate::error::FetchError;
use crate::util::{fill_template, trunc_for_log};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Key format accepted by the setup screen: 39 characters, "AIza" prefix.
pub fn validate_api_key(key: &str) -> bool {
  let trimmed = key.trim();
  trimmed.len() == 39 && trimmed.starts_with("AIza")
}

/// Masked preview for the key-status endpoint.
pub fn key_preview(key: &str) -> String {
  let trimmed = key.trim();
  if trimmed.len() < 12 {
    return "...".into();
  }
  format!("{}...{}", &trimmed[..8], &trimmed[trimmed.len() - 4..])
}

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

/// One decoded completion: concatenated candidate text plus any grounding
/// sources attached by the search tool.
struct Completion {
  text: String,
  sources: Vec<SourceRef>,
}

impl Gemini {
  /// Construct a client for the given key. Returns None if the HTTP client
  /// cannot be built.
  pub fn new(api_key: String) -> Option<Self> {
    let base_url =
      std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// Construct the client if we find a valid GEMINI_API_KEY; otherwise None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok()?;
    if !validate_api_key(&api_key) {
      error!(target: "gemini", "GEMINI_API_KEY is present but malformed; ignoring");
      return None;
    }
    Self::new(api_key.trim().to_string())
  }

  pub fn key_preview(&self) -> String {
    key_preview(&self.api_key)
  }

  /// Single generateContent call. `config`/`tools` shape the response; the
  /// two are never combined (the API rejects a response schema together
  /// with tool use).
  #[instrument(level = "info", skip_all, fields(model = %self.model, has_system = system.is_some(), user_len = user.len()))]
  async fn generate(
    &self,
    system: Option<&str>,
    user: &str,
    config: Option<GenerationConfig>,
    tools: Option<Vec<Tool>>,
  ) -> Result<Completion, FetchError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateContentRequest {
      contents: vec![Content { parts: vec![Part { text: user.into() }] }],
      system_instruction: system.map(|s| Content { parts: vec![Part { text: s.into() }] }),
      generation_config: config,
      tools,
    };

    let start = std::time::Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "prepzone-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(FetchError::Api { status, message });
    }

    let body: GenerateContentResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(target: "gemini", elapsed = ?start.elapsed(), prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }

    let mut text = String::new();
    let mut sources = Vec::new();
    if let Some(candidate) = body.candidates.into_iter().next() {
      if let Some(content) = candidate.content {
        for part in content.parts {
          if let Some(t) = part.text {
            text.push_str(&t);
          }
        }
      }
      if let Some(grounding) = candidate.grounding_metadata {
        for chunk in grounding.grounding_chunks {
          if let Some(web) = chunk.web {
            if let Some(uri) = web.uri {
              let title = web.title.unwrap_or_else(|| uri.clone());
              sources.push(SourceRef { uri, title });
            }
          }
        }
      }
    }

    let text = text.trim().to_string();
    if text.is_empty() {
      return Err(FetchError::EmptyResponse);
    }
    Ok(Completion { text, sources })
  }

  // --- High-level helpers (domain-specialized) ---

  /// First question of a session.
  #[instrument(level = "info", skip(self, prompts), fields(%category_label, %location))]
  pub async fn fetch_initial_question(
    &self,
    prompts: &Prompts,
    category_label: &str,
    location: &str,
  ) -> Result<Question, FetchError> {
    let user = fill_template(
      &prompts.initial_question_template,
      &[("category", category_label), ("location", location)],
    );
    self.fetch_question(&prompts.question_system, &user).await
  }

  /// Follow-up question continuing from the answer context.
  #[instrument(level = "info", skip(self, prompts, context), fields(%category_label, %location, context_len = context.len()))]
  pub async fn fetch_next_question(
    &self,
    prompts: &Prompts,
    category_label: &str,
    context: &str,
    location: &str,
  ) -> Result<Question, FetchError> {
    let user = fill_template(
      &prompts.next_question_template,
      &[("category", category_label), ("location", location), ("context", context)],
    );
    self.fetch_question(&prompts.question_system, &user).await
  }

  async fn fetch_question(&self, system: &str, user: &str) -> Result<Question, FetchError> {
    let config = GenerationConfig {
      response_mime_type: Some("application/json".into()),
      response_schema: Some(question_schema()),
    };
    let completion = self.generate(Some(system), user, Some(config), None).await?;
    let question: Question = decode_json(&completion.text)?;
    question.validate()?;
    Ok(question)
  }

  /// End-of-session performance summary as plain text.
  #[instrument(level = "info", skip(self, prompts, transcript_json), fields(%category_label, transcript_len = transcript_json.len()))]
  pub async fn fetch_session_summary(
    &self,
    prompts: &Prompts,
    category_label: &str,
    transcript_json: &str,
  ) -> Result<String, FetchError> {
    let user = fill_template(
      &prompts.summary_template,
      &[("category", category_label), ("transcript", transcript_json)],
    );
    let completion = self.generate(None, &user, None, None).await?;
    Ok(completion.text)
  }

  /// One simulated emergency broadcast, grounded in search results.
  #[instrument(level = "info", skip(self, prompts), fields(%language_label))]
  pub async fn fetch_broadcast(
    &self,
    prompts: &Prompts,
    language_label: &str,
  ) -> Result<Broadcast, FetchError> {
    #[derive(Deserialize)]
    struct Body {
      title: String,
      message: String,
      severity: Severity,
    }

    let user = fill_template(&prompts.broadcast_template, &[("language", language_label)]);
    let tools = vec![Tool { google_search: serde_json::json!({}) }];
    let completion = self.generate(None, &user, None, Some(tools)).await?;
    let body: Body = decode_json(&completion.text)?;
    Ok(Broadcast {
      title: body.title,
      message: body.message,
      severity: body.severity,
      timestamp: Utc::now(),
      sources: completion.sources,
    })
  }

  /// In-character reply from a simulated chat contact.
  #[instrument(level = "info", skip(self, prompts, history), fields(%contact_name, %language_label, history_len = history.len()))]
  pub async fn fetch_chat_reply(
    &self,
    prompts: &Prompts,
    history: &str,
    contact_name: &str,
    language_label: &str,
  ) -> Result<String, FetchError> {
    let system = fill_template(
      &prompts.chat_system_template,
      &[("contact", contact_name), ("language", language_label)],
    );
    let user = fill_template(
      &prompts.chat_user_template,
      &[("contact", contact_name), ("history", history)],
    );
    let completion = self.generate(Some(&system), &user, None, None).await?;
    Ok(completion.text)
  }

  /// Personalized guidance built from the player's level, location and
  /// lifetime stats.
  #[instrument(level = "info", skip(self, prompts, stats_json), fields(%location, level = level, %language_label))]
  pub async fn fetch_recommendations(
    &self,
    prompts: &Prompts,
    location: &str,
    level: u32,
    stats_json: &str,
    language_label: &str,
  ) -> Result<Recommendations, FetchError> {
    let level_str = level.to_string();
    let user = fill_template(
      &prompts.recommendations_template,
      &[
        ("level", level_str.as_str()),
        ("location", location),
        ("stats", stats_json),
        ("language", language_label),
      ],
    );
    let config = GenerationConfig {
      response_mime_type: Some("application/json".into()),
      response_schema: Some(recommendations_schema()),
    };
    let completion = self
      .generate(Some(&prompts.recommendations_system), &user, Some(config), None)
      .await?;
    let recs: Recommendations = decode_json(&completion.text)?;
    recs.validate()?;
    Ok(recs)
  }
}

/// Some models wrap JSON replies in a markdown fence despite instructions.
/// Tolerate the fence, but nothing else: the stripped text must still parse
/// strictly.
fn strip_code_fence(s: &str) -> &str {
  let t = s.trim();
  let t = t.strip_prefix("```json").or_else(|| t.strip_prefix("```")).unwrap_or(t);
  let t = t.strip_suffix("```").unwrap_or(t);
  t.trim()
}

fn decode_json<T: for<'a> Deserialize<'a>>(text: &str) -> Result<T, FetchError> {
  Ok(serde_json::from_str(strip_code_fence(text))?)
}

/// Response schema for scenario questions (Gemini schema dialect).
fn question_schema() -> serde_json::Value {
  serde_json::json!({
    "type": "OBJECT",
    "properties": {
      "question": {
        "type": "STRING",
        "description": "The scenario question for the user."
      },
      "choices": {
        "type": "ARRAY",
        "description": "An array of 2 to 3 possible actions for the user to choose from.",
        "items": { "type": "STRING" }
      },
      "correctChoiceIndex": {
        "type": "INTEGER",
        "description": "The 0-based index of the correct choice in the 'choices' array. This choice must be the objectively safest and best practice."
      },
      "feedback": {
        "type": "ARRAY",
        "description": "An array of feedback strings, one for each choice, in the same order. Explain why each choice is good or bad in a supportive, educational tone.",
        "items": { "type": "STRING" }
      }
    },
    "required": ["question", "choices", "correctChoiceIndex", "feedback"]
  })
}

fn recommendations_schema() -> serde_json::Value {
  let keys = crate::domain::HazardCategory::ALL
    .iter()
    .map(|c| c.key())
    .collect::<Vec<_>>()
    .join(", ");
  serde_json::json!({
    "type": "OBJECT",
    "properties": {
      "contextualAlert": {
        "type": "STRING",
        "description": "A short, location-specific safety alert, max 2-3 sentences."
      },
      "trainingRecommendationKey": {
        "type": "STRING",
        "description": format!("A suggestion for which training scenario to try next. Must be one of these keys: {keys}.")
      },
      "trainingRecommendationReason": {
        "type": "STRING",
        "description": "The reason for the training recommendation."
      },
      "preparednessTip": {
        "type": "STRING",
        "description": "A general, actionable disaster preparedness tip relevant to the user's profile or location."
      }
    },
    "required": [
      "contextualAlert",
      "trainingRecommendationKey",
      "trainingRecommendationReason",
      "preparednessTip"
    ]
  })
}

// --- Wire DTOs ---

#[derive(Serialize)]
struct GenerateContentRequest {
  contents: Vec<Content>,
  #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
  generation_config: Option<GenerationConfig>,
  #[serde(skip_serializing_if = "Option::is_none")]
  tools: Option<Vec<Tool>>,
}
#[derive(Serialize)]
struct Content {
  parts: Vec<Part>,
}
#[derive(Serialize)]
struct Part {
  text: String,
}
#[derive(Serialize)]
struct GenerationConfig {
  #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<String>,
  #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
  response_schema: Option<serde_json::Value>,
}
#[derive(Serialize)]
struct Tool {
  #[serde(rename = "googleSearch")]
  google_search: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default, rename = "usageMetadata")]
  usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate {
  content: Option<CandidateContent>,
  #[serde(default, rename = "groundingMetadata")]
  grounding_metadata: Option<GroundingMetadata>,
}
#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}
#[derive(Deserialize)]
struct CandidatePart {
  #[serde(default)]
  text: Option<String>,
}
#[derive(Deserialize)]
struct GroundingMetadata {
  #[serde(default, rename = "groundingChunks")]
  grounding_chunks: Vec<GroundingChunk>,
}
#[derive(Deserialize)]
struct GroundingChunk {
  web: Option<WebSource>,
}
#[derive(Deserialize)]
struct WebSource {
  uri: Option<String>,
  title: Option<String>,
}
#[derive(Deserialize)]
struct UsageMetadata {
  #[serde(default, rename = "promptTokenCount")]
  prompt_token_count: Option<u32>,
  #[serde(default, rename = "candidatesTokenCount")]
  candidates_token_count: Option<u32>,
  #[serde(default, rename = "totalTokenCount")]
  total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn api_key_format_is_enforced() {
    let good = format!("AIza{}", "x".repeat(35));
    assert!(validate_api_key(&good));
    assert!(validate_api_key(&format!("  {good}  ")));
    assert!(!validate_api_key("AIzaTooShort"));
    assert!(!validate_api_key(&format!("BIza{}", "x".repeat(35))));
    assert!(!validate_api_key(&format!("AIza{}", "x".repeat(36))));
  }

  #[test]
  fn key_preview_masks_the_middle() {
    let key = format!("AIza{}", "x".repeat(35));
    let preview = key_preview(&key);
    assert!(preview.starts_with("AIzaxxxx"));
    assert!(preview.ends_with("xxxx"));
    assert!(preview.contains("..."));
    assert_eq!(key_preview("short"), "...");
  }

  #[test]
  fn code_fences_are_stripped() {
    assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
    assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
  }

  #[test]
  fn decode_rejects_non_json_remainder() {
    let res: Result<serde_json::Value, _> = decode_json("```json\n{\"a\":1} trailing\n```");
    assert!(res.is_err());
  }

  #[test]
  fn decoded_question_is_contract_checked() {
    let payload = r#"{"question":"Q","choices":["a","b"],"correctChoiceIndex":5,"feedback":["f","g"]}"#;
    let q: Question = decode_json(payload).unwrap();
    assert!(q.validate().is_err());
  }

  #[test]
  fn api_error_body_is_extracted() {
    let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_api_error(body).as_deref(), Some("API key not valid"));
    assert_eq!(extract_api_error("plain text"), None);
  }

  #[test]
  fn question_schema_lists_required_fields() {
    let schema = question_schema();
    let required = schema["required"].as_array().unwrap();
    assert!(required.iter().any(|v| v == "correctChoiceIndex"));
  }
}
