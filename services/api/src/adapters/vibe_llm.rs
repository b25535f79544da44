//! services/api/src/adapters/vibe_llm.rs
//!
//! This module contains the adapter for the vibe-scoring LLM.
//! It implements the `VibeAnalyzer` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str = r#"You are a writing coach analyzing the "vibe" of a text passage.

Evaluate the text you are given and provide:
1. A vibe score between -1 (lifeless/boring) and 1 (vibrant/engaging)
2. A brief, encouraging explanation (max 50 words) focusing on what makes the writing engaging or how to improve it

Respond in JSON format and nothing else:
{
  "score": 0.0,
  "reason": "Your explanation here"
}"#;

const USER_INPUT_TEMPLATE: &str = r#"Text to analyze:
"{text}""#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use flow_core::domain::VibeAnalysis;
use flow_core::ports::{AnalysisOutcome, PortError, PortResult, VibeAnalyzer};
use flow_core::vibe::{clamp_score, ANALYZE_MAX_CHARS};
use regex::Regex;
use serde::Deserialize;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `VibeAnalyzer` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiVibeAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

/// The JSON shape the model is asked to produce.
#[derive(Deserialize)]
struct RawVerdict {
    score: f64,
    reason: Option<String>,
}

impl OpenAiVibeAdapter {
    /// Creates a new `OpenAiVibeAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Extracts the `{score, reason}` verdict from the model's raw output.
    ///
    /// Models wrap the JSON in prose often enough that we fish the first
    /// object out with a regex before parsing. Anything unparseable recovers
    /// to a neutral score with an apology reason; the editing session must
    /// never see a parse failure.
    fn parse_verdict(raw: &str) -> VibeAnalysis {
        let json_object = Regex::new(r"\{[\s\S]*\}").unwrap();
        let parsed = json_object
            .find(raw)
            .and_then(|m| serde_json::from_str::<RawVerdict>(m.as_str()).ok());

        match parsed {
            Some(verdict) => VibeAnalysis {
                score: clamp_score(verdict.score),
                reason: verdict.reason.unwrap_or_default(),
            },
            None => VibeAnalysis {
                score: 0.0,
                reason: "I couldn't analyze the vibe right now. Try again!".to_string(),
            },
        }
    }

    /// Bounds the passage before transmission to keep request cost in check.
    fn truncate(text: &str) -> String {
        text.chars().take(ANALYZE_MAX_CHARS).collect()
    }
}

fn map_openai_error(e: OpenAIError) -> PortError {
    match e {
        OpenAIError::ApiError(api) => {
            let msg = api.message.to_lowercase();
            if msg.contains("rate limit") || msg.contains("quota") {
                PortError::RateLimited
            } else if msg.contains("api key") || msg.contains("authentication") {
                PortError::ProviderMisconfigured
            } else {
                PortError::Unexpected(api.message)
            }
        }
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// `VibeAnalyzer` Trait Implementation
//=========================================================================================

#[async_trait]
impl VibeAnalyzer for OpenAiVibeAdapter {
    /// Scores a passage for engagement and normalizes the model's verdict.
    async fn analyze(&self, text: &str) -> PortResult<AnalysisOutcome> {
        let user_input = USER_INPUT_TEMPLATE.replace("{text}", &Self::truncate(text));

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .max_tokens(150u32)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let tokens_used = response
            .usage
            .as_ref()
            .map(|u| u.total_tokens as i64)
            .unwrap_or(0);

        let raw = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(
                    "Vibe analysis LLM returned no text content in its response.".to_string(),
                )
            })?;

        Ok(AnalysisOutcome {
            analysis: Self::parse_verdict(&raw),
            tokens_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_clean_json_verdict() {
        let verdict =
            OpenAiVibeAdapter::parse_verdict(r#"{"score": 0.6, "reason": "Lively pacing."}"#);
        assert_eq!(verdict.score, 0.6);
        assert_eq!(verdict.reason, "Lively pacing.");
    }

    #[test]
    fn fishes_json_out_of_surrounding_prose() {
        let raw = "Sure! Here's my verdict:\n{\"score\": -0.4, \"reason\": \"Flat.\"}\nHope that helps.";
        let verdict = OpenAiVibeAdapter::parse_verdict(raw);
        assert_eq!(verdict.score, -0.4);
        assert_eq!(verdict.reason, "Flat.");
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let verdict = OpenAiVibeAdapter::parse_verdict(r#"{"score": 7.5, "reason": "!"}"#);
        assert_eq!(verdict.score, 1.0);
        let verdict = OpenAiVibeAdapter::parse_verdict(r#"{"score": -3.0, "reason": "!"}"#);
        assert_eq!(verdict.score, -1.0);
    }

    #[test]
    fn non_json_output_recovers_to_a_neutral_verdict() {
        let verdict = OpenAiVibeAdapter::parse_verdict("I love this text, ten out of ten");
        assert_eq!(verdict.score, 0.0);
        assert_eq!(
            verdict.reason,
            "I couldn't analyze the vibe right now. Try again!"
        );
    }

    #[test]
    fn missing_reason_is_left_empty_for_the_bucket_fallback() {
        let verdict = OpenAiVibeAdapter::parse_verdict(r#"{"score": 0.1}"#);
        assert_eq!(verdict.reason, "");
    }

    #[test]
    fn truncation_is_char_boundary_safe() {
        let long: String = "é".repeat(ANALYZE_MAX_CHARS + 50);
        let truncated = OpenAiVibeAdapter::truncate(&long);
        assert_eq!(truncated.chars().count(), ANALYZE_MAX_CHARS);
    }
}
