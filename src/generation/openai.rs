//! OpenAI-compatible chat completions with streaming.

use super::{ChatMessage, GenerationRequest, Generator, Role, TokenStream};
use crate::config::LlmSettings;
use crate::error::{ProspektError, Result};
use crate::openai::{create_client, read_credential, ClientOptions};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Generator backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    repetition_penalty: f32,
}

impl OpenAIGenerator {
    /// Create a generator from the `[llm]` settings section.
    ///
    /// Fails with a configuration error when the API key is not set.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = read_credential(&settings.api_key_env).ok_or_else(|| {
            ProspektError::Config(format!(
                "{} is not set; the generation provider requires an API key",
                settings.api_key_env
            ))
        })?;

        let options = ClientOptions::new(&settings.api_base, Some(api_key))
            .with_timeout(Duration::from_secs(settings.timeout_secs));

        Ok(Self {
            client: create_client(&options)?,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
            repetition_penalty: settings.repetition_penalty,
        })
    }

    fn build_request(&self, request: &GenerationRequest) -> Result<CreateChatCompletionRequest> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_with_context())
                .build()
                .map_err(build_error)?
                .into(),
        ];

        for turn in &request.history {
            messages.push(history_message(turn)?);
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.message.clone())
                .build()
                .map_err(build_error)?
                .into(),
        );

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .top_p(self.top_p)
            .frequency_penalty(frequency_penalty(self.repetition_penalty))
            .build()
            .map_err(build_error)
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip(self, request), fields(model = %self.model, history = request.history.len()))]
    async fn generate(&self, request: GenerationRequest) -> Result<TokenStream> {
        let openai_request = self.build_request(&request)?;

        let stream = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(|e| ProspektError::Generation(format!("{} API error: {}", self.model, e)))?;

        debug!("Streaming answer from {}", self.model);

        let deltas = stream.filter_map(|result| async move {
            match result {
                Ok(chunk) => {
                    let text: String = chunk
                        .choices
                        .iter()
                        .filter_map(|choice| choice.delta.content.as_deref())
                        .collect();
                    if text.is_empty() {
                        None
                    } else {
                        Some(Ok(text))
                    }
                }
                Err(e) => Some(Err(ProspektError::Generation(format!("Stream error: {}", e)))),
            }
        });

        Ok(deltas.boxed())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn history_message(turn: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let message: ChatCompletionRequestMessage = match turn.role {
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(turn.content.clone())
            .build()
            .map_err(build_error)?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(turn.content.clone())
            .build()
            .map_err(build_error)?
            .into(),
    };
    Ok(message)
}

/// Map a multiplicative repetition penalty onto the additive frequency penalty
/// range (-2.0..=2.0) accepted by OpenAI-compatible APIs.
fn frequency_penalty(repetition_penalty: f32) -> f32 {
    (repetition_penalty - 1.0).clamp(-2.0, 2.0)
}

fn build_error(e: async_openai::error::OpenAIError) -> ProspektError {
    ProspektError::Generation(format!("Failed to build request: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_key_env(env: &str) -> LlmSettings {
        LlmSettings {
            api_key_env: env.to_string(),
            ..LlmSettings::default()
        }
    }

    #[test]
    fn test_missing_credential_is_config_error() {
        let result = OpenAIGenerator::from_settings(&settings_with_key_env(
            "PROSPEKT_TEST_NO_SUCH_LLM_KEY",
        ));
        assert!(matches!(result, Err(ProspektError::Config(_))));
    }

    #[test]
    fn test_frequency_penalty_mapping() {
        assert!((frequency_penalty(1.05) - 0.05).abs() < 1e-6);
        assert_eq!(frequency_penalty(1.0), 0.0);
        assert_eq!(frequency_penalty(5.0), 2.0);
    }

    #[test]
    fn test_request_contains_history_and_context() {
        std::env::set_var("PROSPEKT_TEST_LLM_KEY", "test-key");
        let generator =
            OpenAIGenerator::from_settings(&settings_with_key_env("PROSPEKT_TEST_LLM_KEY")).unwrap();

        let request = GenerationRequest {
            system_prompt: "Rules".to_string(),
            history: vec![ChatMessage::user("Hallo"), ChatMessage::assistant("Hi!")],
            context: "ALDI Butter 169".to_string(),
            message: "Was kostet Butter?".to_string(),
        };

        let built = generator.build_request(&request).unwrap();
        assert_eq!(built.messages.len(), 4);
        assert_eq!(built.model, "gemini-2.5-flash");
        assert_eq!(built.temperature, Some(0.0));

        let json = serde_json::to_string(&built.messages[0]).unwrap();
        assert!(json.contains("ALDI Butter 169"));
    }
}
