// src/providers/mod.rs

use crate::config::AppConfig;
use crate::errors::{EvalError, Result};

pub mod anthropic;
pub mod ollama;
pub mod openai;

use anthropic::AnthropicProvider;
use ollama::OllamaProvider;
use openai::OpenAiProvider;

/// A common trait for Large Language Model (LLM) providers, giving a unified
/// interface to the different backends used for task models and judges.
pub trait LlmProvider: Send + Sync {
    /// Generates a response for the given prompt.
    ///
    /// Returns the generated text together with the call latency in
    /// milliseconds.
    fn generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<(String, u64)>> + Send;
}

/// Splits a `provider:model_name` string into its parts. Strings without a
/// provider prefix default to `openai`.
pub fn parse_model_string(model_str: &str) -> (String, String) {
    match model_str.split_once(':') {
        Some((provider, model)) => (provider.to_string(), model.to_string()),
        None => ("openai".to_string(), model_str.to_string()),
    }
}

/// Dispatches a generation call to the named provider. Unconfigured or
/// unknown providers fail with `ProviderNotFound`.
pub async fn call_provider(
    config: &AppConfig,
    client: &reqwest::Client,
    provider_name: &str,
    model_name: &str,
    prompt: &str,
) -> Result<(String, u64)> {
    match provider_name {
        "openai" => {
            let openai_config = config
                .openai
                .as_ref()
                .ok_or_else(|| EvalError::ProviderNotFound("openai".to_string()))?;
            let provider = OpenAiProvider::new(client.clone(), openai_config.clone());
            provider.generate(model_name, prompt).await
        }
        "anthropic" => {
            let anthropic_config = config
                .anthropic
                .as_ref()
                .ok_or_else(|| EvalError::ProviderNotFound("anthropic".to_string()))?;
            let provider = AnthropicProvider::new(client.clone(), anthropic_config.clone());
            provider.generate(model_name, prompt).await
        }
        "ollama" => {
            let ollama_config = config
                .ollama
                .as_ref()
                .ok_or_else(|| EvalError::ProviderNotFound("ollama".to_string()))?;
            let provider = OllamaProvider::new(client.clone(), ollama_config.clone());
            provider.generate(model_name, prompt).await
        }
        _ => Err(EvalError::ProviderNotFound(provider_name.to_string())),
    }
}
