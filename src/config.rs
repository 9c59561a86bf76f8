// src/config.rs
use crate::errors::{EvalError, Result};
use regex::Regex;

/// Default number of concurrent in-flight evaluator calls per pass.
/// A policy default, not a hard limit; callers may override per request.
pub const DEFAULT_EVAL_CONCURRENCY: usize = 25;

/// Default timeout applied to every judge/model HTTP call, in seconds.
/// Bounds worker-slot starvation when a remote call hangs.
pub const DEFAULT_JUDGE_TIMEOUT_SECS: u64 = 300;

/// Configuration for the OpenAI provider.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
}

/// Configuration for the Anthropic provider.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_base: String,
    pub api_key: String,
}

/// Configuration for a local Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub api_base: String,
}

/// High-level application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: Option<OpenAiConfig>,
    pub anthropic: Option<AnthropicConfig>,
    pub ollama: Option<OllamaConfig>,
    /// Worker count used when a run request does not specify one.
    pub default_concurrency: usize,
    /// Per-request timeout for model and judge calls.
    pub judge_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// At least one provider must be configured: `OPENAI_API_KEY`,
    /// `ANTHROPIC_API_KEY` or `OLLAMA_API_BASE`.
    pub fn from_env() -> Result<Self> {
        let openai = std::env::var("OPENAI_API_KEY").ok().map(|api_key| {
            let api_base = std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
            OpenAiConfig { api_base, api_key }
        });

        let anthropic = std::env::var("ANTHROPIC_API_KEY").ok().map(|api_key| {
            let api_base = std::env::var("ANTHROPIC_API_BASE")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string());
            AnthropicConfig { api_base, api_key }
        });

        let ollama = std::env::var("OLLAMA_API_BASE")
            .ok()
            .map(|api_base| OllamaConfig { api_base });

        if openai.is_none() && anthropic.is_none() && ollama.is_none() {
            return Err(EvalError::Config(
                "No LLM providers configured. Set OPENAI_API_KEY, ANTHROPIC_API_KEY or OLLAMA_API_BASE."
                    .to_string(),
            ));
        }

        let default_concurrency = match std::env::var("EVAL_CONCURRENCY") {
            Ok(raw) => {
                let parsed: usize = raw.parse().map_err(|_| {
                    EvalError::Config(format!("EVAL_CONCURRENCY is not a number: {raw}"))
                })?;
                if parsed < 1 {
                    return Err(EvalError::Config(
                        "EVAL_CONCURRENCY must be >= 1".to_string(),
                    ));
                }
                parsed
            }
            Err(_) => DEFAULT_EVAL_CONCURRENCY,
        };

        let judge_timeout_secs = match std::env::var("EVAL_JUDGE_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                EvalError::Config(format!("EVAL_JUDGE_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_JUDGE_TIMEOUT_SECS,
        };

        Ok(AppConfig {
            openai,
            anthropic,
            ollama,
            default_concurrency,
            judge_timeout_secs,
        })
    }
}

/// Simple template renderer. Placeholders are in the format `{{key}}` and are
/// looked up in the given JSON object; unknown keys are left untouched.
pub fn render_template(template: &str, data: &serde_json::Value) -> String {
    let re = Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("static regex");
    re.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        data.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_template_substitutes_known_keys() {
        let data = json!({ "input": "summarize this", "instruction": "Be brief." });
        let rendered = render_template("{{instruction}}\n\nInput: {{input}}", &data);
        assert_eq!(rendered, "Be brief.\n\nInput: summarize this");
    }

    #[test]
    fn test_render_template_keeps_unknown_placeholders() {
        let data = json!({ "input": "x" });
        let rendered = render_template("{{input}} and {{missing}}", &data);
        assert_eq!(rendered, "x and {{missing}}");
    }
}
