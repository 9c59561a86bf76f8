// src/evaluators/mod.rs
//
// The evaluator capability: given one dataset input, produce the task output
// under the run config's model and score it with the eval config's judge
// model. Kinds are a closed set resolved by `evaluator_from_type`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::{render_template, AppConfig};
use crate::datamodel::{EvalConfig, EvalConfigType, EvalScores, Task, TaskRunConfig};
use crate::errors::{EvalError, Result};
use crate::providers::{call_provider, parse_model_string};
use crate::schema::ScoreSchema;

pub mod g_eval;
pub mod llm_judge;

use g_eval::GEval;
use llm_judge::LlmJudge;

/// Scores one dataset input. Implementations make network-bound judge calls;
/// the orchestrator treats this as a black box with two outcomes.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Returns the task output produced for `input` and the judge's scores.
    async fn run(&self, input: &str) -> Result<(String, EvalScores)>;
}

/// Resolves an eval config to a concrete evaluator for one run config.
/// Adding a judge kind means adding an `EvalConfigType` variant and an arm
/// here.
pub fn evaluator_from_type(
    task: &Task,
    eval_config: &EvalConfig,
    run_config: &TaskRunConfig,
    schema: &ScoreSchema,
    config: Arc<AppConfig>,
    client: Client,
) -> Result<Box<dyn Evaluator>> {
    match eval_config.config_type {
        EvalConfigType::GEval => Ok(Box::new(GEval::new(
            task,
            eval_config,
            run_config,
            schema,
            config,
            client,
        )?)),
        EvalConfigType::LlmAsJudge => Ok(Box::new(LlmJudge::new(
            task,
            eval_config,
            run_config,
            schema,
            config,
            client,
        ))),
    }
}

/// Produces the task output for an input: renders the run config's prompt
/// template (or falls back to instruction + input) and calls its model.
pub(crate) async fn produce_task_output(
    config: &AppConfig,
    client: &Client,
    instruction: &str,
    run_config: &TaskRunConfig,
    input: &str,
) -> Result<String> {
    let prompt = match &run_config.prompt {
        Some(template) => render_template(
            template,
            &serde_json::json!({ "instruction": instruction, "input": input }),
        ),
        None => format!("{instruction}\n\n{input}"),
    };
    let (provider, model_name) = parse_model_string(&run_config.model);
    let (output, latency_ms) = call_provider(config, client, &provider, &model_name, &prompt)
        .await
        .map_err(|e| EvalError::ModelFailure {
            model: run_config.model.clone(),
            source: Box::new(e),
        })?;
    log::debug!(
        "task output from {} in {latency_ms}ms ({} chars)",
        run_config.model,
        output.len()
    );
    Ok(output)
}

/// Calls the judge model and parses its score object.
pub(crate) async fn judge_scores(
    config: &AppConfig,
    client: &Client,
    judge_model: &str,
    judge_prompt: &str,
) -> Result<EvalScores> {
    let (provider, model_name) = parse_model_string(judge_model);
    let (response, latency_ms) =
        call_provider(config, client, &provider, &model_name, judge_prompt)
            .await
            .map_err(|e| EvalError::JudgeFailure {
                model: judge_model.to_string(),
                source: Box::new(e),
            })?;
    log::debug!("judge {judge_model} responded in {latency_ms}ms");
    extract_scores(&response)
}

/// Extracts the score map from a judge response. Judges that think out loud
/// wrap the object in prose or code fences, so the last top-level JSON
/// object in the text is taken.
pub(crate) fn extract_scores(text: &str) -> Result<EvalScores> {
    let candidate = last_json_object(text).ok_or_else(|| {
        EvalError::ScoreParse("no JSON object in judge response".to_string())
    })?;
    let value: serde_json::Value = serde_json::from_str(candidate)?;
    let object = value
        .as_object()
        .ok_or_else(|| EvalError::ScoreParse("judge response is not an object".to_string()))?;
    let mut scores = EvalScores::new();
    for (key, value) in object {
        let number = value.as_f64().ok_or_else(|| {
            EvalError::ScoreParse(format!("score '{key}' is not a number"))
        })?;
        scores.insert(key.clone(), number);
    }
    Ok(scores)
}

fn last_json_object(text: &str) -> Option<&str> {
    let end = text.rfind('}')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for i in (0..=end).rev() {
        match bytes[i] {
            b'}' => depth += 1,
            b'{' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[i..=end]);
                }
            }
            _ => {}
        }
    }
    None
}
