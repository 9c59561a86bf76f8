// src/evaluators/g_eval.rs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::AppConfig;
use crate::datamodel::{EvalConfig, EvalScores, Task, TaskRunConfig};
use crate::errors::{EvalError, Result};
use crate::evaluators::{judge_scores, produce_task_output, Evaluator};
use crate::schema::ScoreSchema;

/// G-Eval style judge: the judge model is walked through the eval config's
/// numbered evaluation steps, thinking step by step before emitting scores.
pub struct GEval {
    task_instruction: String,
    run_config: TaskRunConfig,
    judge_model: String,
    judge_instruction: String,
    eval_steps: Vec<String>,
    schema_instruction: String,
    config: Arc<AppConfig>,
    client: Client,
}

impl GEval {
    pub fn new(
        task: &Task,
        eval_config: &EvalConfig,
        run_config: &TaskRunConfig,
        schema: &ScoreSchema,
        config: Arc<AppConfig>,
        client: Client,
    ) -> Result<Self> {
        if eval_config.eval_steps.is_empty() {
            return Err(EvalError::Config(format!(
                "eval config '{}' is g_eval but has no eval_steps",
                eval_config.id
            )));
        }
        Ok(Self {
            task_instruction: task.instruction.clone(),
            run_config: run_config.clone(),
            judge_model: eval_config.model.clone(),
            judge_instruction: eval_config.prompt.clone(),
            eval_steps: eval_config.eval_steps.clone(),
            schema_instruction: schema.instruction(),
            config,
            client,
        })
    }

    fn build_judge_prompt(&self, input: &str, output: &str) -> String {
        let mut steps = String::new();
        for (i, step) in self.eval_steps.iter().enumerate() {
            steps.push_str(&format!("{}) {}\n", i + 1, step));
        }

        format!(
            r#"Your job is to evaluate a model's performance on a task. Blocks are marked with <eval_data> tags.

The task the model was given:
<eval_data>
{instruction}
</eval_data>

The input to the model:
<eval_data>
{input}
</eval_data>

The model's output:
<eval_data>
{output}
</eval_data>

{judge_instruction}

First, think step by step about the model's performance following these evaluation steps:

{steps}
Then give your scores. {schema_instruction}
The JSON object must be the last thing in your response."#,
            instruction = self.task_instruction,
            judge_instruction = self.judge_instruction,
            schema_instruction = self.schema_instruction,
        )
    }
}

#[async_trait]
impl Evaluator for GEval {
    async fn run(&self, input: &str) -> Result<(String, EvalScores)> {
        let output = produce_task_output(
            &self.config,
            &self.client,
            &self.task_instruction,
            &self.run_config,
            input,
        )
        .await?;

        let judge_prompt = self.build_judge_prompt(input, &output);
        let scores = judge_scores(&self.config, &self.client, &self.judge_model, &judge_prompt)
            .await?;

        Ok((output, scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::{RatingType, TaskRequirement};

    fn fixture() -> (Task, EvalConfig, TaskRunConfig, ScoreSchema) {
        let task = Task {
            id: "task-1".to_string(),
            name: "summarize".to_string(),
            description: None,
            instruction: "Summarize the text.".to_string(),
            requirements: vec![TaskRequirement {
                name: "Concise".to_string(),
                instruction: "Is it short?".to_string(),
                rating: RatingType::PassFail,
            }],
            runs: vec![],
            run_configs: vec![],
            evals: vec![],
        };
        let eval_config = EvalConfig {
            id: "ec-1".to_string(),
            eval_id: "eval-1".to_string(),
            name: "judge".to_string(),
            config_type: crate::datamodel::EvalConfigType::GEval,
            model: "openai:gpt-4o".to_string(),
            prompt: "Rate the summary.".to_string(),
            eval_steps: vec!["Read the input".to_string(), "Check length".to_string()],
        };
        let run_config = TaskRunConfig {
            id: "rc-1".to_string(),
            task_id: "task-1".to_string(),
            name: "baseline".to_string(),
            model: "openai:gpt-4o-mini".to_string(),
            prompt: None,
        };
        let schema = ScoreSchema::for_task(&task).unwrap();
        (task, eval_config, run_config, schema)
    }

    fn app_config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            openai: None,
            anthropic: None,
            ollama: None,
            default_concurrency: 25,
            judge_timeout_secs: 300,
        })
    }

    #[test]
    fn test_judge_prompt_numbers_steps_and_embeds_schema() {
        let (task, eval_config, run_config, schema) = fixture();
        let g_eval = GEval::new(
            &task,
            &eval_config,
            &run_config,
            &schema,
            app_config(),
            Client::new(),
        )
        .unwrap();

        let prompt = g_eval.build_judge_prompt("some input", "some output");
        assert!(prompt.contains("1) Read the input"));
        assert!(prompt.contains("2) Check length"));
        assert!(prompt.contains("\"concise\""));
        assert!(prompt.contains("\"overall_rating\""));
        assert!(prompt.contains("some input"));
        assert!(prompt.contains("some output"));
    }

    #[test]
    fn test_missing_eval_steps_fail_construction() {
        let (task, mut eval_config, run_config, schema) = fixture();
        eval_config.eval_steps.clear();
        let result = GEval::new(
            &task,
            &eval_config,
            &run_config,
            &schema,
            app_config(),
            Client::new(),
        );
        assert!(matches!(result, Err(EvalError::Config(_))));
    }
}
