// src/evaluators/llm_judge.rs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::AppConfig;
use crate::datamodel::{EvalConfig, EvalScores, Task, TaskRunConfig};
use crate::errors::Result;
use crate::evaluators::{judge_scores, produce_task_output, Evaluator};
use crate::schema::ScoreSchema;

/// Plain LLM-as-judge: a single-shot scoring call without the step-by-step
/// preamble. Eval steps, when present, are listed as criteria.
pub struct LlmJudge {
    task_instruction: String,
    run_config: TaskRunConfig,
    judge_model: String,
    judge_instruction: String,
    criteria: Vec<String>,
    schema_instruction: String,
    config: Arc<AppConfig>,
    client: Client,
}

impl LlmJudge {
    pub fn new(
        task: &Task,
        eval_config: &EvalConfig,
        run_config: &TaskRunConfig,
        schema: &ScoreSchema,
        config: Arc<AppConfig>,
        client: Client,
    ) -> Self {
        Self {
            task_instruction: task.instruction.clone(),
            run_config: run_config.clone(),
            judge_model: eval_config.model.clone(),
            judge_instruction: eval_config.prompt.clone(),
            criteria: eval_config.eval_steps.clone(),
            schema_instruction: schema.instruction(),
            config,
            client,
        }
    }

    fn build_judge_prompt(&self, input: &str, output: &str) -> String {
        let criteria = if self.criteria.is_empty() {
            String::new()
        } else {
            let mut lines = String::from("Evaluation criteria:\n");
            for criterion in &self.criteria {
                lines.push_str(&format!("- {criterion}\n"));
            }
            lines.push('\n');
            lines
        };

        format!(
            r#"You are evaluating a model's performance on a task.

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

{criteria}{schema_instruction}
Respond with only the JSON object."#,
            instruction = self.task_instruction,
            judge_instruction = self.judge_instruction,
            schema_instruction = self.schema_instruction,
        )
    }
}

#[async_trait]
impl Evaluator for LlmJudge {
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
