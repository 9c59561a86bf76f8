// src/datamodel.rs
//
// The object model for tasks and evaluations. A `Task` owns its dataset items
// (`TaskRun`), its run configurations (`TaskRunConfig`) and its evaluations
// (`Eval`); an `Eval` owns judge configurations (`EvalConfig`); a completed
// evaluation of one dataset item under one run config is recorded as an
// `EvalRun`. Ownership is expressed through containment plus id references so
// records can round-trip through TOML task files and the HTTP API.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// A map of score key to float value, as produced by an evaluator.
pub type EvalScores = BTreeMap<String, f64>;

/// How a task requirement is rated by a judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingType {
    FiveStar,
    PassFail,
    PassFailCritical,
}

impl RatingType {
    /// Inclusive range of valid float scores for this rating type.
    ///
    /// Judges may return fractional values (a weighted pass/fail can come
    /// back as 0.75), so ranges are continuous rather than discrete.
    pub fn score_range(&self) -> (f64, f64) {
        match self {
            RatingType::FiveStar => (1.0, 5.0),
            RatingType::PassFail => (0.0, 1.0),
            RatingType::PassFailCritical => (-1.0, 1.0),
        }
    }
}

/// One rated requirement of a task, e.g. "Concise" with an instruction for
/// the judge and a rating type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequirement {
    pub name: String,
    pub instruction: String,
    #[serde(rename = "type")]
    pub rating: RatingType,
}

/// One dataset example owned by a task: an input, optionally a recorded
/// output, and tags used by dataset filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: String,
    pub input: String,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A named, reusable way of executing a task: which model produces the
/// output, and optionally a prompt template with `{{instruction}}` and
/// `{{input}}` placeholders.
///
/// The model string is in the format `provider:model_name`, e.g.
/// `openai:gpt-4o` or `ollama:llama3`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunConfig {
    pub id: String,
    pub task_id: String,
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// The kind of evaluator an `EvalConfig` resolves to. Closed set: adding a
/// judge kind means adding a variant here and an arm to the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalConfigType {
    GEval,
    LlmAsJudge,
}

/// One concrete judge configuration under an eval: the judge model, its
/// instruction prompt and the evaluation steps it should follow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    pub id: String,
    pub eval_id: String,
    pub name: String,
    pub config_type: EvalConfigType,
    /// Judge model, `provider:model_name`.
    pub model: String,
    /// Instruction given to the judge describing what to evaluate.
    pub prompt: String,
    #[serde(default)]
    pub eval_steps: Vec<String>,
}

/// A named evaluation definition owned by a task. The two filter ids select
/// which dataset items take part in a pass: the eval set proper, and the set
/// used to compare judge configurations against each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eval {
    pub id: String,
    pub task_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub eval_set_filter_id: String,
    pub eval_configs_filter_id: String,
    #[serde(default)]
    pub current_config_id: Option<String>,
    #[serde(default)]
    pub configs: Vec<EvalConfig>,
}

impl Eval {
    pub fn config(&self, config_id: &str) -> Option<&EvalConfig> {
        self.configs.iter().find(|c| c.id == config_id)
    }
}

/// A unit of work definition: instructions plus rating requirements, owning
/// dataset items, run configurations and evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub instruction: String,
    #[serde(default)]
    pub requirements: Vec<TaskRequirement>,
    #[serde(default)]
    pub runs: Vec<TaskRun>,
    #[serde(default)]
    pub run_configs: Vec<TaskRunConfig>,
    #[serde(default)]
    pub evals: Vec<Eval>,
}

impl Task {
    /// Parses a task definition from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn eval(&self, eval_id: &str) -> Option<&Eval> {
        self.evals.iter().find(|e| e.id == eval_id)
    }
}

/// Loads every `*.toml` task definition from a directory.
pub fn load_tasks_from_dir(dir: impl AsRef<Path>) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            let text = std::fs::read_to_string(&path)?;
            tasks.push(Task::from_toml_str(&text)?);
        }
    }
    Ok(tasks)
}

/// The durable record of one completed evaluation job: one dataset item,
/// evaluated under one run config, scored by one eval config. The input and
/// output are denormalized into the record on purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRun {
    pub id: String,
    pub eval_config_id: String,
    pub dataset_item_id: String,
    pub run_config_id: String,
    pub input: String,
    pub output: String,
    pub scores: EvalScores,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_from_toml() {
        let text = r#"
id = "task-1"
name = "Summarize"
instruction = "Summarize the given text in one sentence."

[[requirements]]
name = "Concise"
instruction = "Is the summary a single short sentence?"
type = "pass_fail"

[[runs]]
id = "item-1"
input = "A long article about rust."
tags = ["eval_set"]

[[run_configs]]
id = "rc-1"
task_id = "task-1"
name = "gpt-4o baseline"
model = "openai:gpt-4o"

[[evals]]
id = "eval-1"
task_id = "task-1"
name = "quality"
eval_set_filter_id = "tag::eval_set"
eval_configs_filter_id = "tag::golden"

[[evals.configs]]
id = "ec-1"
eval_id = "eval-1"
name = "g-eval"
config_type = "g_eval"
model = "openai:gpt-4o"
prompt = "Rate the summary quality."
eval_steps = ["Check length", "Check faithfulness"]
"#;
        let task = Task::from_toml_str(text).unwrap();
        assert_eq!(task.id, "task-1");
        assert_eq!(task.requirements[0].rating, RatingType::PassFail);
        assert_eq!(task.runs.len(), 1);
        let eval = task.eval("eval-1").unwrap();
        let config = eval.config("ec-1").unwrap();
        assert_eq!(config.config_type, EvalConfigType::GEval);
        assert_eq!(config.eval_steps.len(), 2);
        assert!(task.eval("nope").is_none());
    }

    #[test]
    fn test_rating_score_ranges() {
        assert_eq!(RatingType::FiveStar.score_range(), (1.0, 5.0));
        assert_eq!(RatingType::PassFail.score_range(), (0.0, 1.0));
        assert_eq!(RatingType::PassFailCritical.score_range(), (-1.0, 1.0));
    }
}
