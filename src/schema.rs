// src/schema.rs
//
// Score schema derived from a task's requirements. Each requirement becomes
// one score key; an `overall_rating` five-star entry is always appended last.
// The schema is built once per pass and used two ways: to tell the judge what
// shape of JSON to produce, and to validate what it actually produced.

use std::collections::HashSet;

use crate::datamodel::{EvalScores, RatingType, Task};
use crate::errors::{EvalError, Result};

const OVERALL_KEY: &str = "overall_rating";

#[derive(Debug, Clone)]
struct ScoreEntry {
    key: String,
    rating: RatingType,
    instruction: String,
}

#[derive(Debug, Clone)]
pub struct ScoreSchema {
    entries: Vec<ScoreEntry>,
}

/// Converts a requirement name into a JSON object key: lowercased, spaces and
/// dashes become underscores, everything else non-alphanumeric is dropped.
pub fn string_to_json_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c)
            } else if c == ' ' || c == '_' || c == '-' {
                Some('_')
            } else {
                None
            }
        })
        .collect()
}

impl ScoreSchema {
    /// Builds the schema for a task. Requirement names that collapse to an
    /// empty key, collide with each other, or shadow `overall_rating` are
    /// rejected before any job is scheduled.
    pub fn for_task(task: &Task) -> Result<Self> {
        let mut entries = Vec::with_capacity(task.requirements.len() + 1);
        let mut seen: HashSet<String> = HashSet::new();
        for requirement in &task.requirements {
            let key = string_to_json_key(&requirement.name);
            if key.is_empty() {
                return Err(EvalError::InvalidScoreSchema(format!(
                    "requirement name '{}' does not produce a usable score key",
                    requirement.name
                )));
            }
            if key == OVERALL_KEY || !seen.insert(key.clone()) {
                return Err(EvalError::InvalidScoreSchema(format!(
                    "duplicate score key '{key}' from requirement '{}'",
                    requirement.name
                )));
            }
            entries.push(ScoreEntry {
                key,
                rating: requirement.rating,
                instruction: requirement.instruction.clone(),
            });
        }
        entries.push(ScoreEntry {
            key: OVERALL_KEY.to_string(),
            rating: RatingType::FiveStar,
            instruction: "Overall rating of how well the output meets the task requirements."
                .to_string(),
        });
        Ok(Self { entries })
    }

    /// Validates a judge's score map: exactly the schema's keys, every value
    /// finite and within its rating type's range.
    pub fn validate(&self, scores: &EvalScores) -> Result<()> {
        for entry in &self.entries {
            let value = scores.get(&entry.key).ok_or_else(|| {
                EvalError::ScoreValidation(format!("missing score '{}'", entry.key))
            })?;
            let (min, max) = entry.rating.score_range();
            if !value.is_finite() || *value < min || *value > max {
                return Err(EvalError::ScoreValidation(format!(
                    "score '{}' is {} but must be between {} and {}",
                    entry.key, value, min, max
                )));
            }
        }
        if scores.len() != self.entries.len() {
            let known: HashSet<&str> = self.entries.iter().map(|e| e.key.as_str()).collect();
            let extras: Vec<&str> = scores
                .keys()
                .map(|k| k.as_str())
                .filter(|k| !known.contains(k))
                .collect();
            return Err(EvalError::ScoreValidation(format!(
                "unexpected score keys: {}",
                extras.join(", ")
            )));
        }
        Ok(())
    }

    /// Instruction text telling a judge what JSON object to produce.
    pub fn instruction(&self) -> String {
        let mut out =
            String::from("Respond with a JSON object containing exactly these keys:\n");
        for entry in &self.entries {
            let (min, max) = entry.rating.score_range();
            out.push_str(&format!(
                "- \"{}\": {} (number between {} and {})\n",
                entry.key, entry.instruction, min, max
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::TaskRequirement;

    fn task_with_requirements(names: &[(&str, RatingType)]) -> Task {
        Task {
            id: "task-1".to_string(),
            name: "test".to_string(),
            description: None,
            instruction: "do the thing".to_string(),
            requirements: names
                .iter()
                .map(|(name, rating)| TaskRequirement {
                    name: name.to_string(),
                    instruction: format!("check {name}"),
                    rating: *rating,
                })
                .collect(),
            runs: vec![],
            run_configs: vec![],
            evals: vec![],
        }
    }

    fn scores(pairs: &[(&str, f64)]) -> EvalScores {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_keys_are_snake_cased_and_overall_is_appended() {
        let task = task_with_requirements(&[("Factual Accuracy", RatingType::FiveStar)]);
        let schema = ScoreSchema::for_task(&task).unwrap();
        let instruction = schema.instruction();
        assert!(instruction.contains("\"factual_accuracy\""));
        assert!(instruction.contains("\"overall_rating\""));
    }

    #[test]
    fn test_duplicate_requirement_keys_are_rejected() {
        let task = task_with_requirements(&[
            ("Clarity", RatingType::FiveStar),
            ("clarity", RatingType::PassFail),
        ]);
        assert!(matches!(
            ScoreSchema::for_task(&task),
            Err(EvalError::InvalidScoreSchema(_))
        ));
    }

    #[test]
    fn test_requirement_shadowing_overall_rating_is_rejected() {
        let task = task_with_requirements(&[("Overall Rating", RatingType::FiveStar)]);
        assert!(ScoreSchema::for_task(&task).is_err());
    }

    #[test]
    fn test_validate_accepts_in_range_scores() {
        let task = task_with_requirements(&[("Clarity", RatingType::PassFail)]);
        let schema = ScoreSchema::for_task(&task).unwrap();
        let ok = scores(&[("clarity", 0.75), ("overall_rating", 4.0)]);
        assert!(schema.validate(&ok).is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_missing_and_extra_keys() {
        let task = task_with_requirements(&[("Clarity", RatingType::PassFail)]);
        let schema = ScoreSchema::for_task(&task).unwrap();

        let out_of_range = scores(&[("clarity", 1.5), ("overall_rating", 4.0)]);
        assert!(matches!(
            schema.validate(&out_of_range),
            Err(EvalError::ScoreValidation(_))
        ));

        let missing = scores(&[("overall_rating", 4.0)]);
        assert!(schema.validate(&missing).is_err());

        let extra = scores(&[
            ("clarity", 0.5),
            ("overall_rating", 4.0),
            ("tone", 3.0),
        ]);
        assert!(schema.validate(&extra).is_err());
    }
}
