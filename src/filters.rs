// src/filters.rs
//
// Named dataset filters. A filter id selects a subset of a task's dataset
// items; the predicate is pure and safe to call concurrently.

use crate::datamodel::TaskRun;
use crate::errors::{EvalError, Result};

/// A pure predicate over dataset items.
pub type DatasetFilter = Box<dyn Fn(&TaskRun) -> bool + Send + Sync>;

/// Resolves a filter id to a predicate.
///
/// Supported ids: `all` matches every item; `tag::<tag>` matches items
/// carrying the tag. Unknown ids are configuration errors.
pub fn dataset_filter_from_id(filter_id: &str) -> Result<DatasetFilter> {
    if filter_id == "all" {
        return Ok(Box::new(|_| true));
    }
    if let Some(tag) = filter_id.strip_prefix("tag::") {
        if tag.is_empty() {
            return Err(EvalError::Config(
                "tag filter requires a tag name, e.g. tag::golden".to_string(),
            ));
        }
        let tag = tag.to_string();
        return Ok(Box::new(move |run| run.tags.iter().any(|t| t == &tag)));
    }
    Err(EvalError::Config(format!(
        "unknown dataset filter id: {filter_id}"
    )))
}
