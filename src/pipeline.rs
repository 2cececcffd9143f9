//! Aggregation pipelines: ordering, rendering and free-text stage input.

use crate::model::{PipelineStage, StageType};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// A problem with one user-edited text field. Shown inline next to the
/// field; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Ordered list of stages as edited in the builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<PipelineStage>,
}

impl Pipeline {
    pub fn new(stages: Vec<PipelineStage>) -> Self {
        Self { stages }
    }

    /// Enabled stages sorted by `order`. Equal orders keep list order.
    pub fn active_stages(&self) -> Vec<&PipelineStage> {
        let mut active: Vec<&PipelineStage> = self.stages.iter().filter(|s| s.enabled).collect();
        active.sort_by_key(|s| s.order);
        active
    }

    /// `[{ "$stage": config }, ...]` for the active stages.
    pub fn to_value(&self) -> Value {
        Value::Array(self.active_stages().into_iter().map(stage_value).collect())
    }

    /// Append a stage from its template, ordered after the current last one.
    pub fn push_template(&mut self, stage: StageType) -> &PipelineStage {
        let order = self.stages.iter().map(|s| s.order.saturating_add(1)).max().unwrap_or(0);
        self.stages.push(PipelineStage::from_template(stage, order));
        &self.stages[self.stages.len() - 1]
    }

    /// Move the stage at `from` to `to` and renumber orders to match list
    /// position.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from >= self.stages.len() || to >= self.stages.len() {
            return;
        }
        let stage = self.stages.remove(from);
        self.stages.insert(to, stage);
        for (i, s) in self.stages.iter_mut().enumerate() {
            s.order = i as i64;
        }
    }
}

pub fn stage_value(stage: &PipelineStage) -> Value {
    let mut m = Map::new();
    m.insert(stage.stage.as_str().to_string(), stage.config.clone());
    Value::Object(m)
}

/// Parse a stage configuration typed into a text box.
pub fn parse_stage_config(stage: StageType, text: &str) -> Result<Value, FieldError> {
    let field = format!("{} config", stage);
    if text.trim().is_empty() {
        return Ok(stage.template());
    }
    serde_json::from_str(text).map_err(|e| {
        debug!(%stage, error = %e, "stage config did not parse");
        FieldError::new(field, format!("invalid JSON: {}", e))
    })
}

/// Parse bulk document input: one object or an array of objects.
pub fn parse_documents(text: &str) -> Result<Vec<Map<String, Value>>, FieldError> {
    const FIELD: &str = "documents";
    let value: Value = serde_json::from_str(text)
        .map_err(|e| FieldError::new(FIELD, format!("invalid JSON: {}", e)))?;

    match value {
        Value::Object(m) => Ok(vec![m]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(m) => Ok(m),
                other => Err(FieldError::new(
                    FIELD,
                    format!("item {} is not an object: {}", i, other),
                )),
            })
            .collect(),
        other => Err(FieldError::new(
            FIELD,
            format!("expected an object or an array of objects, got {}", other),
        )),
    }
}
