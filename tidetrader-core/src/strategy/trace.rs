//! Structured per-run execution trace

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepKind {
    Fetch,
    Compute,
    Score,
    Llm,
    Order,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Fetch => "FETCH",
            StepKind::Compute => "COMPUTE",
            StepKind::Score => "SCORE",
            StepKind::Llm => "LLM",
            StepKind::Order => "ORDER",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FETCH" => Ok(StepKind::Fetch),
            "COMPUTE" => Ok(StepKind::Compute),
            "SCORE" => Ok(StepKind::Score),
            "LLM" => Ok(StepKind::Llm),
            "ORDER" => Ok(StepKind::Order),
            other => Err(format!("unknown step kind: {}", other)),
        }
    }
}

/// One recorded step; indices are dense and 1-based within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub step_index: u32,
    pub kind: StepKind,
    pub label: String,
    pub input_digest: String,
    pub output_digest: String,
    pub details: serde_json::Value,
    pub duration: Duration,
}

/// Ordered step recorder. Steps get their index on insertion, so the
/// sequence is dense by construction.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step; `started` marks when the work behind it began
    pub fn record(
        &mut self,
        kind: StepKind,
        label: impl Into<String>,
        input: &impl Serialize,
        output: &impl Serialize,
        details: serde_json::Value,
        started: Instant,
    ) {
        let step = TraceStep {
            step_index: self.steps.len() as u32 + 1,
            kind,
            label: label.into(),
            input_digest: digest(input),
            output_digest: digest(output),
            details,
            duration: started.elapsed(),
        };
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<TraceStep> {
        self.steps
    }
}

/// Short stable digest of a serializable value
pub fn digest(value: &impl Serialize) -> String {
    let encoded = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    encoded.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_indices_are_dense_and_one_based() {
        let mut trace = Trace::new();
        let t0 = Instant::now();
        trace.record(StepKind::Fetch, "a", &1, &2, json!({}), t0);
        trace.record(StepKind::Score, "b", &3, &4, json!({}), t0);
        trace.record(StepKind::Order, "c", &5, &6, json!({}), t0);

        let indices: Vec<u32> = trace.steps().iter().map(|s| s.step_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(digest(&json!({"a": 1})), digest(&json!({"a": 1})));
        assert_ne!(digest(&json!({"a": 1})), digest(&json!({"a": 2})));
    }
}
