use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One sampled MBPP entry, normalized at ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: i64,
    pub prompt: String,
    pub reference_code: String,
    pub test_list: Vec<String>,
    #[serde(default)]
    pub test_setup_code: String,
}

/// A generated solution attempt for one (task, strategy) pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub code: String,
    pub comment: String,
}

/// The three code-generation strategies compared by the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    WriteCode,
    AdvancedWriting,
    AdvancedWritingV2,
}

impl Strategy {
    /// Evaluation order within a task
    pub const ALL: [Strategy; 3] = [
        Strategy::WriteCode,
        Strategy::AdvancedWriting,
        Strategy::AdvancedWritingV2,
    ];

    /// Human-readable label used in summaries and charts
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::WriteCode => "Write Code",
            Strategy::AdvancedWriting => "Advanced Writing",
            Strategy::AdvancedWritingV2 => "Advanced Writing V2",
        }
    }

    /// Prefix of the strategy's columns in the results file
    pub fn column_prefix(&self) -> &'static str {
        match self {
            Strategy::WriteCode => "write_code",
            Strategy::AdvancedWriting => "advanced_writing",
            Strategy::AdvancedWritingV2 => "advanced_writing_v2",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_prefix())
    }
}

/// Outcome of scoring one candidate against one task's tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Correct,
    Error(String),
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct)
    }

    /// 1 for Correct, 0 otherwise; the encoding the t-test consumes
    pub fn as_indicator(&self) -> f64 {
        if self.is_correct() {
            1.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Correct => f.write_str("Correct"),
            Verdict::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

impl FromStr for Verdict {
    type Err = std::convert::Infallible;

    /// Anything other than the literal `Correct` counts as an error verdict
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "Correct" {
            return Ok(Verdict::Correct);
        }
        let message = s.strip_prefix("Error: ").or_else(|| s.strip_prefix("Error:")).unwrap_or(s);
        Ok(Verdict::Error(message.to_string()))
    }
}

/// Scored candidate for a single strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub code: String,
    pub verdict: Verdict,
    pub comment: String,
}

/// One row of the results table: a task and its three scored candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub task_id: i64,
    pub prompt: String,
    pub reference_code: String,
    pub test_list: Vec<String>,
    pub write_code: StrategyResult,
    pub advanced_writing: StrategyResult,
    pub advanced_writing_v2: StrategyResult,
}

impl ResultRow {
    pub fn result(&self, strategy: Strategy) -> &StrategyResult {
        match strategy {
            Strategy::WriteCode => &self.write_code,
            Strategy::AdvancedWriting => &self.advanced_writing,
            Strategy::AdvancedWritingV2 => &self.advanced_writing_v2,
        }
    }
}
