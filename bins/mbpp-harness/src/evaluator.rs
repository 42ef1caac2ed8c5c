/// Test Runner - Reduce a Candidate's Test Run to a Verdict
///
/// **Core Responsibility:**
/// Execute setup code, candidate code and test expressions in one scope,
/// in that order, and reduce the outcome to Correct or Error.
///
/// **Critical Properties:**
/// - Knows nothing about interpreters, only about `ExecutionEngine`
/// - Knows nothing about strategies or producers
/// - One fresh scope per call: definitions never leak between candidates
/// - Fail-fast: the first failing step ends the run, later steps never execute
/// - Nothing escapes: every failure becomes an `Error` verdict
///
/// **Verdict Rules:**
/// - Correct: setup, candidate and every test completed without raising
/// - Error(message): message is the terse `Type: message` form of the first
///   failure, without the stack trace (the sandbox keeps full traces)

use crate::engine::{ExecError, ExecutionEngine, ExecutionScope};
use mbpp_common::types::{ResultRow, Strategy, Verdict};
use std::fmt;
use tracing::debug;

/// Step of a test run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Opening the evaluation scope itself
    Session,
    Setup,
    Candidate,
    /// Zero-based index into the test list
    Test(usize),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Session => f.write_str("session"),
            Stage::Setup => f.write_str("setup"),
            Stage::Candidate => f.write_str("candidate"),
            Stage::Test(idx) => write!(f, "test #{}", idx + 1),
        }
    }
}

/// The step that ended a test run, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub stage: Stage,
    pub error: ExecError,
}

/// Result of one Test Runner call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub verdict: Verdict,
    /// Sources handed to the scope, including the failing one
    pub steps_executed: usize,
    pub failure: Option<StepFailure>,
}

async fn run_step(
    scope: &mut dyn ExecutionScope,
    stage: Stage,
    source: &str,
    steps_executed: &mut usize,
) -> Result<(), StepFailure> {
    *steps_executed += 1;
    scope
        .exec(source)
        .await
        .map(|_| ())
        .map_err(|error| StepFailure { stage, error })
}

async fn run_steps(
    engine: &dyn ExecutionEngine,
    code: &str,
    test_list: &[String],
    test_setup_code: &str,
    steps_executed: &mut usize,
) -> Result<(), StepFailure> {
    let mut scope = engine.open_scope().await.map_err(|error| StepFailure {
        stage: Stage::Session,
        error,
    })?;

    // Setup failures abort before the candidate is defined
    if !test_setup_code.trim().is_empty() {
        run_step(scope.as_mut(), Stage::Setup, test_setup_code, steps_executed).await?;
    }

    run_step(scope.as_mut(), Stage::Candidate, code, steps_executed).await?;

    for (idx, test) in test_list.iter().enumerate() {
        run_step(scope.as_mut(), Stage::Test(idx), test, steps_executed).await?;
    }

    Ok(())
}

/// Run `code` against `test_list` after `test_setup_code`, in a fresh scope
pub async fn evaluate_test_list(
    engine: &dyn ExecutionEngine,
    code: &str,
    test_list: &[String],
    test_setup_code: &str,
) -> TestOutcome {
    let mut steps_executed = 0;

    match run_steps(engine, code, test_list, test_setup_code, &mut steps_executed).await {
        Ok(()) => TestOutcome {
            verdict: Verdict::Correct,
            steps_executed,
            failure: None,
        },
        Err(failure) => {
            debug!(stage = %failure.stage, error = %failure.error, "Test run failed");
            TestOutcome {
                verdict: Verdict::Error(failure.error.summary()),
                steps_executed,
                failure: Some(failure),
            }
        }
    }
}

/// Correctness tally of one strategy over a run
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyTally {
    pub strategy: Strategy,
    pub correct: usize,
    pub total: usize,
}

impl StrategyTally {
    /// Fraction of tasks with a Correct verdict; 0 for an empty run
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Count Correct verdicts per strategy, in evaluation order
pub fn aggregate_results(rows: &[ResultRow]) -> Vec<StrategyTally> {
    Strategy::ALL
        .iter()
        .map(|&strategy| StrategyTally {
            strategy,
            correct: rows
                .iter()
                .filter(|row| row.result(strategy).verdict.is_correct())
                .count(),
            total: rows.len(),
        })
        .collect()
}

/// 0/1 outcome vector of one strategy, in row order
pub fn outcome_indicators(rows: &[ResultRow], strategy: Strategy) -> Vec<f64> {
    rows.iter()
        .map(|row| row.result(strategy).verdict.as_indicator())
        .collect()
}
