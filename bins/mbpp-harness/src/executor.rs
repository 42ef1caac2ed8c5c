/// Evaluation Orchestrator - High-Level Run Loop
///
/// **Responsibility:**
/// For each sampled task, in order, ask the producer for one candidate per
/// strategy, score each candidate with the Test Runner, and collect one
/// `ResultRow` per task.
///
/// **Architecture:**
/// 1. Producers generate code (producer/)
/// 2. Test Runner turns a candidate + tests into a verdict (evaluator.rs)
/// 3. Rows accumulate in sampled order for the Reporter (reporter.rs)
///
/// This module is the glue layer - it knows nothing about:
/// - How code executes (engine's job)
/// - How verdicts are reached (evaluator's job)
///
/// **Failure policy:**
/// Candidate failures are data (Error verdicts). Producer failures are fatal
/// and abort the run.

use crate::engine::ExecutionEngine;
use crate::evaluator::evaluate_test_list;
use crate::producer::{self, CodeProducer};
use anyhow::{Context, Result};
use mbpp_common::types::{ResultRow, Strategy, StrategyResult, Task};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Generate and score one strategy's candidate for `task`
///
/// Each call scores in its own scope, so strategies cannot observe each other.
async fn score_strategy(
    strategy: Strategy,
    task: &Task,
    producer: &dyn CodeProducer,
    engine: &dyn ExecutionEngine,
) -> Result<StrategyResult> {
    let candidate = producer::produce(producer, strategy, &task.prompt, &task.reference_code)
        .await
        .with_context(|| {
            format!(
                "Producer '{}' failed on task {} ({})",
                producer.name(),
                task.task_id,
                strategy
            )
        })?;

    let start = Instant::now();
    let outcome = evaluate_test_list(
        engine,
        &candidate.code,
        &task.test_list,
        &task.test_setup_code,
    )
    .await;

    match &outcome.failure {
        None => info!(
            task_id = task.task_id,
            strategy = %strategy,
            steps = outcome.steps_executed,
            execution_ms = start.elapsed().as_millis() as u64,
            "Candidate passed"
        ),
        Some(failure) => warn!(
            task_id = task.task_id,
            strategy = %strategy,
            stage = %failure.stage,
            error = %failure.error,
            execution_ms = start.elapsed().as_millis() as u64,
            "Candidate failed"
        ),
    }

    Ok(StrategyResult {
        code: candidate.code,
        verdict: outcome.verdict,
        comment: candidate.comment,
    })
}

/// Evaluate every task with all three strategies, in sampled order
#[instrument(skip_all, fields(tasks = tasks.len(), producer = producer.name()))]
pub async fn evaluate_tasks(
    tasks: &[Task],
    producer: &dyn CodeProducer,
    engine: &dyn ExecutionEngine,
) -> Result<Vec<ResultRow>> {
    let mut results = Vec::with_capacity(tasks.len());

    for (index, task) in tasks.iter().enumerate() {
        println!("Evaluating Task {}/{}: {}", index + 1, tasks.len(), task.prompt);

        if task.test_list.is_empty() {
            warn!(task_id = task.task_id, "Task has no test expressions");
        }

        let write_code = score_strategy(Strategy::WriteCode, task, producer, engine).await?;
        let advanced_writing =
            score_strategy(Strategy::AdvancedWriting, task, producer, engine).await?;
        let advanced_writing_v2 =
            score_strategy(Strategy::AdvancedWritingV2, task, producer, engine).await?;

        results.push(ResultRow {
            task_id: task.task_id,
            prompt: task.prompt.clone(),
            reference_code: task.reference_code.clone(),
            test_list: task.test_list.clone(),
            write_code,
            advanced_writing,
            advanced_writing_v2,
        });

        println!("Task {} evaluation complete.", task.task_id);
        println!();
    }

    info!(rows = results.len(), "All tasks evaluated");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;
    use crate::producer::ReferenceProducer;
    use anyhow::bail;
    use async_trait::async_trait;
    use mbpp_common::dataset::{DatasetRow, TestList};
    use mbpp_common::types::{Candidate, Verdict};
    use std::sync::Mutex;

    fn task(task_id: i64, code: &str, tests: &[&str]) -> Task {
        Task {
            task_id,
            prompt: format!("prompt {}", task_id),
            reference_code: code.to_string(),
            test_list: tests.iter().map(|t| t.to_string()).collect(),
            test_setup_code: String::new(),
        }
    }

    /// Answers each strategy with a fixed source and records every call
    struct FixedProducer {
        write_code: String,
        advanced_writing: String,
        advanced_writing_v2: String,
        calls: Mutex<Vec<(i64, Strategy)>>,
    }

    impl FixedProducer {
        fn new(a: &str, b: &str, c: &str) -> Self {
            Self {
                write_code: a.to_string(),
                advanced_writing: b.to_string(),
                advanced_writing_v2: c.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, prompt: &str, strategy: Strategy) {
            let id = prompt.trim_start_matches("prompt ").parse().unwrap_or(-1);
            self.calls.lock().unwrap().push((id, strategy));
        }
    }

    #[async_trait]
    impl CodeProducer for FixedProducer {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn write_code(&self, prompt: &str, _reference: &str) -> Result<Candidate> {
            self.record(prompt, Strategy::WriteCode);
            Ok(Candidate {
                code: self.write_code.clone(),
                comment: "wc".to_string(),
            })
        }

        async fn advanced_writing(&self, prompt: &str, _reference: &str) -> Result<Candidate> {
            self.record(prompt, Strategy::AdvancedWriting);
            Ok(Candidate {
                code: self.advanced_writing.clone(),
                comment: "aw".to_string(),
            })
        }

        async fn advanced_writing_v2(&self, prompt: &str, _reference: &str) -> Result<Candidate> {
            self.record(prompt, Strategy::AdvancedWritingV2);
            Ok(Candidate {
                code: self.advanced_writing_v2.clone(),
                comment: "aw2".to_string(),
            })
        }
    }

    struct FailingProducer;

    #[async_trait]
    impl CodeProducer for FailingProducer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn write_code(&self, _prompt: &str, _reference: &str) -> Result<Candidate> {
            bail!("upstream unavailable")
        }

        async fn advanced_writing(&self, _prompt: &str, _reference: &str) -> Result<Candidate> {
            bail!("upstream unavailable")
        }

        async fn advanced_writing_v2(&self, _prompt: &str, _reference: &str) -> Result<Candidate> {
            bail!("upstream unavailable")
        }
    }

    #[tokio::test]
    async fn test_one_row_per_task_in_order() {
        let engine = ScriptedEngine::new();
        let tasks = vec![
            task(11, "define a", &["use a"]),
            task(4, "define b", &["use b"]),
            task(7, "define c", &["use c"]),
        ];

        let rows = evaluate_tasks(&tasks, &ReferenceProducer, &engine).await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.task_id).collect::<Vec<_>>(), vec![11, 4, 7]);
        for row in &rows {
            for strategy in Strategy::ALL {
                assert_eq!(row.result(strategy).verdict, Verdict::Correct);
            }
        }
    }

    #[tokio::test]
    async fn test_strategies_scored_independently() {
        let engine = ScriptedEngine::new();
        let producer = FixedProducer::new("define add", "raise SyntaxError: bad", "define add");
        let tasks = vec![task(2, "define add", &["use add"])];

        let rows = evaluate_tasks(&tasks, &producer, &engine).await.unwrap();
        let row = &rows[0];

        assert_eq!(row.write_code.verdict, Verdict::Correct);
        assert_eq!(
            row.advanced_writing.verdict,
            Verdict::Error("SyntaxError: bad".to_string())
        );
        // The third strategy's scope starts clean, and still passes on its own
        assert_eq!(row.advanced_writing_v2.verdict, Verdict::Correct);
        assert_eq!(row.advanced_writing.comment, "aw");
        assert_eq!(engine.scopes_opened(), 3);
    }

    #[tokio::test]
    async fn test_no_leakage_between_strategies() {
        let engine = ScriptedEngine::new();
        // Only the first strategy defines `add`; the others must not see it
        let producer = FixedProducer::new("define add", "define other", "define other");
        let tasks = vec![task(2, "define add", &["use add"])];

        let rows = evaluate_tasks(&tasks, &producer, &engine).await.unwrap();
        assert_eq!(rows[0].write_code.verdict, Verdict::Correct);
        assert!(!rows[0].advanced_writing.verdict.is_correct());
        assert!(!rows[0].advanced_writing_v2.verdict.is_correct());
    }

    #[tokio::test]
    async fn test_strategy_call_order() {
        let engine = ScriptedEngine::new();
        let producer = FixedProducer::new("define x", "define x", "define x");
        let tasks = vec![task(1, "", &[]), task(2, "", &[])];

        evaluate_tasks(&tasks, &producer, &engine).await.unwrap();

        let calls = producer.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (1, Strategy::WriteCode),
                (1, Strategy::AdvancedWriting),
                (1, Strategy::AdvancedWritingV2),
                (2, Strategy::WriteCode),
                (2, Strategy::AdvancedWriting),
                (2, Strategy::AdvancedWritingV2),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_test_list_still_emits_row() {
        let engine = ScriptedEngine::new();
        let malformed = DatasetRow {
            task_id: 5,
            text: "prompt 5".to_string(),
            code: "define f".to_string(),
            test_list: TestList::RawText("['use f'".to_string()),
            test_setup_code: String::new(),
        };
        let tasks = vec![malformed.into_task(), task(6, "define g", &["use g"])];

        let rows = evaluate_tasks(&tasks, &ReferenceProducer, &engine).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].task_id, 5);
        assert!(rows[0].test_list.is_empty());
        assert_eq!(rows[0].write_code.verdict, Verdict::Correct);
        assert_eq!(rows[1].task_id, 6);
    }

    #[tokio::test]
    async fn test_failing_candidate_does_not_abort_run() {
        let engine = ScriptedEngine::new();
        let tasks = vec![
            task(1, "raise RuntimeError: crash", &["use f"]),
            task(2, "define g", &["use g"]),
        ];

        let rows = evaluate_tasks(&tasks, &ReferenceProducer, &engine).await.unwrap();
        assert_eq!(
            rows[0].write_code.verdict,
            Verdict::Error("RuntimeError: crash".to_string())
        );
        assert_eq!(rows[1].write_code.verdict, Verdict::Correct);
    }

    #[tokio::test]
    async fn test_producer_failure_is_fatal() {
        let engine = ScriptedEngine::new();
        let tasks = vec![task(1, "define f", &[])];

        let err = evaluate_tasks(&tasks, &FailingProducer, &engine)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("upstream unavailable"));
        assert_eq!(engine.scopes_opened(), 0);
    }
}
