/// Reporter - Persist and Summarize a Run
///
/// Writes the result table as CSV (one row per task, 13 columns), reads it
/// back for offline reports, and prints per-strategy correctness, the
/// Write Code vs Advanced Writing t-test and a bar chart.

use crate::chart;
use crate::evaluator::{aggregate_results, outcome_indicators, StrategyTally};
use crate::stats::{ttest_ind, TTestResult};
use anyhow::{Context, Result};
use mbpp_common::dataset::TestList;
use mbpp_common::literal;
use mbpp_common::types::{ResultRow, Strategy, StrategyResult, Verdict};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub const CHART_TITLE: &str = "Correctness Rate Comparison of Different Methods";
pub const REFERENCE_RATE: f64 = 0.5;

/// Flat CSV layout; field order is column order
#[derive(Debug, Serialize, Deserialize)]
struct CsvRecord {
    task_id: i64,
    prompt: String,
    ground_truth_code: String,
    test_list: String,
    write_code_output: String,
    write_code_correctness: String,
    write_code_comment: String,
    advanced_writing_output: String,
    advanced_writing_correctness: String,
    advanced_writing_comment: String,
    advanced_writing_v2_output: String,
    advanced_writing_v2_correctness: String,
    advanced_writing_v2_comment: String,
}

impl From<&ResultRow> for CsvRecord {
    fn from(row: &ResultRow) -> Self {
        Self {
            task_id: row.task_id,
            prompt: row.prompt.clone(),
            ground_truth_code: row.reference_code.clone(),
            test_list: literal::format_string_list(&row.test_list),
            write_code_output: row.write_code.code.clone(),
            write_code_correctness: row.write_code.verdict.to_string(),
            write_code_comment: row.write_code.comment.clone(),
            advanced_writing_output: row.advanced_writing.code.clone(),
            advanced_writing_correctness: row.advanced_writing.verdict.to_string(),
            advanced_writing_comment: row.advanced_writing.comment.clone(),
            advanced_writing_v2_output: row.advanced_writing_v2.code.clone(),
            advanced_writing_v2_correctness: row.advanced_writing_v2.verdict.to_string(),
            advanced_writing_v2_comment: row.advanced_writing_v2.comment.clone(),
        }
    }
}

fn strategy_result(code: String, correctness: &str, comment: String) -> StrategyResult {
    let verdict = correctness
        .parse::<Verdict>()
        .unwrap_or_else(|never| match never {});
    StrategyResult {
        code,
        verdict,
        comment,
    }
}

impl From<CsvRecord> for ResultRow {
    fn from(record: CsvRecord) -> Self {
        let test_list = TestList::RawText(record.test_list).normalize(record.task_id);
        Self {
            task_id: record.task_id,
            prompt: record.prompt,
            reference_code: record.ground_truth_code,
            test_list,
            write_code: strategy_result(
                record.write_code_output,
                &record.write_code_correctness,
                record.write_code_comment,
            ),
            advanced_writing: strategy_result(
                record.advanced_writing_output,
                &record.advanced_writing_correctness,
                record.advanced_writing_comment,
            ),
            advanced_writing_v2: strategy_result(
                record.advanced_writing_v2_output,
                &record.advanced_writing_v2_correctness,
                record.advanced_writing_v2_comment,
            ),
        }
    }
}

/// Write every row to `path`, header first
pub fn save_results_to_csv(rows: &[ResultRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for row in rows {
        writer
            .serialize(CsvRecord::from(row))
            .with_context(|| format!("Failed to write row for task {}", row.task_id))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    info!(path = %path.display(), rows = rows.len(), "Results persisted");
    println!("Results saved to {}", path.display());
    Ok(())
}

/// Read a results file written by [`save_results_to_csv`]
pub fn load_results_from_csv(path: &Path) -> Result<Vec<ResultRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize::<CsvRecord>().enumerate() {
        let record = record.with_context(|| {
            format!("Failed to parse record {} of {}", idx + 1, path.display())
        })?;
        rows.push(ResultRow::from(record));
    }
    Ok(rows)
}

/// Aggregate statistics of a run
#[derive(Debug, Clone)]
pub struct Summary {
    pub total: usize,
    pub tallies: Vec<StrategyTally>,
    /// Write Code vs Advanced Writing
    pub ttest: TTestResult,
}

pub fn summarize(rows: &[ResultRow]) -> Summary {
    Summary {
        total: rows.len(),
        tallies: aggregate_results(rows),
        ttest: ttest_ind(
            &outcome_indicators(rows, Strategy::WriteCode),
            &outcome_indicators(rows, Strategy::AdvancedWriting),
        ),
    }
}

impl Summary {
    /// Console lines, one per strategy, then the t-test line
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec!["Summary of Results:".to_string()];
        for tally in &self.tallies {
            lines.push(format!(
                "{} Correctness: {}/{} ({:.2}%)",
                tally.strategy.label(),
                tally.correct,
                tally.total,
                tally.rate() * 100.0
            ));
        }
        lines.push(format!(
            "T-test between {} and {}: t-statistic = {}, p-value = {}",
            Strategy::WriteCode.label(),
            Strategy::AdvancedWriting.label(),
            self.ttest.statistic,
            self.ttest.p_value
        ));
        lines
    }

    pub fn chart(&self, width: usize) -> String {
        let bars: Vec<(&str, f64)> = self
            .tallies
            .iter()
            .map(|tally| (tally.strategy.label(), tally.rate()))
            .collect();
        chart::render_bar_chart(CHART_TITLE, &bars, REFERENCE_RATE, width)
    }
}

/// Print summary, t-test and chart for `rows`
pub fn report(rows: &[ResultRow], chart_width: usize) -> Summary {
    let summary = summarize(rows);

    for line in summary.lines() {
        println!("{}", line);
    }
    println!();
    print!("{}", summary.chart(chart_width));

    info!(
        tasks = summary.total,
        t_statistic = summary.ttest.statistic,
        p_value = summary.ttest.p_value,
        "Report complete"
    );
    summary
}
