/// Task Sampler - Load the MBPP Table and Draw a Seeded Sample
///
/// Rows come either from the Hugging Face datasets-server (paged) or from a
/// local JSON Lines / JSON array file filtered to the configured split by
/// task id. Sampling is without replacement,
/// seeded, and keeps the sampled order; positions are re-indexed 0..N.

use anyhow::{bail, Context, Result};
use mbpp_common::config::{DatasetSettings, DatasetSourceKind, SamplingSettings};
use mbpp_common::dataset::{self, DatasetRow};
use mbpp_common::types::Task;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Largest page the datasets-server rows endpoint serves
const HUB_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct HubRow {
    row: DatasetRow,
}

#[derive(Debug, Deserialize)]
struct HubRowsPage {
    rows: Vec<HubRow>,
    num_rows_total: usize,
}

/// Parse rows from file contents: a JSON array, or one JSON object per line
pub fn parse_rows(content: &str) -> Result<Vec<DatasetRow>> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).context("Failed to parse dataset JSON array");
    }

    let mut rows = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: DatasetRow = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse dataset row on line {}", idx + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn read_rows_file(path: &Path) -> Result<Vec<DatasetRow>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset file {}", path.display()))?;
    parse_rows(&content)
}

/// Accumulates rows page by page until the advertised total has arrived
#[derive(Debug, Default)]
struct HubRowCollector {
    rows: Vec<DatasetRow>,
}

impl HubRowCollector {
    fn offset(&self) -> usize {
        self.rows.len()
    }

    /// Absorb one page; `true` once every row of the split is in
    fn absorb(&mut self, page: HubRowsPage) -> Result<bool> {
        if page.rows.is_empty() {
            if self.rows.len() < page.num_rows_total {
                bail!(
                    "Dataset server returned an empty page at offset {} of {} rows",
                    self.rows.len(),
                    page.num_rows_total
                );
            }
            return Ok(true);
        }
        self.rows.extend(page.rows.into_iter().map(|r| r.row));
        Ok(self.rows.len() >= page.num_rows_total)
    }
}

async fn fetch_hub_rows(settings: &DatasetSettings) -> Result<Vec<DatasetRow>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;
    let url = format!("{}/rows", settings.hub_url.trim_end_matches('/'));

    let mut collector = HubRowCollector::default();
    loop {
        let offset = collector.offset().to_string();
        let length = HUB_PAGE_SIZE.to_string();
        let response = client
            .get(&url)
            .query(&[
                ("dataset", settings.name.as_str()),
                ("config", settings.config.as_str()),
                ("split", settings.split.as_str()),
                ("offset", offset.as_str()),
                ("length", length.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to reach dataset server at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Dataset server returned {}: {}", status, body.trim());
        }

        let page: HubRowsPage = response
            .json()
            .await
            .context("Failed to decode dataset rows page")?;

        debug!(offset = %offset, received = page.rows.len(), total = page.num_rows_total, "Fetched rows page");

        if collector.absorb(page)? {
            break;
        }
    }

    Ok(collector.rows)
}

/// Keep the rows that belong to `split`
///
/// File dumps carry every split of the table; the hub serves one split only.
pub fn select_split(rows: Vec<DatasetRow>, split: &str) -> Result<Vec<DatasetRow>> {
    let ids = dataset::split_task_ids(split)
        .with_context(|| format!("Unknown dataset split '{}'", split))?;
    let total = rows.len();
    let selected: Vec<DatasetRow> = rows
        .into_iter()
        .filter(|row| ids.contains(&row.task_id))
        .collect();

    if selected.len() < total {
        info!(
            split,
            kept = selected.len(),
            dropped = total - selected.len(),
            "Filtered file rows to split"
        );
    }
    Ok(selected)
}

/// Load every row of the configured split
pub async fn load_rows(settings: &DatasetSettings) -> Result<Vec<DatasetRow>> {
    let rows = match settings.source {
        DatasetSourceKind::File => {
            let path = settings
                .path
                .as_deref()
                .context("dataset.path is required for file datasets")?;
            info!(path = %path.display(), split = %settings.split, "Loading dataset from file");
            select_split(read_rows_file(path)?, &settings.split)?
        }
        DatasetSourceKind::Hub => {
            info!(
                dataset = %settings.name,
                config = %settings.config,
                split = %settings.split,
                "Loading dataset from hub"
            );
            fetch_hub_rows(settings).await?
        }
    };

    info!(rows = rows.len(), "Dataset loaded");
    Ok(rows)
}

/// Draw `sample_size` rows without replacement, seeded by `seed`
///
/// The returned tasks are in sampled order. Test lists are normalized here,
/// once, so a malformed one is logged against its task id and becomes empty.
pub fn sample_tasks(rows: &[DatasetRow], sample_size: usize, seed: u64) -> Result<Vec<Task>> {
    if sample_size > rows.len() {
        bail!(
            "Cannot take a sample of {} tasks from a table of {} rows",
            sample_size,
            rows.len()
        );
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let picked = rand::seq::index::sample(&mut rng, rows.len(), sample_size);

    Ok(picked
        .into_iter()
        .map(|idx| rows[idx].clone().into_task())
        .collect())
}

/// Load the dataset and sample tasks for one run
pub async fn load_sampled_tasks(
    dataset: &DatasetSettings,
    sampling: &SamplingSettings,
) -> Result<Vec<Task>> {
    let rows = load_rows(dataset).await?;
    let tasks = sample_tasks(&rows, sampling.sample_size, sampling.seed)?;

    info!(sample_size = tasks.len(), seed = sampling.seed, "Sampled tasks");
    for (idx, task) in tasks.iter().take(5).enumerate() {
        info!(
            position = idx,
            task_id = task.task_id,
            tests = task.test_list.len(),
            prompt = %task.prompt,
            "Sampled task"
        );
    }
    Ok(tasks)
}
