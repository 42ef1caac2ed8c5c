use crate::literal::{self, LiteralError};
use crate::types::Task;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::warn;

/// Dataset identity - the harness always benchmarks against this table
pub const DATASET_NAME: &str = "google-research-datasets/mbpp";
pub const DATASET_CONFIG: &str = "full";
pub const DATASET_SPLIT: &str = "train";

/// Task ids of each split of the `full` configuration
///
/// Local dumps such as `mbpp.jsonl` hold every split in one file, so rows
/// are assigned to a split by id.
pub fn split_task_ids(split: &str) -> Option<RangeInclusive<i64>> {
    match split {
        "prompt" => Some(1..=10),
        "test" => Some(11..=510),
        "validation" => Some(511..=600),
        "train" => Some(601..=974),
        _ => None,
    }
}

/// `test_list` as it arrives from the dataset
///
/// Hub exports carry a real sequence, CSV and older dumps carry the Python
/// `repr()` of the list. Resolved once, at ingestion, by [`TestList::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestList {
    Structured(Vec<String>),
    RawText(String),
}

impl Default for TestList {
    fn default() -> Self {
        TestList::Structured(Vec::new())
    }
}

impl TestList {
    /// Resolve into test expressions, propagating literal errors
    pub fn try_normalize(&self) -> Result<Vec<String>, LiteralError> {
        match self {
            TestList::Structured(tests) => Ok(tests.clone()),
            TestList::RawText(text) if text.trim().is_empty() => Ok(Vec::new()),
            TestList::RawText(text) => literal::parse_string_list(text),
        }
    }

    /// Resolve into test expressions; an unreadable literal degrades to no tests
    pub fn normalize(&self, task_id: i64) -> Vec<String> {
        match self.try_normalize() {
            Ok(tests) => tests,
            Err(e) => {
                warn!(task_id, error = %e, "Error evaluating test_list; falling back to empty list");
                Vec::new()
            }
        }
    }
}

/// One row of the MBPP table, fields named as upstream names them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub task_id: i64,
    pub text: String,
    pub code: String,
    #[serde(default)]
    pub test_list: TestList,
    #[serde(default)]
    pub test_setup_code: String,
}

impl DatasetRow {
    /// Convert into an immutable [`Task`], normalizing the test list
    pub fn into_task(self) -> Task {
        let test_list = self.test_list.normalize(self.task_id);
        Task {
            task_id: self.task_id,
            prompt: self.text,
            reference_code: self.code,
            test_list,
            test_setup_code: self.test_setup_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ranges_cover_full_config() {
        assert_eq!(split_task_ids("train"), Some(601..=974));
        assert!(split_task_ids("test").unwrap().contains(&11));
        assert!(!split_task_ids("train").unwrap().contains(&600));
        assert_eq!(split_task_ids("Train"), None);
        let total: usize = ["prompt", "test", "validation", "train"]
            .iter()
            .map(|s| split_task_ids(s).unwrap().count())
            .sum();
        assert_eq!(total, 974);
    }

    #[test]
    fn test_row_with_structured_tests() {
        let json = r#"{
            "task_id": 11,
            "text": "Write a python function to remove first and last occurrence of a given character from the string.",
            "code": "def remove_Occ(s,ch): ...",
            "test_list": ["assert remove_Occ(\"hello\",\"l\") == \"heo\""],
            "test_setup_code": "",
            "challenge_test_list": []
        }"#;
        let row: DatasetRow = serde_json::from_str(json).unwrap();
        assert!(matches!(row.test_list, TestList::Structured(_)));

        let task = row.into_task();
        assert_eq!(task.task_id, 11);
        assert_eq!(task.test_list, vec!["assert remove_Occ(\"hello\",\"l\") == \"heo\""]);
    }

    #[test]
    fn test_row_with_literal_tests() {
        let json = r#"{
            "task_id": 2,
            "text": "sum",
            "code": "def add(a,b): return a+b",
            "test_list": "['assert add(2,3)==5', 'assert add(0,0)==0']"
        }"#;
        let row: DatasetRow = serde_json::from_str(json).unwrap();
        assert!(matches!(row.test_list, TestList::RawText(_)));
        assert_eq!(row.test_setup_code, "");

        let task = row.into_task();
        assert_eq!(task.test_list, vec!["assert add(2,3)==5", "assert add(0,0)==0"]);
    }

    #[test]
    fn test_malformed_literal_degrades_to_empty() {
        let list = TestList::RawText("['assert add(2,3)==5'".to_string());
        assert!(list.try_normalize().is_err());
        assert!(list.normalize(7).is_empty());
    }

    #[test]
    fn test_blank_literal_is_empty() {
        assert!(TestList::RawText("   ".to_string()).try_normalize().unwrap().is_empty());
        assert!(TestList::default().normalize(1).is_empty());
    }
}
