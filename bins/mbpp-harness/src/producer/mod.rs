//! Code Producers - generate candidate solutions for a task
//!
//! A producer exposes one entry point per strategy. The orchestrator keeps a
//! single producer for the whole run and calls it through `&self`, so
//! implementations hold no per-task state.

mod chat;
mod reference;

pub use chat::ChatProducer;
pub use reference::ReferenceProducer;

use anyhow::Result;
use async_trait::async_trait;
use mbpp_common::config::{ProducerKind, ProducerSettings};
use mbpp_common::types::{Candidate, Strategy};

#[async_trait]
pub trait CodeProducer: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Single-shot generation
    async fn write_code(&self, prompt: &str, reference: &str) -> Result<Candidate>;

    /// Plan first, then implement the plan
    async fn advanced_writing(&self, prompt: &str, reference: &str) -> Result<Candidate>;

    /// Plan, implement, then review and repair the draft
    async fn advanced_writing_v2(&self, prompt: &str, reference: &str) -> Result<Candidate>;
}

/// Dispatch to the entry point of `strategy`
pub async fn produce(
    producer: &dyn CodeProducer,
    strategy: Strategy,
    prompt: &str,
    reference: &str,
) -> Result<Candidate> {
    match strategy {
        Strategy::WriteCode => producer.write_code(prompt, reference).await,
        Strategy::AdvancedWriting => producer.advanced_writing(prompt, reference).await,
        Strategy::AdvancedWritingV2 => producer.advanced_writing_v2(prompt, reference).await,
    }
}

pub fn build_producer(settings: &ProducerSettings) -> Result<Box<dyn CodeProducer>> {
    Ok(match settings.kind {
        ProducerKind::Chat => Box::new(ChatProducer::new(settings)?),
        ProducerKind::Reference => Box::new(ReferenceProducer),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_produce_dispatches_each_strategy() {
        let producer = ReferenceProducer;
        for strategy in Strategy::ALL {
            let candidate = produce(&producer, strategy, "prompt", "def f(): pass")
                .await
                .unwrap();
            assert_eq!(candidate.code, "def f(): pass");
            assert!(candidate.comment.contains(strategy.label()));
        }
    }

    #[test]
    fn test_build_reference_producer() {
        let settings = ProducerSettings {
            kind: ProducerKind::Reference,
            ..ProducerSettings::default()
        };
        assert_eq!(build_producer(&settings).unwrap().name(), "reference");
    }

    #[test]
    fn test_build_chat_producer_requires_key() {
        let settings = ProducerSettings {
            kind: ProducerKind::Chat,
            api_key_env: "MBPP_HARNESS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ProducerSettings::default()
        };
        assert!(build_producer(&settings).is_err());
    }
}
