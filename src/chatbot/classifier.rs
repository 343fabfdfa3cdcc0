use std::sync::Arc;

use tracing::{debug, warn};

use super::prompts;
use crate::llm::ChatModel;
use crate::outcome::Outcome;

/// Substrings that suggest a question is about on-chain state.
pub const LIVE_DATA_KEYWORDS: &[&str] = &[
    "current",
    "live",
    "now",
    "today",
    "active",
    "available",
    "markets",
    "price",
    "volume",
    "liquidity",
    "settled",
    "resolved",
    "winning",
    "outcome",
    "status",
    "odds",
    "testnet",
    "contract",
    "blockchain",
    "on-chain",
    "expir",
];

/// Case-insensitive substring match against [`LIVE_DATA_KEYWORDS`].
pub fn keyword_match(question: &str) -> bool {
    let lower = question.to_lowercase();
    LIVE_DATA_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// `YES` (after trim + uppercase) is true, anything else false.
pub fn parse_verdict(reply: &str) -> bool {
    reply.trim().to_uppercase() == "YES"
}

/// Decides whether a question needs a live chain read.
pub struct LiveDataClassifier {
    llm: Arc<dyn ChatModel>,
}

impl LiveDataClassifier {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, question: &str) -> bool {
        let outcome = self.classify_outcome(question).await;
        if let Some(reason) = outcome.reason() {
            warn!(reason, "live-data classifier fell back to keywords");
        }
        outcome.into_value()
    }

    pub async fn classify_outcome(&self, question: &str) -> Outcome<bool> {
        let reply = self.llm.sub_query(&prompts::classifier_prompt(question)).await;
        if let Ok(reply) = &reply {
            debug!(reply = reply.trim(), "classifier verdict");
        }
        Outcome::from_result(reply.map(|r| parse_verdict(&r)), || keyword_match(question))
    }
}
