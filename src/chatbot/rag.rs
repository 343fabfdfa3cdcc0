use std::sync::Arc;

use tracing::debug;

use super::prompts;
use super::ChatError;
use crate::docs::{DocumentChunk, Retriever};
use crate::llm::{ChatModel, Message};

/// Model answer plus the chunks that were stuffed into its prompt.
#[derive(Debug, Clone)]
pub struct QaAnswer {
    pub text: String,
    pub source_documents: Vec<DocumentChunk>,
}

/// Conversational retrieval QA: condense the question against the history,
/// retrieve the top-k chunks, answer from them.
pub struct RetrievalQa {
    llm: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
    k: usize,
}

impl RetrievalQa {
    pub fn new(llm: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>, k: usize) -> Self {
        Self { llm, retriever, k }
    }

    /// Answer `question`. `live_data` is re-attached to the condensed
    /// question on follow-up turns; without history `question` already
    /// carries it.
    pub async fn call(
        &self,
        question: &str,
        history: &[String],
        live_data: Option<&str>,
    ) -> Result<QaAnswer, ChatError> {
        let standalone = if history.is_empty() {
            question.to_string()
        } else {
            let condensed = self
                .llm
                .chat(&[Message::user(prompts::condense_prompt(history, question))])
                .await?;
            debug!(condensed = condensed.as_str(), "condensed follow-up question");
            condensed
        };

        let docs = self.retriever.retrieve(&standalone, self.k).await?;
        let context = docs
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let qa_question = match live_data {
            Some(block) if !history.is_empty() => format!("{}\n\n{}", standalone, block),
            _ => standalone,
        };
        let messages = [
            Message::system(prompts::SYSTEM_PROMPT),
            Message::user(prompts::qa_prompt(&context, &qa_question)),
        ];
        let text = self.llm.chat(&messages).await?;

        Ok(QaAnswer {
            text,
            source_documents: docs,
        })
    }
}
