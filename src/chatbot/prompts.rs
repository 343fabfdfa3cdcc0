pub const SYSTEM_PROMPT: &str = r#"You are the XO Market Expert, an assistant for the XO Market decentralized prediction market platform.

You help users understand XO Market's features, how markets are created, traded and resolved, and what is happening on chain right now.

Guidelines:
1. Be clear and concise.
2. Ground every claim in the documentation excerpts provided, and cite them as [Source: Document Title - Section].
3. When live market data is included, refer to markets by their ID and use the numbers exactly as given. Never invent prices, liquidity or volume.
4. If the excerpts do not answer the question, say so rather than guessing.
5. Prefer XO Market specifics over general blockchain explanations.
6. Keep a friendly, professional tone."#;

pub const APOLOGY: &str = "I apologize, but I encountered an error while processing your question. Please try again or contact support if the issue persists.";

const CLASSIFIER_TEMPLATE: &str = r#"Decide whether answering the question below requires LIVE data read from the blockchain right now (current markets, prices, odds, liquidity, volume, market status, resolutions, winners), or whether static documentation is enough.

Answer with exactly one word: YES or NO.

Question: What is XO Market?
Answer: NO

Question: What are the current active markets?
Answer: YES

Question: How do I create a market?
Answer: NO

Question: What is the price of YES in market 3?
Answer: YES

Question: How are trading fees calculated?
Answer: NO

Question: Has market 12 been resolved yet?
Answer: YES

Question: {question}
Answer:"#;

const RANGE_TEMPLATE: &str = r#"Markets on XO Market are numbered with integer IDs starting at 1.
Which market IDs does the question below refer to?

Reply with exactly one of:
- ALL          (no specific market is mentioned)
- N            (a single market ID, e.g. 7)
- START-END    (an inclusive range, e.g. 3-9)

No other words.

Question: {question}
Reply:"#;

const CONDENSE_TEMPLATE: &str = r#"Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question.

Chat History:
{history}
Follow Up Input: {question}
Standalone question:"#;

const QA_TEMPLATE: &str = r#"Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:"#;

pub fn classifier_prompt(question: &str) -> String {
    CLASSIFIER_TEMPLATE.replace("{question}", question.trim())
}

pub fn range_hint_prompt(question: &str) -> String {
    RANGE_TEMPLATE.replace("{question}", question.trim())
}

pub fn condense_prompt(history: &[String], question: &str) -> String {
    CONDENSE_TEMPLATE
        .replace("{history}", &history.join("\n"))
        .replace("{question}", question)
}

pub fn qa_prompt(context: &str, question: &str) -> String {
    QA_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}
