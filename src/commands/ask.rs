use std::fmt::Write as _;

use tracing::{error, info};

use crate::chatbot::ChatResponse;
use crate::state::{AppState, Context};

/// Discord's per-message character limit.
pub const MAX_MESSAGE_LENGTH: usize = 2000;
const ELLIPSIS: &str = "...";
const ERROR_REPLY: &str =
    "Sorry, I encountered an error while processing your question. Please try again later.";

/// Ask the XO Market Expert a question
#[poise::command(slash_command, guild_only)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Your question about XO Market"] question: String,
) -> Result<(), anyhow::Error> {
    let question = question.trim();
    if question.is_empty() {
        ctx.say(greeting(&ctx.data().prefix)).await?;
        return Ok(());
    }

    // Answers can take a while; keep the interaction alive.
    ctx.defer().await?;
    info!(user = %ctx.author().name, question, "slash question received");

    let reply = respond(ctx.data(), ctx.channel_id().get(), question).await;
    ctx.say(reply).await?;
    Ok(())
}

pub fn greeting(prefix: &str) -> String {
    format!(
        "Hello! I'm the XO Market Expert. Ask me anything about XO Market! Use `{} <your question>` to get started.",
        prefix
    )
}

/// Answer `question` in the context of `channel`'s conversation and return
/// the Discord-ready reply text.
pub async fn respond(state: &AppState, channel: u64, question: &str) -> String {
    let history = state.conversations.begin(channel).await;

    match state.chatbot.ask(question, &history).await {
        Ok(response) => {
            state
                .conversations
                .record(channel, question, &response.answer)
                .await;
            info!(
                channel,
                response_time = response.response_time,
                sources = response.sources.len(),
                "discord answer ready"
            );
            truncate_message(&render_reply(&response), MAX_MESSAGE_LENGTH)
        }
        Err(e) => {
            error!(channel, error = %e, "discord question failed");
            ERROR_REPLY.to_string()
        }
    }
}

/// Answer, numbered source list, and response time footer.
pub fn render_reply(response: &ChatResponse) -> String {
    let mut out = response.answer.clone();
    if !response.sources.is_empty() {
        out.push_str("\n\n**Sources:**");
        for (i, source) in response.sources.iter().enumerate() {
            let _ = write!(out, "\n{}. {} ({})", i + 1, source.title, source.source);
        }
    }
    let _ = write!(out, "\n\n*Response time: {}ms*", response.response_time);
    out
}

/// Fit `message` into `max` characters. Prefers to cut just after the last
/// sentence end or newline when that keeps more than 80% of the budget.
pub fn truncate_message(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        return message.to_string();
    }

    let budget = max.saturating_sub(ELLIPSIS.len());
    let end = message
        .char_indices()
        .nth(budget)
        .map(|(i, _)| i)
        .unwrap_or(message.len());
    let head = &message[..end];

    match head.rfind(|c| c == '.' || c == '\n') {
        Some(cut) if head[..cut].chars().count() > max * 4 / 5 => {
            format!("{}{}", &head[..=cut], ELLIPSIS)
        }
        _ => format!("{}{}", head, ELLIPSIS),
    }
}
