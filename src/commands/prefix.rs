use poise::serenity_prelude as serenity;
use tracing::{info, warn};

use super::ask::{greeting, respond};
use crate::state::AppState;

/// Answers plain channel messages that start with the configured prefix.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, AppState, anyhow::Error>,
    data: &AppState,
) -> Result<(), anyhow::Error> {
    let serenity::FullEvent::Message { new_message } = event else {
        return Ok(());
    };
    if new_message.author.bot {
        return Ok(());
    }
    let Some(question) = strip_prefix(&new_message.content, &data.prefix) else {
        return Ok(());
    };

    if question.is_empty() {
        new_message.reply(ctx, greeting(&data.prefix)).await?;
        return Ok(());
    }

    if let Err(e) = new_message.channel_id.broadcast_typing(&ctx.http).await {
        warn!(error = %e, "failed to send typing indicator");
    }
    info!(user = %new_message.author.name, question, "prefix question received");

    let reply = respond(data, new_message.channel_id.get(), question).await;
    new_message.reply(ctx, reply).await?;
    Ok(())
}

/// The trimmed question after `prefix`, if the message addresses the bot.
/// The prefix must stand alone, so `!xoxo` is not a match for `!xo`.
pub fn strip_prefix<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}
