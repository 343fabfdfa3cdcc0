use tracing::info;

use crate::state::Context;

/// Forget this channel's conversation history
#[poise::command(slash_command, guild_only)]
pub async fn reset(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let channel = ctx.channel_id().get();
    let had_history = ctx.data().conversations.reset(channel).await;
    info!(channel, had_history, "conversation reset");

    let reply = if had_history {
        "Conversation history cleared."
    } else {
        "No conversation history to clear."
    };
    ctx.say(reply).await?;
    Ok(())
}
