mod ask;
mod manage;
mod prefix;

pub use prefix::event_handler;

use crate::state::Context;

/// XO Market Expert, answers questions about XO Market
#[poise::command(slash_command, subcommands("ask::ask", "manage::reset"))]
pub async fn xo(_ctx: Context<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}
