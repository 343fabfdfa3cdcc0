//! XO Market Expert: a retrieval-augmented assistant for XO Market that
//! answers from indexed documentation and, when a question needs it, from
//! market state read live off the XO Market contract.
//!
//! Two surfaces share one chatbot core: a JSON/web HTTP server and a
//! Discord bot.

mod chatbot;
mod commands;
mod config;
mod conversation;
mod docs;
mod llm;
mod market;
mod outcome;
mod server;
mod state;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use poise::serenity_prelude as serenity;
use poise::{Framework, FrameworkOptions};
use tracing::{error, info};

use chatbot::Chatbot;
use config::Config;
use conversation::{ConversationStore, SWEEP_INTERVAL};
use state::AppState;

#[derive(Parser)]
#[command(name = "xo-market-expert")]
#[command(about = "Question answering over XO Market docs and live market data")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the chat API and web page (default)
    Serve {
        /// Address to bind, overrides HTTP_BIND
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Run the Discord bot
    Discord,
    /// Answer a single question and exit
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loaded first so RUST_LOG in .env reaches the filter.
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,xo_market_expert=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.http_bind.clone());
            let chatbot = Arc::new(Chatbot::new(config));
            server::serve(&bind, chatbot).await
        }
        Command::Discord => run_discord(config).await,
        Command::Ask { question } => ask_once(config, &question.join(" ")).await,
    }
}

async fn ask_once(config: Config, question: &str) -> anyhow::Result<()> {
    let chatbot = Chatbot::new(config);
    let response = chatbot.ask(question, &[]).await?;

    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!("\nSources:");
        for (i, source) in response.sources.iter().enumerate() {
            println!("{}. {} ({})", i + 1, source.title, source.source);
        }
    }
    println!("\nResponse time: {}ms", response.response_time);
    Ok(())
}

async fn run_discord(config: Config) -> anyhow::Result<()> {
    let token = config
        .discord
        .token
        .clone()
        .context("DISCORD_TOKEN required for discord mode")?;
    let guild_id = config.discord.guild_id.map(serenity::GuildId::new);
    let prefix = config.discord.prefix.clone();

    let conversations = Arc::new(ConversationStore::default());
    conversations.clone().spawn_sweeper(SWEEP_INTERVAL);

    let app_state = AppState {
        chatbot: Arc::new(Chatbot::new(config)),
        conversations,
        prefix,
    };

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![commands::xo()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(commands::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!(user = %ready.user.name, id = %ready.user.id, "bot connected");

                if let Some(gid) = guild_id {
                    info!(guild = %gid, "registering commands in guild");
                    poise::builtins::register_in_guild(ctx, &framework.options().commands, gid)
                        .await?;
                } else {
                    info!("registering commands globally (up to 1 hour delay)");
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                }

                Ok(app_state)
            })
        })
        .build();

    info!("starting XO Market Expert Discord bot");

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    if let Err(e) = client.start().await {
        error!(error = %e, "client error");
    }

    Ok(())
}
