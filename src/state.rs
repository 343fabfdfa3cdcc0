use std::sync::Arc;

use crate::chatbot::Chatbot;
use crate::conversation::ConversationStore;

pub struct AppState {
    pub chatbot: Arc<Chatbot>,
    pub conversations: Arc<ConversationStore>,
    /// Message prefix that addresses the bot, e.g. `!xo`.
    pub prefix: String,
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;
