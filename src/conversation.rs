use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// History lines kept per conversation (10 exchanges).
pub const MAX_HISTORY: usize = 20;
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Keep only the most recent [`MAX_HISTORY`] lines.
pub fn trim_history(history: &mut Vec<String>) {
    if history.len() > MAX_HISTORY {
        history.drain(..history.len() - MAX_HISTORY);
    }
}

/// Append one exchange as `Human:` / `Assistant:` lines, then trim.
pub fn push_exchange(history: &mut Vec<String>, question: &str, answer: &str) {
    history.push(format!("Human: {}", question));
    history.push(format!("Assistant: {}", answer));
    trim_history(history);
}

struct ConversationState {
    history: Vec<String>,
    last_activity: Instant,
}

/// Per-channel conversation history for the chat-platform surface.
pub struct ConversationStore {
    channels: Mutex<HashMap<u64, ConversationState>>,
    idle_timeout: Duration,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(IDLE_TIMEOUT)
    }
}

impl ConversationStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Mark the channel active and return its history. A channel idle past
    /// the timeout starts over with an empty history.
    pub async fn begin(&self, channel: u64) -> Vec<String> {
        self.begin_at(channel, Instant::now()).await
    }

    async fn begin_at(&self, channel: u64, now: Instant) -> Vec<String> {
        let mut channels = self.channels.lock().await;
        let state = channels.entry(channel).or_insert_with(|| ConversationState {
            history: Vec::new(),
            last_activity: now,
        });
        if now.saturating_duration_since(state.last_activity) > self.idle_timeout {
            debug!(channel, "conversation idle, history reset");
            state.history.clear();
        }
        state.last_activity = now;
        state.history.clone()
    }

    pub async fn record(&self, channel: u64, question: &str, answer: &str) {
        let mut channels = self.channels.lock().await;
        let state = channels.entry(channel).or_insert_with(|| ConversationState {
            history: Vec::new(),
            last_activity: Instant::now(),
        });
        push_exchange(&mut state.history, question, answer);
    }

    pub async fn reset(&self, channel: u64) -> bool {
        self.channels.lock().await.remove(&channel).is_some()
    }

    /// Drop every channel idle past the timeout. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    async fn sweep_at(&self, now: Instant) -> usize {
        let mut channels = self.channels.lock().await;
        let before = channels.len();
        let idle_timeout = self.idle_timeout;
        channels.retain(|_, state| now.saturating_duration_since(state.last_activity) <= idle_timeout);
        before - channels.len()
    }

    pub async fn len(&self) -> usize {
        self.channels.lock().await.len()
    }

    /// Run [`sweep`](Self::sweep) every `every` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep().await;
                if removed > 0 {
                    let remaining = self.len().await;
                    debug!(removed, remaining, "swept idle conversations");
                }
            }
        })
    }
}
