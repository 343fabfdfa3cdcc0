use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Largest identifier window a single fetch may cover.
pub const MAX_RANGE_LEN: u64 = 50;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Model used for the small YES/NO and range-hint prompts.
    pub sub_model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub api_key: Option<String>,
    /// Data-plane host of the index, e.g. `xo-market-docs-abc123.svc.pinecone.io`.
    pub index_host: Option<String>,
    pub namespace: String,
    pub top_k: usize,
    pub embedding_base_url: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: Option<String>,
    pub market_contract: Option<String>,
    pub connect_timeout: Duration,
    pub collateral_decimals: u32,
    pub default_range: RangeInclusive<u64>,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: Option<String>,
    pub guild_id: Option<u64>,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub vector_store: VectorStoreConfig,
    pub chain: ChainConfig,
    pub discord: DiscordConfig,
    pub http_bind: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model = get("LLM_MODEL")
            .or_else(|| get("OLLAMA_MODEL"))
            .unwrap_or_else(|| "llama3".to_string());
        let llm = LlmConfig {
            base_url: get("LLM_BASE_URL").unwrap_or_else(|| "http://localhost:11434/v1".to_string()),
            sub_model: get("LLM_SUB_MODEL").unwrap_or_else(|| model.clone()),
            model,
            api_key: get("LLM_API_KEY").or_else(|| get("OPENAI_API_KEY")),
            temperature: parse_or(get("LLM_TEMPERATURE"), 0.1, "LLM_TEMPERATURE")?,
        };

        let vector_store = VectorStoreConfig {
            api_key: get("PINECONE_API_KEY"),
            index_host: get("PINECONE_INDEX_HOST"),
            namespace: get("PINECONE_NAMESPACE").unwrap_or_else(|| "xo-market-docs".to_string()),
            top_k: parse_or(get("RETRIEVAL_TOP_K"), 5, "RETRIEVAL_TOP_K")?,
            embedding_base_url: get("OLLAMA_BASE_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| "nomic-embed-text".to_string()),
        };

        let default_range = match get("XO_MARKET_DEFAULT_RANGE") {
            Some(raw) => parse_id_range(&raw)
                .ok_or_else(|| anyhow!("XO_MARKET_DEFAULT_RANGE must look like 1-16, got {raw:?}"))?,
            None => 1..=16,
        };
        let chain = ChainConfig {
            rpc_url: get("XO_RPC_URL"),
            market_contract: get("XO_MARKET_CONTRACT"),
            connect_timeout: Duration::from_secs(parse_or(
                get("XO_RPC_TIMEOUT_SECS"),
                10,
                "XO_RPC_TIMEOUT_SECS",
            )?),
            collateral_decimals: parse_or(get("XO_COLLATERAL_DECIMALS"), 18, "XO_COLLATERAL_DECIMALS")?,
            default_range,
        };

        let discord = DiscordConfig {
            token: get("DISCORD_TOKEN").or_else(|| get("DISCORD_BOT_TOKEN")),
            guild_id: get("DISCORD_GUILD_ID").and_then(|s| s.trim().parse::<u64>().ok()),
            prefix: get("DISCORD_PREFIX").unwrap_or_else(|| "!xo".to_string()),
        };

        Ok(Self {
            llm,
            vector_store,
            chain,
            discord,
            http_bind: get("HTTP_BIND").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        })
    }
}

fn parse_or<T>(raw: Option<String>, default: T, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {v:?}")),
        None => Ok(default),
    }
}

/// Parse `N` or `START-END` into an inclusive identifier range.
///
/// Identifiers start at 1, `START <= END`, and the window is capped at
/// [`MAX_RANGE_LEN`] identifiers.
pub fn parse_id_range(raw: &str) -> Option<RangeInclusive<u64>> {
    let raw = raw.trim();
    let (start, end) = match raw.split_once('-') {
        Some((a, b)) => (a.trim().parse::<u64>().ok()?, b.trim().parse::<u64>().ok()?),
        None => {
            let id = raw.parse::<u64>().ok()?;
            (id, id)
        }
    };
    if start == 0 || start > end {
        return None;
    }
    let end = end.min(start.saturating_add(MAX_RANGE_LEN - 1));
    Some(start..=end)
}
