pub mod contract;
pub mod types;

use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use ethers::utils::{format_units, to_checksum};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chatbot::prompts;
use crate::config::parse_id_range;
use crate::llm::ChatModel;
use crate::outcome::Outcome;
pub use types::{MarketBase, MarketExtended, MarketRecord, MarketStatus};
use types::uniform_prices;

/// Prices and outcome token amounts are 18-decimal fixed point on chain.
const FIXED_POINT_DECIMALS: u32 = 18;

#[derive(Error, Debug, Clone)]
pub enum ChainError {
    #[error("invalid contract address: {0}")]
    InvalidAddress(String),
    #[error("chain connection failed: {0}")]
    Connection(String),
    #[error("chain connection timed out after {0}s")]
    Timeout(u64),
    #[error("{method} call failed: {reason}")]
    Call { method: &'static str, reason: String },
    #[error("market {0} does not exist")]
    NotFound(u64),
    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),
    #[error("failed to decode chain value: {0}")]
    Decode(String),
}

/// Per-market contract reads. Each read is independent so a failing one can
/// be defaulted or isolated without touching the others.
#[async_trait]
pub trait MarketReader: Send + Sync {
    async fn market_base(&self, id: u64) -> Result<MarketBase, ChainError>;
    async fn market_extended(&self, id: u64) -> Result<MarketExtended, ChainError>;
    async fn is_resolved(&self, id: u64) -> Result<bool, ChainError>;
    async fn collateral_balance(&self, id: u64) -> Result<U256, ChainError>;
    async fn outcome_prices(&self, id: u64) -> Result<Vec<U256>, ChainError>;
    async fn outcome_token_amounts(&self, id: u64) -> Result<Vec<U256>, ChainError>;
}

pub struct MarketFetcher {
    reader: Option<Arc<dyn MarketReader>>,
    /// Used to narrow the identifier range from the question text.
    llm: Option<Arc<dyn ChatModel>>,
    default_range: RangeInclusive<u64>,
    collateral_decimals: u32,
}

impl MarketFetcher {
    pub fn new(
        reader: Option<Arc<dyn MarketReader>>,
        llm: Option<Arc<dyn ChatModel>>,
        default_range: RangeInclusive<u64>,
        collateral_decimals: u32,
    ) -> Self {
        Self {
            reader,
            llm,
            default_range,
            collateral_decimals,
        }
    }

    /// A fetcher with no chain connection; always returns no markets.
    #[cfg(test)]
    pub fn disconnected() -> Self {
        Self::new(None, None, 1..=16, FIXED_POINT_DECIMALS)
    }

    pub fn has_chain(&self) -> bool {
        self.reader.is_some()
    }

    pub fn default_range(&self) -> RangeInclusive<u64> {
        self.default_range.clone()
    }

    /// Fetch the markets relevant to `query`. Empty when no chain is configured.
    pub async fn fetch_markets(&self, query: &str) -> Vec<MarketRecord> {
        if self.reader.is_none() {
            return Vec::new();
        }
        let range = self.select_range(query).await;
        if let Some(reason) = range.reason() {
            debug!(reason, "range hint unavailable, using default window");
        }
        self.fetch_range(range.into_value()).await
    }

    /// Ask the sub model which identifiers the question is about.
    pub async fn select_range(&self, query: &str) -> Outcome<RangeInclusive<u64>> {
        let Some(llm) = &self.llm else {
            return Outcome::Success(self.default_range());
        };
        let prompt = prompts::range_hint_prompt(query);
        let parsed = match llm.sub_query(&prompt).await {
            Ok(reply) => parse_range_hint(&reply, &self.default_range)
                .ok_or_else(|| format!("unparseable range hint {:?}", reply.trim())),
            Err(e) => Err(e.to_string()),
        };
        Outcome::from_result(parsed, || self.default_range())
    }

    /// Fetch every market in `range`. Markets that fail a required read are
    /// logged and left out; the rest are sorted by expiry, soonest first.
    pub async fn fetch_range(&self, range: RangeInclusive<u64>) -> Vec<MarketRecord> {
        let Some(reader) = self.reader.as_deref() else {
            return Vec::new();
        };
        let now = Utc::now();
        let requested = range.clone().count();

        let results = join_all(range.map(|id| async move { (id, self.fetch_one(reader, id, now).await) })).await;

        let mut markets: Vec<MarketRecord> = results
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(market) => Some(market),
                Err(ChainError::NotFound(_)) => {
                    debug!(market_id = id, "market not deployed, skipping");
                    None
                }
                Err(e) => {
                    warn!(market_id = id, error = %e, "failed to fetch market, skipping");
                    None
                }
            })
            .collect();
        markets.sort_by_key(|m| m.expires_at);

        info!(requested, fetched = markets.len(), "live market data fetched");
        markets
    }

    async fn fetch_one(
        &self,
        reader: &dyn MarketReader,
        id: u64,
        now: DateTime<Utc>,
    ) -> Result<MarketRecord, ChainError> {
        let base = reader.market_base(id).await?;
        if base.creator == Address::zero() {
            return Err(ChainError::NotFound(id));
        }
        if base.outcome_count < 2 {
            return Err(ChainError::MissingField("outcomeCount"));
        }
        let outcome_count = base.outcome_count;

        let extended = reader.market_extended(id).await?;
        let resolved = reader.is_resolved(id).await?;
        let liquidity = scale(reader.collateral_balance(id).await?, self.collateral_decimals)?;

        let prices = Outcome::from_result(
            reader
                .outcome_prices(id)
                .await
                .and_then(|raw| decode_prices(&raw, outcome_count)),
            || uniform_prices(outcome_count),
        );
        if let Some(reason) = prices.reason() {
            debug!(market_id = id, reason, "price read failed, using uniform prices");
        }

        let amounts = Outcome::from_result(
            reader.outcome_token_amounts(id).await.and_then(|raw| {
                raw.into_iter()
                    .map(|v| scale(v, FIXED_POINT_DECIMALS))
                    .collect::<Result<Vec<f64>, _>>()
            }),
            Vec::new,
        );
        if let Some(reason) = amounts.reason() {
            debug!(market_id = id, reason, "token amount read failed, volume left at zero");
        }

        let expires_at = to_datetime(base.expires_at, "expiresAt")?;
        let status = MarketStatus::derive(resolved, expires_at, now);
        let is_resolved = status == MarketStatus::Resolved;
        let resolved_at = if is_resolved && !extended.resolved_at.is_zero() {
            Some(to_datetime(extended.resolved_at, "resolvedAt")?)
        } else {
            None
        };

        let prices_estimated = prices.is_degraded();
        let outcome_token_amounts = amounts.into_value();
        Ok(MarketRecord {
            id,
            creator: to_checksum(&base.creator, None),
            collateral_token: to_checksum(&base.collateral_token, None),
            collateral_amount: scale(base.collateral_amount, self.collateral_decimals)?,
            fee_bps: base.resolver_fee_bps,
            outcome_count,
            prices: prices.into_value(),
            prices_estimated,
            volume: outcome_token_amounts.iter().sum(),
            outcome_token_amounts,
            liquidity,
            created_at: to_datetime(base.created_at, "createdAt")?,
            expires_at,
            status,
            winning_outcome: is_resolved.then_some(extended.winning_outcome),
            resolved_at,
            resolver: (extended.resolver != Address::zero())
                .then(|| to_checksum(&extended.resolver, None)),
            metadata: base.metadata,
            fetched_at: now,
        })
    }
}

/// Interpret the sub model's reply: `ALL`, a single id, or `START-END`.
pub fn parse_range_hint(reply: &str, default: &RangeInclusive<u64>) -> Option<RangeInclusive<u64>> {
    let cleaned = reply
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.');
    if cleaned.eq_ignore_ascii_case("ALL") {
        return Some(default.clone());
    }
    parse_id_range(cleaned)
}

fn decode_prices(raw: &[U256], outcome_count: u8) -> Result<Vec<f64>, ChainError> {
    if raw.len() != outcome_count as usize {
        return Err(ChainError::Decode(format!(
            "expected {} prices, got {}",
            outcome_count,
            raw.len()
        )));
    }
    let prices = raw
        .iter()
        .map(|v| scale(*v, FIXED_POINT_DECIMALS))
        .collect::<Result<Vec<f64>, _>>()?;
    if prices.iter().any(|p| !(0.0..=1.0 + 1e-9).contains(p)) {
        return Err(ChainError::MissingField("prices"));
    }
    Ok(prices)
}

fn scale(value: U256, decimals: u32) -> Result<f64, ChainError> {
    let formatted = format_units(value, decimals).map_err(|e| ChainError::Decode(e.to_string()))?;
    formatted
        .parse::<f64>()
        .map_err(|e| ChainError::Decode(e.to_string()))
}

fn to_datetime(value: U256, field: &'static str) -> Result<DateTime<Utc>, ChainError> {
    if value.bits() > 62 {
        return Err(ChainError::MissingField(field));
    }
    DateTime::from_timestamp(value.as_u64() as i64, 0).ok_or(ChainError::MissingField(field))
}
