use std::fmt;

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Active,
    Closed,
    Resolved,
}

impl MarketStatus {
    /// Status is never read from chain directly: the resolved flag wins,
    /// then expiry decides between closed and active.
    pub fn derive(resolved: bool, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if resolved {
            Self::Resolved
        } else if expires_at <= now {
            Self::Closed
        } else {
            Self::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Closed => "Closed",
            Self::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one prediction market at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub id: u64,
    pub creator: String,
    pub collateral_token: String,
    pub collateral_amount: f64,
    pub fee_bps: u16,
    pub outcome_count: u8,
    /// Per-outcome probability in `[0, 1]`.
    pub prices: Vec<f64>,
    /// True when `prices` is the uniform fallback rather than chain data.
    pub prices_estimated: bool,
    pub outcome_token_amounts: Vec<f64>,
    pub volume: f64,
    pub liquidity: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: MarketStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_outcome: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver: Option<String>,
    pub metadata: String,
    pub fetched_at: DateTime<Utc>,
}

/// Base fields returned by `getMarket`.
#[derive(Debug, Clone)]
pub struct MarketBase {
    pub creator: Address,
    pub collateral_token: Address,
    pub collateral_amount: U256,
    pub outcome_count: u8,
    pub created_at: U256,
    pub expires_at: U256,
    pub resolver_fee_bps: u16,
    pub metadata: String,
}

/// Resolution fields returned by `getExtendedMarket`.
#[derive(Debug, Clone)]
pub struct MarketExtended {
    pub winning_outcome: u8,
    pub resolved_at: U256,
    pub resolver: Address,
}

/// `1 / n` for each of `n` outcomes.
pub fn uniform_prices(outcome_count: u8) -> Vec<f64> {
    if outcome_count == 0 {
        return Vec::new();
    }
    let n = outcome_count as usize;
    vec![1.0 / n as f64; n]
}
