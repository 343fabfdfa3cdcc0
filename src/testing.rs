//! In-memory stand-ins for the model, vector index and market contract.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::{Address, U256};

use crate::docs::{DocumentChunk, Retriever, StoreError};
use crate::llm::{ChatModel, LlmError, Message};
use crate::market::{ChainError, MarketBase, MarketExtended, MarketReader};

type Responder = Box<dyn Fn(&[Message]) -> Result<String, LlmError> + Send + Sync>;

pub struct FakeModel {
    responder: Responder,
}

impl FakeModel {
    pub fn new(responder: impl Fn(&[Message]) -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
        }
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(model_offline()))
    }
}

pub fn model_offline() -> LlmError {
    LlmError::Server {
        status: 503,
        body: "model offline".to_string(),
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        (self.responder)(messages)
    }

    async fn sub_query(&self, prompt: &str) -> Result<String, LlmError> {
        (self.responder)(&[Message::user(prompt)])
    }
}

pub struct FakeRetriever {
    result: Result<Vec<DocumentChunk>, u16>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeRetriever {
    pub fn with_chunks(chunks: Vec<DocumentChunk>) -> Self {
        Self {
            result: Ok(chunks),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(500),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>, StoreError> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.result {
            Ok(chunks) => Ok(chunks.iter().take(k).cloned().collect()),
            Err(status) => Err(StoreError::Server {
                status: *status,
                body: "index unavailable".to_string(),
            }),
        }
    }
}

pub fn sample_chunk(title: &str, source: &str, chunk: u32, text: &str) -> DocumentChunk {
    DocumentChunk {
        title: title.to_string(),
        source: source.to_string(),
        chunk,
        total_chunks: Some(chunk.max(4)),
        content: text.to_string(),
        score: 0.9,
    }
}

struct FakeMarket {
    expires_at: u64,
    resolved: bool,
    outcomes: u8,
}

fn wei(whole: u64) -> U256 {
    U256::from(whole) * U256::exp10(18)
}

/// Market contract with scripted per-read failures.
#[derive(Default)]
pub struct FakeReader {
    markets: HashMap<u64, FakeMarket>,
    failing_base: HashSet<u64>,
    failing_prices: HashSet<u64>,
    failing_amounts: HashSet<u64>,
    pub requested: Mutex<Vec<u64>>,
}

impl FakeReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market(self, id: u64, expires_at: u64, resolved: bool) -> Self {
        let mut this = self.with_outcomes(id, expires_at, 2);
        if let Some(m) = this.markets.get_mut(&id) {
            m.resolved = resolved;
        }
        this
    }

    pub fn with_outcomes(mut self, id: u64, expires_at: u64, outcomes: u8) -> Self {
        self.markets.insert(
            id,
            FakeMarket {
                expires_at,
                resolved: false,
                outcomes,
            },
        );
        self
    }

    pub fn failing_base(mut self, id: u64) -> Self {
        self.failing_base.insert(id);
        self
    }

    pub fn failing_prices(mut self, id: u64) -> Self {
        self.failing_prices.insert(id);
        self
    }

    pub fn failing_amounts(mut self, id: u64) -> Self {
        self.failing_amounts.insert(id);
        self
    }

    fn market(&self, id: u64) -> Result<&FakeMarket, ChainError> {
        self.markets.get(&id).ok_or(ChainError::NotFound(id))
    }
}

fn reverted(method: &'static str) -> ChainError {
    ChainError::Call {
        method,
        reason: "execution reverted".to_string(),
    }
}

#[async_trait]
impl MarketReader for FakeReader {
    async fn market_base(&self, id: u64) -> Result<MarketBase, ChainError> {
        self.requested.lock().unwrap().push(id);
        if self.failing_base.contains(&id) {
            return Err(reverted("getMarket"));
        }
        // Unknown ids read back as zeroed storage, like the real contract.
        let Some(m) = self.markets.get(&id) else {
            return Ok(MarketBase {
                creator: Address::zero(),
                collateral_token: Address::zero(),
                collateral_amount: U256::zero(),
                outcome_count: 0,
                created_at: U256::zero(),
                expires_at: U256::zero(),
                resolver_fee_bps: 0,
                metadata: String::new(),
            });
        };
        Ok(MarketBase {
            creator: Address::from_low_u64_be(0xabc),
            collateral_token: Address::from_low_u64_be(0xdef),
            collateral_amount: wei(1000),
            outcome_count: m.outcomes,
            created_at: U256::from(m.expires_at.saturating_sub(7 * 86_400)),
            expires_at: U256::from(m.expires_at),
            resolver_fee_bps: 100,
            metadata: format!("Will market {id} resolve YES?"),
        })
    }

    async fn market_extended(&self, id: u64) -> Result<MarketExtended, ChainError> {
        let m = self.market(id)?;
        Ok(MarketExtended {
            winning_outcome: 1,
            resolved_at: if m.resolved {
                U256::from(m.expires_at.saturating_sub(3600))
            } else {
                U256::zero()
            },
            resolver: Address::from_low_u64_be(0x123),
        })
    }

    async fn is_resolved(&self, id: u64) -> Result<bool, ChainError> {
        Ok(self.market(id)?.resolved)
    }

    async fn collateral_balance(&self, id: u64) -> Result<U256, ChainError> {
        self.market(id)?;
        Ok(U256::from(2505u64) * U256::exp10(17))
    }

    async fn outcome_prices(&self, id: u64) -> Result<Vec<U256>, ChainError> {
        let m = self.market(id)?;
        if self.failing_prices.contains(&id) {
            return Err(reverted("getPrices"));
        }
        if m.outcomes == 2 {
            Ok(vec![U256::from(6u64) * U256::exp10(17), U256::from(4u64) * U256::exp10(17)])
        } else {
            Ok(vec![U256::exp10(18) / U256::from(m.outcomes); m.outcomes as usize])
        }
    }

    async fn outcome_token_amounts(&self, id: u64) -> Result<Vec<U256>, ChainError> {
        let m = self.market(id)?;
        if self.failing_amounts.contains(&id) {
            return Err(reverted("getOutcomeTokenAmounts"));
        }
        Ok((1..=m.outcomes as u64).map(|i| wei(i * 100)).collect())
    }
}
