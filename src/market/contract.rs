use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, U256};
use tracing::info;

use super::types::{MarketBase, MarketExtended};
use super::{ChainError, MarketReader};

abigen!(
    XoMarketContract,
    r#"[
        function getMarket(uint256 marketId) external view returns (address creator, address collateralToken, uint256 collateralAmount, uint8 outcomeCount, uint256 createdAt, uint256 expiresAt, uint16 resolverFeeBps, string metadata)
        function getExtendedMarket(uint256 marketId) external view returns (uint8 winningOutcome, uint256 resolvedAt, address resolver)
        function isResolved(uint256 marketId) external view returns (bool)
        function getCollateralBalance(uint256 marketId) external view returns (uint256)
        function getPrices(uint256 marketId) external view returns (uint256[])
        function getOutcomeTokenAmounts(uint256 marketId) external view returns (uint256[])
    ]"#
);

/// Typed reads against the deployed XO market contract.
pub struct ContractReader {
    contract: XoMarketContract<Provider<Http>>,
}

impl ContractReader {
    /// Connect to the RPC endpoint and confirm it answers within `timeout`.
    pub async fn connect(rpc_url: &str, address: &str, timeout: Duration) -> Result<Self, ChainError> {
        let address: Address = address
            .parse()
            .map_err(|_| ChainError::InvalidAddress(address.to_string()))?;
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::Connection(e.to_string()))?;

        let chain_id = tokio::time::timeout(timeout, provider.get_chainid())
            .await
            .map_err(|_| ChainError::Timeout(timeout.as_secs()))?
            .map_err(|e| ChainError::Connection(e.to_string()))?;
        info!(%chain_id, contract = ?address, "blockchain connection established");

        Ok(Self {
            contract: XoMarketContract::new(address, Arc::new(provider)),
        })
    }
}

fn call_failed(method: &'static str) -> impl FnOnce(ethers::contract::ContractError<Provider<Http>>) -> ChainError {
    move |e| ChainError::Call {
        method,
        reason: e.to_string(),
    }
}

#[async_trait]
impl MarketReader for ContractReader {
    async fn market_base(&self, id: u64) -> Result<MarketBase, ChainError> {
        let (
            creator,
            collateral_token,
            collateral_amount,
            outcome_count,
            created_at,
            expires_at,
            resolver_fee_bps,
            metadata,
        ) = self
            .contract
            .get_market(U256::from(id))
            .call()
            .await
            .map_err(call_failed("getMarket"))?;

        Ok(MarketBase {
            creator,
            collateral_token,
            collateral_amount,
            outcome_count,
            created_at,
            expires_at,
            resolver_fee_bps,
            metadata,
        })
    }

    async fn market_extended(&self, id: u64) -> Result<MarketExtended, ChainError> {
        let (winning_outcome, resolved_at, resolver) = self
            .contract
            .get_extended_market(U256::from(id))
            .call()
            .await
            .map_err(call_failed("getExtendedMarket"))?;

        Ok(MarketExtended {
            winning_outcome,
            resolved_at,
            resolver,
        })
    }

    async fn is_resolved(&self, id: u64) -> Result<bool, ChainError> {
        self.contract
            .is_resolved(U256::from(id))
            .call()
            .await
            .map_err(call_failed("isResolved"))
    }

    async fn collateral_balance(&self, id: u64) -> Result<U256, ChainError> {
        self.contract
            .get_collateral_balance(U256::from(id))
            .call()
            .await
            .map_err(call_failed("getCollateralBalance"))
    }

    async fn outcome_prices(&self, id: u64) -> Result<Vec<U256>, ChainError> {
        self.contract
            .get_prices(U256::from(id))
            .call()
            .await
            .map_err(call_failed("getPrices"))
    }

    async fn outcome_token_amounts(&self, id: u64) -> Result<Vec<U256>, ChainError> {
        self.contract
            .get_outcome_token_amounts(U256::from(id))
            .call()
            .await
            .map_err(call_failed("getOutcomeTokenAmounts"))
    }
}
