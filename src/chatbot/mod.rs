pub mod classifier;
pub mod composer;
pub mod prompts;
pub mod rag;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ChainConfig, Config};
use crate::docs::{format_sources, Retriever, SourceSummary, StoreError, VectorStore};
use crate::llm::{ChatModel, LlmClient, LlmError};
use crate::market::contract::ContractReader;
use crate::market::{MarketFetcher, MarketReader, MarketRecord};
use classifier::LiveDataClassifier;
use composer::{compose_answer, compose_context, market_block};
use rag::RetrievalQa;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("chatbot not initialized: {0}")]
    Initialization(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data: Option<Vec<MarketRecord>>,
    /// Milliseconds spent in `ask`, including every external call.
    pub response_time: u64,
}

impl ChatResponse {
    fn apology(response_time: u64) -> Self {
        Self {
            answer: prompts::APOLOGY.to_string(),
            sources: Vec::new(),
            market_data: None,
            response_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub vector_store: bool,
    pub chain: bool,
    pub blockchain: bool,
    pub initialized: bool,
}

/// Everything `ask` needs once initialization has finished.
pub struct Services {
    qa: RetrievalQa,
    classifier: LiveDataClassifier,
    fetcher: MarketFetcher,
}

impl Services {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        retriever: Arc<dyn Retriever>,
        fetcher: MarketFetcher,
        top_k: usize,
    ) -> Self {
        Self {
            qa: RetrievalQa::new(llm.clone(), retriever, top_k),
            classifier: LiveDataClassifier::new(llm),
            fetcher,
        }
    }

    async fn answer(
        &self,
        question: &str,
        history: &[String],
    ) -> Result<(String, Vec<SourceSummary>, Vec<MarketRecord>), ChatError> {
        let needs_live = self.classifier.classify(question).await;
        let markets = if needs_live {
            info!("fetching live market data");
            self.fetcher.fetch_markets(question).await
        } else {
            Vec::new()
        };

        let context = compose_context(question, history, &markets);
        let live_data = market_block(&markets);
        let qa = self.qa.call(&context, history, live_data.as_deref()).await?;
        let sources = format_sources(&qa.source_documents);
        let answer = compose_answer(&qa.text, &markets);

        info!(
            needs_live,
            markets = markets.len(),
            sources = sources.len(),
            answer_len = answer.len(),
            "question answered"
        );
        Ok((answer, sources, markets))
    }
}

type InitFuture = Shared<BoxFuture<'static, Result<Arc<Services>, String>>>;

/// The long-lived chatbot. Construction starts initialization in the
/// background; every public call waits for it to finish.
pub struct Chatbot {
    init: InitFuture,
}

impl Chatbot {
    pub fn new(config: Config) -> Self {
        Self::from_init(initialize(config))
    }

    /// Start the chatbot from an arbitrary setup future. Must be called from
    /// within a tokio runtime.
    pub fn from_init<F>(init: F) -> Self
    where
        F: Future<Output = anyhow::Result<Services>> + Send + 'static,
    {
        let shared = async move {
            match init.await {
                Ok(services) => {
                    info!("XO Market chatbot initialized");
                    Ok(Arc::new(services))
                }
                Err(e) => {
                    error!(error = %format!("{e:#}"), "failed to initialize chatbot");
                    Err(format!("{e:#}"))
                }
            }
        }
        .boxed()
        .shared();

        tokio::spawn(shared.clone());
        Self { init: shared }
    }

    async fn ready(&self) -> Result<Arc<Services>, ChatError> {
        self.init.clone().await.map_err(ChatError::Initialization)
    }

    /// Answer a question. Only an initialization failure is returned as an
    /// error; anything that goes wrong afterwards becomes an apology response.
    pub async fn ask(&self, question: &str, history: &[String]) -> Result<ChatResponse, ChatError> {
        let started = Instant::now();
        let services = self.ready().await?;

        match services.answer(question, history).await {
            Ok((answer, sources, markets)) => Ok(ChatResponse {
                answer,
                sources,
                market_data: (!markets.is_empty()).then_some(markets),
                response_time: elapsed_ms(started),
            }),
            Err(e) => {
                error!(error = %e, "error in chatbot response");
                Ok(ChatResponse::apology(elapsed_ms(started)))
            }
        }
    }

    /// Current market snapshot over the default identifier window.
    pub async fn live_markets(&self) -> Result<Vec<MarketRecord>, ChatError> {
        let services = self.ready().await?;
        let range = services.fetcher.default_range();
        Ok(services.fetcher.fetch_range(range).await)
    }

    /// Non-blocking view of the initialization state.
    pub fn health(&self) -> HealthStatus {
        match self.init.peek() {
            Some(Ok(services)) => HealthStatus {
                vector_store: true,
                chain: true,
                blockchain: services.fetcher.has_chain(),
                initialized: true,
            },
            _ => HealthStatus {
                vector_store: false,
                chain: false,
                blockchain: false,
                initialized: false,
            },
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u64::MAX as u128) as u64
}

async fn initialize(config: Config) -> anyhow::Result<Services> {
    let llm: Arc<dyn ChatModel> = Arc::new(LlmClient::new(&config.llm)?);

    let store = VectorStore::new(&config.vector_store)?;
    let vectors = store
        .health()
        .await
        .context("vector store health check failed")?;
    info!(vectors, namespace = %config.vector_store.namespace, "vector store connected");

    let reader = connect_chain(&config.chain).await;
    let fetcher = MarketFetcher::new(
        reader,
        Some(llm.clone()),
        config.chain.default_range.clone(),
        config.chain.collateral_decimals,
    );

    Ok(Services::new(
        llm,
        Arc::new(store),
        fetcher,
        config.vector_store.top_k,
    ))
}

/// Bounded blockchain bootstrap. Any failure means no live data for the
/// lifetime of the process.
async fn connect_chain(config: &ChainConfig) -> Option<Arc<dyn MarketReader>> {
    let (Some(rpc_url), Some(contract)) = (&config.rpc_url, &config.market_contract) else {
        info!("XO_RPC_URL / XO_MARKET_CONTRACT not set, live market data disabled");
        return None;
    };

    match ContractReader::connect(rpc_url, contract, config.connect_timeout).await {
        Ok(reader) => Some(Arc::new(reader)),
        Err(e) => {
            warn!(error = %e, "blockchain bootstrap failed, continuing without live data");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_chunk, FakeModel, FakeReader, FakeRetriever};
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Answers YES/NO prompts with `live`, range prompts with ALL, and
    /// everything else with a fixed answer.
    fn scripted_model(live: bool) -> FakeModel {
        FakeModel::new(move |messages| {
            let prompt = &messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if prompt.contains("YES or NO") {
                Ok(if live { "YES" } else { "NO" }.to_string())
            } else if prompt.contains("START-END") {
                Ok("ALL".to_string())
            } else {
                Ok("XO Market is a decentralized prediction market platform.".to_string())
            }
        })
    }

    fn docs() -> Arc<FakeRetriever> {
        Arc::new(FakeRetriever::with_chunks(vec![
            sample_chunk("XO Market Litepaper", "litepaper.md", 1, &"XO Market overview. ".repeat(20)),
            sample_chunk("XO Market FAQ", "faq.md", 2, "XO Market runs on an EVM chain."),
        ]))
    }

    fn chatbot(model: FakeModel, retriever: Arc<FakeRetriever>, reader: Option<Arc<FakeReader>>) -> Chatbot {
        let llm: Arc<dyn ChatModel> = Arc::new(model);
        let reader = reader.map(|r| r as Arc<dyn MarketReader>);
        let fetcher = MarketFetcher::new(reader, Some(llm.clone()), 1..=16, 18);
        let services = Services::new(llm, retriever, fetcher, 5);
        Chatbot::from_init(async move { Ok(services) })
    }

    #[tokio::test]
    async fn test_static_question_skips_live_data() {
        let reader = Arc::new(FakeReader::new().with_market(1, Utc::now().timestamp() as u64 + 3600, false));
        let bot = chatbot(scripted_model(false), docs(), Some(reader.clone()));

        let resp = bot.ask("What is XO Market?", &[]).await.unwrap();

        assert!(resp.market_data.is_none());
        assert_eq!(resp.sources.len(), 2);
        assert_eq!(resp.sources[0].title, "XO Market Litepaper");
        assert!(resp.sources[0].content.ends_with("..."));
        assert!(!resp.answer.contains("Live Market Data"));
        assert!(reader.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_question_fetches_default_range() {
        let now = Utc::now().timestamp() as u64;
        let reader = Arc::new(
            FakeReader::new()
                .with_market(2, now + 86_400, false)
                .with_market(5, now + 3600, false),
        );
        let bot = chatbot(scripted_model(true), docs(), Some(reader.clone()));

        let resp = bot.ask("What are the current active markets?", &[]).await.unwrap();

        let mut requested = reader.requested.lock().unwrap().clone();
        requested.sort_unstable();
        assert_eq!(requested, (1..=16).collect::<Vec<u64>>());

        let markets = resp.market_data.expect("market data present");
        assert_eq!(markets.iter().map(|m| m.id).collect::<Vec<_>>(), vec![5, 2]);
        assert!(resp.answer.contains("**Live Market Data:**"));
        assert!(resp.answer.contains("**Market #5:**"));
    }

    #[tokio::test]
    async fn test_classifier_failure_falls_back_to_keywords() {
        let now = Utc::now().timestamp() as u64;
        let reader = Arc::new(FakeReader::new().with_market(1, now + 3600, false));
        // Only the QA call succeeds; classifier and range hint fail.
        let model = FakeModel::new(|messages| {
            if messages.len() == 2 {
                Ok("Here is what is live.".to_string())
            } else {
                Err(crate::testing::model_offline())
            }
        });
        let bot = chatbot(model, docs(), Some(reader));

        let resp = bot.ask("Show me the current markets", &[]).await.unwrap();
        assert_eq!(resp.market_data.map(|m| m.len()), Some(1));
        assert!(resp.answer.starts_with("Here is what is live."));
    }

    #[tokio::test]
    async fn test_live_question_without_markets_omits_market_data() {
        let bot = chatbot(scripted_model(true), docs(), None);
        let resp = bot.ask("What are the current active markets?", &[]).await.unwrap();
        assert!(resp.market_data.is_none());
        assert!(!resp.answer.contains("Live Market Data"));
    }

    #[tokio::test]
    async fn test_vector_store_failure_returns_apology() {
        let bot = chatbot(scripted_model(false), Arc::new(FakeRetriever::failing()), None);

        let resp = bot.ask("What is XO Market?", &[]).await.unwrap();

        assert_eq!(resp.answer, prompts::APOLOGY);
        assert!(resp.sources.is_empty());
        assert!(resp.market_data.is_none());
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json["responseTime"].as_u64().is_some());
        assert!(json.get("marketData").is_none());
    }

    #[tokio::test]
    async fn test_init_failure_fails_every_request() {
        let bot = Chatbot::from_init(async { Err(anyhow::anyhow!("vector store unreachable")) });

        for _ in 0..2 {
            match bot.ask("What is XO Market?", &[]).await {
                Err(ChatError::Initialization(msg)) => assert!(msg.contains("vector store unreachable")),
                other => panic!("expected initialization error, got {other:?}"),
            }
        }
        assert!(bot.live_markets().await.is_err());
        assert!(!bot.health().initialized);
    }

    #[tokio::test]
    async fn test_health_after_init() {
        let reader = Arc::new(FakeReader::new());
        let bot = chatbot(scripted_model(false), docs(), Some(reader));
        bot.ask("What is XO Market?", &[]).await.unwrap();

        assert_eq!(
            bot.health(),
            HealthStatus {
                vector_store: true,
                chain: true,
                blockchain: true,
                initialized: true,
            }
        );
    }

    #[tokio::test]
    async fn test_live_markets_uses_default_range() {
        let now = Utc::now().timestamp() as u64;
        let reader = Arc::new(FakeReader::new().with_market(16, now + 60, false).with_market(17, now + 60, false));
        let bot = chatbot(scripted_model(false), docs(), Some(reader));

        let markets = bot.live_markets().await.unwrap();
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].id, 16);
    }

    #[tokio::test]
    async fn test_follow_up_sends_market_data_to_answer_prompt() {
        let now = Utc::now().timestamp() as u64;
        let reader = Arc::new(FakeReader::new().with_market(5, now + 3600, false));
        let saw_markets = Arc::new(AtomicBool::new(false));
        let seen = saw_markets.clone();
        let model = FakeModel::new(move |messages| {
            let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if prompt.contains("YES or NO") {
                Ok("YES".to_string())
            } else if prompt.contains("START-END") {
                Ok("ALL".to_string())
            } else if messages.len() == 1 {
                Ok("Which XO markets are open right now?".to_string())
            } else {
                if prompt.contains("Live market data") && prompt.contains("\"id\": 5") {
                    seen.store(true, Ordering::SeqCst);
                }
                Ok("Market 5 is open.".to_string())
            }
        });
        let bot = chatbot(model, docs(), Some(reader));

        let history = vec![
            "Human: What is XO Market?".to_string(),
            "Assistant: A prediction market platform.".to_string(),
        ];
        let resp = bot.ask("Which ones are open?", &history).await.unwrap();

        assert!(saw_markets.load(Ordering::SeqCst));
        assert!(resp.answer.starts_with("Market 5 is open."));
        assert_eq!(resp.market_data.map(|m| m.len()), Some(1));
    }

    fn chain_config(rpc_url: Option<&str>, contract: Option<&str>) -> ChainConfig {
        ChainConfig {
            rpc_url: rpc_url.map(str::to_string),
            market_contract: contract.map(str::to_string),
            connect_timeout: Duration::from_secs(1),
            collateral_decimals: 18,
            default_range: 1..=16,
        }
    }

    const CONTRACT: &str = "0x0000000000000000000000000000000000000001";

    #[tokio::test]
    async fn test_unreachable_rpc_disables_live_data() {
        let config = chain_config(Some("http://127.0.0.1:1"), Some(CONTRACT));
        assert!(connect_chain(&config).await.is_none());
    }

    #[tokio::test]
    async fn test_silent_rpc_times_out() {
        // Accepts connections through the backlog but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let config = chain_config(Some(&url), Some(CONTRACT));

        let started = std::time::Instant::now();
        assert!(connect_chain(&config).await.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[tokio::test]
    async fn test_invalid_contract_address_disables_live_data() {
        let config = chain_config(Some("http://127.0.0.1:1"), Some("nothex"));
        assert!(connect_chain(&config).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_chain_settings_disable_live_data() {
        assert!(connect_chain(&chain_config(None, Some(CONTRACT))).await.is_none());
        assert!(connect_chain(&chain_config(Some("http://127.0.0.1:1"), None)).await.is_none());
    }
}
