//! Batch orchestration: cache gate, bounded LLM fan-out, ordered collection

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::prompt::PromptRenderer;
use crate::response::parse_response;
use chrono::{DateTime, Utc};
use palaver_domain::traits::ResultCache;
use palaver_domain::{
    CacheStatus, Conversation, ConversationDigest, Diagnostics, ExpectedKey, FeatureRecord,
    ItemState, ProcessingResult, RecipeSpec, ResultSet,
};
use palaver_features::{ChainFilters, ChainOptions, ProcessorChain, ProcessorRegistry};
use palaver_llm::{LlmError, LlmInvoker, LlmProvider};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Per-run knobs that do not belong in the recipe
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// The instant "now" means for temporal features; fixed per run
    pub reference_now: DateTime<Utc>,

    /// Bypass cache lookups (stores still happen)
    pub force_refresh: bool,

    /// Process at most this many conversations, in input order
    pub limit: Option<usize>,

    /// Processor selection filters
    pub filters: ChainFilters,
}

impl RunOptions {
    /// Options pinned to a specific reference instant
    pub fn at(reference_now: DateTime<Utc>) -> Self {
        Self {
            reference_now,
            force_refresh: false,
            limit: None,
            filters: ChainFilters::default(),
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

/// Drives a batch of conversations through features, cache, and LLM
///
/// Configuration problems (unknown processor, field collision, bad template)
/// abort the run before any conversation is touched. Everything after that
/// point is isolated per conversation: a failed item lands in the ignored
/// partition and the rest of the batch completes.
pub struct Orchestrator<P, C> {
    provider: Arc<P>,
    cache: Arc<C>,
    registry: ProcessorRegistry,
    config: EngineConfig,
}

/// Everything one worker task needs, cloned per conversation
struct ItemContext<P, C> {
    chain: Arc<ProcessorChain>,
    renderer: Arc<PromptRenderer>,
    invoker: Arc<LlmInvoker<P>>,
    cache: Arc<C>,
    semaphore: Arc<Semaphore>,
    expected: Arc<Vec<ExpectedKey>>,
    fingerprint: Arc<str>,
    reference_now: DateTime<Utc>,
    force_refresh: bool,
    skip_no_user: bool,
}

impl<P, C> Clone for ItemContext<P, C> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            renderer: self.renderer.clone(),
            invoker: self.invoker.clone(),
            cache: self.cache.clone(),
            semaphore: self.semaphore.clone(),
            expected: self.expected.clone(),
            fingerprint: self.fingerprint.clone(),
            reference_now: self.reference_now,
            force_refresh: self.force_refresh,
            skip_no_user: self.skip_no_user,
        }
    }
}

impl<P, C> Orchestrator<P, C>
where
    P: LlmProvider + 'static,
    C: ResultCache + 'static,
{
    /// Create an orchestrator with the built-in processor registry
    pub fn new(provider: Arc<P>, cache: Arc<C>, config: EngineConfig) -> Self {
        Self::with_registry(provider, cache, config, ProcessorRegistry::with_defaults())
    }

    /// Create an orchestrator with a custom processor registry
    pub fn with_registry(
        provider: Arc<P>,
        cache: Arc<C>,
        config: EngineConfig,
        registry: ProcessorRegistry,
    ) -> Self {
        Self {
            provider,
            cache,
            registry,
            config,
        }
    }

    /// Run a batch of conversations under a recipe
    ///
    /// Results come back partitioned into analyzed and ignored, both in
    /// input order regardless of completion order.
    pub async fn run(
        &self,
        conversations: Vec<Conversation>,
        recipe: &RecipeSpec,
        options: RunOptions,
    ) -> Result<ResultSet, EngineError> {
        self.config.validate().map_err(EngineError::Config)?;

        let chain_options = ChainOptions {
            reduced_temporal_detail: recipe.reduced_temporal_detail,
        };
        let chain = Arc::new(ProcessorChain::build(
            &recipe.processors,
            &self.registry,
            &chain_options,
            &options.filters,
        )?);
        let renderer = Arc::new(PromptRenderer::new(&recipe.prompt_template)?);

        let context = ItemContext {
            chain,
            renderer,
            invoker: Arc::new(LlmInvoker::new(
                self.provider.clone(),
                self.config.retry_policy(),
                self.config.token_budget(),
            )),
            cache: self.cache.clone(),
            semaphore: Arc::new(Semaphore::new(self.config.max_concurrency)),
            expected: Arc::new(recipe.expected_keys.clone()),
            fingerprint: Arc::from(recipe.fingerprint().as_str()),
            reference_now: options.reference_now,
            force_refresh: options.force_refresh,
            skip_no_user: recipe.skip_no_user_messages,
        };

        let mut batch = conversations;
        if let Some(limit) = options.limit {
            batch.truncate(limit);
        }

        let mut set = ResultSet::new();
        info!(
            run_id = %set.run_id,
            recipe = %recipe.name,
            conversations = batch.len(),
            max_concurrency = self.config.max_concurrency,
            "starting run"
        );

        let mut handles = Vec::with_capacity(batch.len());
        for conversation in batch {
            let identifier = conversation.identifier.clone();
            let ctx = context.clone();
            handles.push((identifier, tokio::spawn(process_one(conversation, ctx))));
        }

        // Awaiting in spawn order keeps results in input order.
        for (identifier, handle) in handles {
            match handle.await {
                Ok(result) if result.state == ItemState::Ignored => set.ignored.push(result),
                Ok(result) => set.analyzed.push(result),
                Err(e) => {
                    warn!(identifier = %identifier, "worker task failed: {}", e);
                    set.ignored.push(ProcessingResult {
                        identifier,
                        digest: None,
                        features: FeatureRecord::new(),
                        llm_output: BTreeMap::new(),
                        cache_status: CacheStatus::Error,
                        state: ItemState::Ignored,
                        diagnostics: Diagnostics {
                            reason: Some("worker task failed".to_string()),
                            ..Diagnostics::default()
                        },
                    });
                }
            }
        }

        info!(
            run_id = %set.run_id,
            analyzed = set.analyzed.len(),
            ignored = set.ignored.len(),
            hits = set.count_status(CacheStatus::Hit),
            misses = set.count_status(CacheStatus::Miss),
            errors = set.count_status(CacheStatus::Error),
            "run complete"
        );
        Ok(set)
    }
}

/// Process one conversation end to end
///
/// Never returns a non-terminal state: every path ends `Finalized` or
/// `Ignored`.
async fn process_one<P, C>(conversation: Conversation, ctx: ItemContext<P, C>) -> ProcessingResult
where
    P: LlmProvider + 'static,
    C: ResultCache + 'static,
{
    let identifier = conversation.identifier.clone();

    // Features are extracted even for pre-filtered conversations, so an
    // ignored record still explains itself (no_user_messages and friends).
    let outcome = ctx.chain.run(&conversation, ctx.reference_now);
    let features = outcome.record;
    let mut diagnostics = Diagnostics {
        failed_processors: outcome.failed,
        ..Diagnostics::default()
    };

    if ctx.skip_no_user && !conversation.has_user_messages() {
        debug!(identifier = %identifier, "skipping, no user messages");
        diagnostics.reason = Some("no user messages".to_string());
        return ProcessingResult {
            identifier,
            digest: None,
            features,
            llm_output: BTreeMap::new(),
            cache_status: CacheStatus::Skipped,
            state: ItemState::Ignored,
            diagnostics,
        };
    }

    let digest = ConversationDigest::compute(&conversation, &ctx.fingerprint);

    if !ctx.force_refresh {
        match ctx.cache.lookup(&identifier, &digest) {
            Ok(Some(cached)) => {
                debug!(identifier = %identifier, "cache hit");
                return ProcessingResult {
                    identifier,
                    digest: Some(digest),
                    features,
                    llm_output: cached.fields,
                    cache_status: CacheStatus::Hit,
                    state: ItemState::Finalized,
                    diagnostics,
                };
            }
            Ok(None) => {}
            Err(e) => {
                warn!(identifier = %identifier, "cache lookup failed, treating as miss: {}", e);
            }
        }
    }

    let request = ctx
        .renderer
        .render(&features, conversation.render_transcript());

    // The permit bounds the LLM call only; feature extraction and cache
    // traffic run unthrottled.
    let invoked = match ctx.semaphore.acquire().await {
        Ok(_permit) => ctx.invoker.invoke(&request).await,
        Err(_) => Err(LlmError::Network("concurrency limiter closed".to_string())),
    };

    let llm_outcome = match invoked {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(identifier = %identifier, "llm invocation failed: {}", e);
            diagnostics.reason = Some(format!("llm invocation failed: {}", e));
            return ProcessingResult {
                identifier,
                digest: Some(digest),
                features,
                llm_output: BTreeMap::new(),
                cache_status: CacheStatus::Error,
                state: ItemState::Ignored,
                diagnostics,
            };
        }
    };
    diagnostics.truncated = llm_outcome.truncated;

    let fields = match parse_response(&llm_outcome.raw, &ctx.expected) {
        Ok(fields) => fields,
        Err(e) => {
            warn!(identifier = %identifier, "response validation failed: {}", e);
            diagnostics.reason = Some(format!("response validation failed: {}", e));
            diagnostics.raw_response = Some(llm_outcome.raw);
            return ProcessingResult {
                identifier,
                digest: Some(digest),
                features,
                llm_output: BTreeMap::new(),
                cache_status: CacheStatus::Error,
                state: ItemState::Ignored,
                diagnostics,
            };
        }
    };

    // Best effort: a failed write costs a future cache miss, not the result.
    if let Err(e) = ctx
        .cache
        .store(&identifier, &digest, &fields, CacheStatus::Miss)
    {
        warn!(identifier = %identifier, "cache store failed: {}", e);
    }

    ProcessingResult {
        identifier,
        digest: Some(digest),
        features,
        llm_output: fields,
        cache_status: CacheStatus::Miss,
        state: ItemState::Finalized,
        diagnostics,
    }
}
