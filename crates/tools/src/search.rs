//! Web search tool.
//!
//! Owns everything around the actual vendor call: provider selection,
//! per-call timeout, a TTL + capacity bounded result cache, in-flight
//! request deduplication, and the multi-depth merge. Vendor HTTP clients
//! live behind the [`SearchProvider`] trait; a thin generic HTTP adapter is
//! provided for configured endpoints.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use periscope_core::error::ToolError;
use periscope_core::tool::{Tool, ToolContext, ToolEvent, ToolEventStream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_CACHE_CAPACITY: usize = 100;
const MAX_MERGED_IMAGES: usize = 10;

/// How hard the underlying provider should work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
    /// Issue basic and advanced sub-queries concurrently and merge.
    Multi,
}

/// Validated input to the search tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchInput {
    pub query: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default, rename = "type")]
    pub depth: SearchDepth,

    #[serde(default)]
    pub include_domains: Vec<String>,

    #[serde(default)]
    pub exclude_domains: Vec<String>,

    /// Explicit provider discriminator; falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

fn default_max_results() -> usize {
    10
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Raw payload from a provider, before rank synthesis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub images: Vec<SearchImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Concrete request handed to a provider (depth already resolved).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    pub query: String,
    pub max_results: usize,
    pub depth: SearchDepth,
    pub include_domains: Vec<String>,
    pub exclude_domains: Vec<String>,
}

/// External search-vendor collaborator.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, request: &ProviderRequest) -> Result<SearchResponse, ToolError>;
}

/// Generic HTTP adapter for a configured JSON search endpoint.
pub struct HttpSearchProvider {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpSearchProvider {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, request: &ProviderRequest) -> Result<SearchResponse, ToolError> {
        let mut req = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req
            .send()
            .await
            .map_err(|e| ToolError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "search".into(),
                reason: format!("provider '{}' returned {status}", self.name),
            });
        }
        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| ToolError::Network(format!("bad provider payload: {e}")))
    }
}

/// Normalized cache key: lower-cased trimmed query, result bound, depth,
/// and sorted domain lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    max_results: usize,
    depth: SearchDepth,
    include_domains: Vec<String>,
    exclude_domains: Vec<String>,
}

impl CacheKey {
    fn new(input: &SearchInput, depth: SearchDepth) -> Self {
        let mut include = input.include_domains.clone();
        let mut exclude = input.exclude_domains.clone();
        include.sort();
        exclude.sort();
        Self {
            query: input.query.trim().to_lowercase(),
            max_results: input.max_results,
            depth,
            include_domains: include,
            exclude_domains: exclude,
        }
    }
}

struct CacheEntry {
    inserted_at: Instant,
    response: Arc<SearchResponse>,
}

/// TTL + capacity bounded cache; eviction removes the earliest-inserted
/// surviving entry once full.
struct SearchCache {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<CacheKey, CacheEntry>,
    insertion_order: VecDeque<CacheKey>,
}

impl SearchCache {
    fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<Arc<SearchResponse>> {
        match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                Some(Arc::clone(&entry.response))
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&mut self, key: CacheKey, response: Arc<SearchResponse>) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.response = response;
            entry.inserted_at = Instant::now();
            return;
        }
        while self.entries.len() >= self.capacity {
            // The queue may hold keys already removed by TTL expiry; keep
            // popping until a live entry goes.
            let Some(oldest) = self.insertion_order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                debug!(query = %oldest.query, "Evicted search cache entry");
            }
        }
        self.insertion_order.push_back(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                inserted_at: Instant::now(),
                response,
            },
        );
    }
}

type SharedSearch = Shared<BoxFuture<'static, Result<Arc<SearchResponse>, ToolError>>>;

/// Cache plus pending-request map behind one lock, so a lookup and the
/// following registration happen with no suspension point in between.
struct SearchState {
    cache: SearchCache,
    inflight: HashMap<CacheKey, SharedSearch>,
}

/// The search tool.
pub struct SearchTool {
    providers: HashMap<String, Arc<dyn SearchProvider>>,
    default_provider: String,
    timeout: Duration,
    state: Arc<Mutex<SearchState>>,
}

impl SearchTool {
    pub fn new(default_provider: Arc<dyn SearchProvider>) -> Self {
        let name = default_provider.name().to_string();
        let mut providers: HashMap<String, Arc<dyn SearchProvider>> = HashMap::new();
        providers.insert(name.clone(), default_provider);
        Self {
            providers,
            default_provider: name,
            timeout: DEFAULT_TIMEOUT,
            state: Arc::new(Mutex::new(SearchState {
                cache: SearchCache::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY),
                inflight: HashMap::new(),
            })),
        }
    }

    /// Register an additional provider selectable via the request's
    /// `provider` discriminator.
    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.providers
            .insert(provider.name().to_string(), provider);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache(self, ttl: Duration, capacity: usize) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.cache = SearchCache::new(ttl, capacity);
        }
        self
    }

    fn resolve_provider(&self, input: &SearchInput) -> Result<Arc<dyn SearchProvider>, ToolError> {
        let name = input
            .provider
            .as_deref()
            .unwrap_or(self.default_provider.as_str());
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::InvalidArguments(format!("unknown search provider: {name}")))
    }
}

/// One deduplicated, cached, timeout-bounded provider call.
///
/// The cache lookup and the pending-request registration both happen under
/// the state lock, synchronously — a second caller with the same key cannot
/// race past the check while the first is still in flight.
async fn cached_search(
    state: Arc<Mutex<SearchState>>,
    provider: Arc<dyn SearchProvider>,
    key: CacheKey,
    request: ProviderRequest,
    timeout: Duration,
) -> Result<Arc<SearchResponse>, ToolError> {
    let fut = {
        let mut state = state.lock().unwrap();
        if let Some(hit) = state.cache.get(&key) {
            debug!(query = %key.query, "Search cache hit");
            return Ok(hit);
        }
        if let Some(existing) = state.inflight.get(&key) {
            debug!(query = %key.query, "Joining in-flight search request");
            existing.clone()
        } else {
            let fut: SharedSearch = async move {
                match tokio::time::timeout(timeout, provider.search(&request)).await {
                    Ok(Ok(response)) => Ok(Arc::new(response)),
                    Ok(Err(e)) => Err(e),
                    // Dropping the provider future cancels the outbound
                    // request.
                    Err(_) => Err(ToolError::Timeout {
                        tool_name: "search".into(),
                        timeout_secs: timeout.as_secs(),
                    }),
                }
            }
            .boxed()
            .shared();
            state.inflight.insert(key.clone(), fut.clone());
            fut
        }
    };

    let result = fut.await;

    // Settle: the pending entry is cleared whether the call succeeded or
    // failed; only successes populate the cache.
    let mut state = state.lock().unwrap();
    state.inflight.remove(&key);
    if let Ok(response) = &result {
        state.cache.insert(key, Arc::clone(response));
    }
    result
}

/// Merge constituent result sets: stable sort descending by score (missing
/// scores sort as 0), dedup by URL keeping the first (highest-scored)
/// occurrence, truncate to the requested maximum. Images dedup by URL and
/// cap at 10; the first non-empty answer wins.
pub fn merge_responses(max_results: usize, responses: &[&SearchResponse]) -> SearchResponse {
    let mut results: Vec<SearchResult> = responses
        .iter()
        .flat_map(|r| r.results.iter().cloned())
        .collect();
    results.sort_by(|a, b| {
        let sa = a.score.unwrap_or(0.0);
        let sb = b.score.unwrap_or(0.0);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut seen = HashSet::new();
    results.retain(|r| seen.insert(r.url.clone()));
    results.truncate(max_results);

    let mut images: Vec<SearchImage> = responses
        .iter()
        .flat_map(|r| r.images.iter().cloned())
        .collect();
    let mut seen_images = HashSet::new();
    images.retain(|i| seen_images.insert(i.url.clone()));
    images.truncate(MAX_MERGED_IMAGES);

    let answer = responses
        .iter()
        .find_map(|r| r.answer.clone().filter(|a| !a.is_empty()));

    SearchResponse {
        results,
        images,
        answer,
    }
}

/// Terminal payload: results plus a synthesized 1-based rank map so
/// downstream citation rendering has a stable contract.
fn to_output(response: &SearchResponse) -> Value {
    let mut rank = serde_json::Map::new();
    for (index, result) in response.results.iter().enumerate() {
        rank.insert(
            (index + 1).to_string(),
            serde_json::to_value(result).unwrap_or(Value::Null),
        );
    }
    json!({
        "results": response.results,
        "images": response.images,
        "answer": response.answer,
        "rank": rank,
    })
}

fn provider_request(input: &SearchInput, depth: SearchDepth) -> ProviderRequest {
    ProviderRequest {
        query: input.query.trim().to_string(),
        max_results: input.max_results,
        depth,
        include_domains: input.include_domains.clone(),
        exclude_domains: input.exclude_domains.clone(),
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns ranked results with titles, URLs, snippets, \
         and an optional direct answer. Supports basic, advanced, and multi depth."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results (default 10)",
                    "default": 10
                },
                "type": {
                    "type": "string",
                    "description": "Search depth profile",
                    "enum": ["basic", "advanced", "multi"],
                    "default": "basic"
                },
                "include_domains": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "exclude_domains": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: Value,
        ctx: ToolContext,
    ) -> Result<ToolEventStream, ToolError> {
        let input: SearchInput = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if input.query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("empty query".into()));
        }
        let provider = self.resolve_provider(&input)?;
        let state = Arc::clone(&self.state);
        let timeout = self.timeout;

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let call_id = ctx.call_id.clone();
            let _ = tx
                .send(ToolEvent::InputAvailable {
                    call_id: call_id.clone(),
                    input: serde_json::to_value(&input).unwrap_or(Value::Null),
                })
                .await;

            let work = async {
                match input.depth {
                    SearchDepth::Multi => {
                        let basic = cached_search(
                            Arc::clone(&state),
                            Arc::clone(&provider),
                            CacheKey::new(&input, SearchDepth::Basic),
                            provider_request(&input, SearchDepth::Basic),
                            timeout,
                        );
                        let advanced = cached_search(
                            Arc::clone(&state),
                            Arc::clone(&provider),
                            CacheKey::new(&input, SearchDepth::Advanced),
                            provider_request(&input, SearchDepth::Advanced),
                            timeout,
                        );
                        let (basic, advanced) = tokio::join!(basic, advanced);
                        match (basic, advanced) {
                            (Ok(b), Ok(a)) => Ok(merge_responses(
                                input.max_results,
                                &[b.as_ref(), a.as_ref()],
                            )),
                            (Ok(b), Err(e)) => {
                                warn!("Advanced sub-query failed: {e}");
                                Ok(merge_responses(input.max_results, &[b.as_ref()]))
                            }
                            (Err(e), Ok(a)) => {
                                warn!("Basic sub-query failed: {e}");
                                Ok(merge_responses(input.max_results, &[a.as_ref()]))
                            }
                            (Err(e), Err(_)) => Err(e),
                        }
                    }
                    depth => cached_search(
                        Arc::clone(&state),
                        provider,
                        CacheKey::new(&input, depth),
                        provider_request(&input, depth),
                        timeout,
                    )
                    .await
                    .map(|r| (*r).clone()),
                }
            };

            let event = tokio::select! {
                _ = ctx.aborted() => ToolEvent::OutputError {
                    call_id,
                    message: "cancelled".into(),
                },
                outcome = work => match outcome {
                    Ok(response) => ToolEvent::OutputAvailable {
                        call_id,
                        output: to_output(&response),
                    },
                    Err(e) => ToolEvent::OutputError {
                        call_id,
                        message: e.to_string(),
                    },
                },
            };
            let _ = tx.send(event).await;
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Mock provider with a call counter and an optional gate that holds
    /// requests in flight until a permit is released.
    struct MockProvider {
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
        response: SearchResponse,
    }

    impl MockProvider {
        fn new(response: SearchResponse) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                response,
            })
        }

        fn gated(response: SearchResponse, gate: Arc<Semaphore>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Some(gate),
                response,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn search(&self, _request: &ProviderRequest) -> Result<SearchResponse, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            Ok(self.response.clone())
        }
    }

    fn sample_response() -> SearchResponse {
        SearchResponse {
            results: vec![SearchResult {
                url: "https://rust-lang.org".into(),
                title: "Rust".into(),
                snippet: "A language empowering everyone".into(),
                score: Some(0.9),
            }],
            images: vec![],
            answer: Some("Rust is a systems language.".into()),
        }
    }

    async fn run_to_terminal(tool: &SearchTool, args: Value) -> ToolEvent {
        let mut stream = tool
            .execute(args, ToolContext::detached("call_1"))
            .await
            .unwrap();
        let first = stream.recv().await.unwrap();
        assert!(matches!(first, ToolEvent::InputAvailable { .. }));
        stream.recv().await.unwrap()
    }

    #[tokio::test]
    async fn search_returns_ranked_output() {
        let provider = MockProvider::new(sample_response());
        let tool = SearchTool::new(provider.clone());

        let terminal = run_to_terminal(&tool, json!({"query": "rust"})).await;
        match terminal {
            ToolEvent::OutputAvailable { output, .. } => {
                assert_eq!(output["results"][0]["url"], "https://rust-lang.org");
                assert_eq!(output["rank"]["1"]["url"], "https://rust-lang.org");
            }
            other => panic!("unexpected terminal {other:?}"),
        }
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_query_rejected() {
        let tool = SearchTool::new(MockProvider::new(sample_response()));
        let err = tool
            .execute(json!({"query": "   "}), ToolContext::detached("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn unknown_provider_rejected() {
        let tool = SearchTool::new(MockProvider::new(sample_response()));
        let err = tool
            .execute(
                json!({"query": "rust", "provider": "nonexistent"}),
                ToolContext::detached("c"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_within_ttl_skips_network() {
        let provider = MockProvider::new(sample_response());
        let tool = SearchTool::new(provider.clone());

        run_to_terminal(&tool, json!({"query": "Rust "})).await;
        // Normalization: differing case/whitespace maps to the same key.
        run_to_terminal(&tool, json!({"query": "  rust"})).await;
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_entry_expires_after_ttl() {
        let provider = MockProvider::new(sample_response());
        let tool = SearchTool::new(provider.clone());

        run_to_terminal(&tool, json!({"query": "rust"})).await;
        tokio::time::advance(Duration::from_secs(301)).await;
        run_to_terminal(&tool, json!({"query": "rust"})).await;
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_removes_earliest_inserted_key() {
        let provider = MockProvider::new(sample_response());
        let tool = SearchTool::new(provider.clone()).with_cache(DEFAULT_CACHE_TTL, 100);

        for i in 0..101 {
            run_to_terminal(&tool, json!({"query": format!("query {i}")})).await;
        }
        assert_eq!(provider.call_count(), 101);

        // query 1 survived the 101st insert (a hit, so no new insert)...
        run_to_terminal(&tool, json!({"query": "query 1"})).await;
        assert_eq!(provider.call_count(), 101);

        // ...but query 0, the earliest-inserted key, was evicted.
        run_to_terminal(&tool, json!({"query": "query 0"})).await;
        assert_eq!(provider.call_count(), 102);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_calls_share_one_request() {
        let gate = Arc::new(Semaphore::new(0));
        let provider = MockProvider::gated(sample_response(), gate.clone());
        let tool = Arc::new(SearchTool::new(provider.clone()));

        let t1 = {
            let tool = Arc::clone(&tool);
            tokio::spawn(async move { run_to_terminal(&tool, json!({"query": "rust"})).await })
        };
        let t2 = {
            let tool = Arc::clone(&tool);
            tokio::spawn(async move { run_to_terminal(&tool, json!({"query": "rust"})).await })
        };

        // Let both callers reach the pending map, then release the single
        // underlying request.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        gate.add_permits(1);

        let (r1, r2) = (t1.await.unwrap(), t2.await.unwrap());
        match (r1, r2) {
            (
                ToolEvent::OutputAvailable { output: o1, .. },
                ToolEvent::OutputAvailable { output: o2, .. },
            ) => assert_eq!(o1, o2, "both callers receive the same result"),
            other => panic!("expected two successful terminals, got {other:?}"),
        }
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_request_times_out() {
        struct NeverProvider;

        #[async_trait]
        impl SearchProvider for NeverProvider {
            fn name(&self) -> &str {
                "never"
            }
            async fn search(
                &self,
                _request: &ProviderRequest,
            ) -> Result<SearchResponse, ToolError> {
                std::future::pending().await
            }
        }

        let tool = SearchTool::new(Arc::new(NeverProvider));
        let terminal = run_to_terminal(&tool, json!({"query": "rust"})).await;
        match terminal {
            ToolEvent::OutputError { message, .. } => {
                assert!(message.contains("timed out"), "got: {message}");
            }
            other => panic!("expected timeout error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn multi_depth_issues_both_subqueries_and_merges() {
        let provider = MockProvider::new(sample_response());
        let tool = SearchTool::new(provider.clone());

        let terminal = run_to_terminal(&tool, json!({"query": "rust", "type": "multi"})).await;
        assert!(matches!(terminal, ToolEvent::OutputAvailable { .. }));
        // basic + advanced sub-queries
        assert_eq!(provider.call_count(), 2);
    }

    #[test]
    fn merge_dedups_by_url_and_sorts_by_score() {
        let a = SearchResponse {
            results: vec![
                SearchResult {
                    url: "a".into(),
                    title: "A".into(),
                    snippet: String::new(),
                    score: Some(0.9),
                },
                SearchResult {
                    url: "b".into(),
                    title: "B".into(),
                    snippet: String::new(),
                    score: Some(0.5),
                },
            ],
            ..Default::default()
        };
        let b = SearchResponse {
            results: vec![
                SearchResult {
                    url: "a".into(),
                    title: "A again".into(),
                    snippet: String::new(),
                    score: Some(0.1),
                },
                SearchResult {
                    url: "c".into(),
                    title: "C".into(),
                    snippet: String::new(),
                    score: Some(0.7),
                },
            ],
            ..Default::default()
        };

        let merged = merge_responses(10, &[&a, &b]);
        let urls: Vec<&str> = merged.results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "c", "b"]);
        assert_eq!(merged.results[0].score, Some(0.9), "a keeps its best score");
    }

    #[test]
    fn merge_missing_scores_sort_last_and_truncates() {
        let a = SearchResponse {
            results: vec![
                SearchResult {
                    url: "unscored".into(),
                    title: String::new(),
                    snippet: String::new(),
                    score: None,
                },
                SearchResult {
                    url: "scored".into(),
                    title: String::new(),
                    snippet: String::new(),
                    score: Some(0.2),
                },
            ],
            ..Default::default()
        };
        let merged = merge_responses(1, &[&a]);
        assert_eq!(merged.results.len(), 1);
        assert_eq!(merged.results[0].url, "scored");
    }

    #[test]
    fn merge_caps_images_and_prefers_first_answer() {
        let images: Vec<SearchImage> = (0..15)
            .map(|i| SearchImage {
                url: format!("img-{i}"),
                description: None,
            })
            .collect();
        let a = SearchResponse {
            results: vec![],
            images: images.clone(),
            answer: Some(String::new()),
        };
        let b = SearchResponse {
            results: vec![],
            images,
            answer: Some("the answer".into()),
        };
        let merged = merge_responses(10, &[&a, &b]);
        assert_eq!(merged.images.len(), 10);
        assert_eq!(merged.answer.as_deref(), Some("the answer"));
    }
}
