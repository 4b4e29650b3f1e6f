//! Web evidence retrieval.
//!
//! Queries an HTML search endpoint for each claim and parses the result
//! blocks out of the page. Repeat queries are served from a TTL cache,
//! outbound requests go through a rate limiter, and concurrent identical
//! queries share a single in-flight fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, warn};
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::cache::EvidenceCache;
use crate::config::SearchConfig;
use crate::error::FactCheckError;
use crate::rate_limit::RateLimiter;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// Redirect wrapper the endpoint puts around result links.
const REDIRECT_PREFIX: &str = "/l/?kh=-1&uddg=";

/// One parsed search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// Raw page fetched from the search endpoint.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Transport used to reach the search endpoint.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn fetch_page(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedPage, FactCheckError>;
}

/// HTTP transport backed by a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Build the HTTP client shared by all searches.
pub fn default_client() -> Result<reqwest::Client, FactCheckError> {
    Ok(reqwest::Client::builder().build()?)
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn fetch_page(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedPage, FactCheckError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(FetchedPage { status, body })
    }
}

type InflightSlot = Arc<Mutex<Option<Vec<EvidenceResult>>>>;

/// Cached, rate-limited evidence search.
#[derive(Clone)]
pub struct WebSearcher {
    transport: Arc<dyn SearchTransport>,
    cache: Arc<Mutex<EvidenceCache>>,
    limiter: Arc<RateLimiter>,
    inflight: Arc<Mutex<HashMap<String, InflightSlot>>>,
    endpoint: String,
    num_results: usize,
    timeout: Duration,
}

impl WebSearcher {
    pub fn new(transport: Arc<dyn SearchTransport>, config: &SearchConfig) -> Self {
        Self {
            transport,
            cache: Arc::new(Mutex::new(EvidenceCache::new(
                config.cache_size,
                Duration::from_secs(config.cache_ttl_secs),
            ))),
            limiter: Arc::new(RateLimiter::new(config.rate_limit_per_sec)),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            endpoint: config.endpoint.clone(),
            num_results: config.num_results,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Search for evidence on a single query.
    ///
    /// Never fails: network and endpoint errors are logged and produce
    /// an empty result list. Failed fetches are not cached, so a later
    /// call for the same query retries.
    pub async fn search(&self, query: &str) -> Vec<EvidenceResult> {
        if let Some(results) = self.cache.lock().await.get(query) {
            info!("Cache hit for query: {}", query);
            return results;
        }

        let slot = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(query.to_string()).or_default().clone()
        };
        let mut guard = slot.lock().await;

        // Another task finished this query while we waited on the slot.
        if let Some(results) = guard.as_ref() {
            return results.clone();
        }
        if let Some(results) = self.cache.lock().await.get(query) {
            info!("Cache hit for query: {}", query);
            return results;
        }

        let results = self.fetch_and_parse(query).await;
        *guard = Some(results.clone());
        self.inflight.lock().await.remove(query);
        results
    }

    async fn fetch_and_parse(&self, query: &str) -> Vec<EvidenceResult> {
        self.limiter.acquire().await;

        let url = match Url::parse_with_params(&self.endpoint, [("q", query)]) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid search endpoint {}: {}", self.endpoint, e);
                return Vec::new();
            }
        };

        let page = match self.transport.fetch_page(url.as_str(), self.timeout).await {
            Ok(page) => page,
            Err(FactCheckError::HttpError(e)) if e.is_timeout() => {
                error!("Search timed out for query: {}", query);
                return Vec::new();
            }
            Err(e) => {
                error!("Network error during web search: {}", e);
                return Vec::new();
            }
        };

        if page.status != 200 {
            error!("HTTP error {} for query: {}", page.status, query);
            return Vec::new();
        }

        let results = parse_results(&page.body, self.num_results);
        if results.is_empty() {
            warn!("No results found for query: {}", query);
        }

        // A parsed page is cached even when it held no results.
        self.cache.lock().await.put(query, results.clone());
        results
    }

    /// Search several queries concurrently, preserving input order.
    pub async fn batch_search(&self, queries: &[String]) -> Vec<Vec<EvidenceResult>> {
        let mut set = JoinSet::new();
        for (index, query) in queries.iter().enumerate() {
            let searcher = self.clone();
            let query = query.clone();
            set.spawn(async move { (index, searcher.search(&query).await) });
        }

        let mut ordered = vec![Vec::new(); queries.len()];
        while let Some(joined) = set.join_next().await {
            if let Ok((index, results)) = joined {
                ordered[index] = results;
            }
        }
        ordered
    }
}

/// Parse result blocks out of a search results page.
///
/// Takes the first `num_results` result bodies in page order. A block
/// missing its title, snippet, or link is skipped rather than failing
/// the whole page.
pub fn parse_results(html: &str, num_results: usize) -> Vec<EvidenceResult> {
    let block_re = match Regex::new(r#"(?i)<div[^>]*class="[^"]*result__body[^"]*"[^>]*>"#) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    let starts: Vec<usize> = block_re.find_iter(html).map(|m| m.start()).collect();
    let mut results = Vec::new();

    for (i, &start) in starts.iter().take(num_results).enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(html.len());
        let block = &html[start..end];

        let title = extract_inner_text(
            block,
            r#"(?is)<h2[^>]*class="[^"]*result__title[^"]*"[^>]*>(.*?)</h2>"#,
        );
        let snippet = extract_inner_text(
            block,
            r#"(?is)<a[^>]*class="[^"]*result__snippet[^"]*"[^>]*>(.*?)</a>"#,
        );
        let link = extract_result_link(block);

        if let (Some(title), Some(snippet), Some(link)) = (title, snippet, link) {
            results.push(EvidenceResult {
                title,
                snippet,
                link,
            });
        }
    }

    results
}

fn extract_inner_text(block: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(block)?;
    Some(strip_markup(caps.get(1)?.as_str()))
}

fn extract_result_link(block: &str) -> Option<String> {
    let tag_re = Regex::new(r#"(?i)<a[^>]*class="[^"]*result__url[^"]*"[^>]*>"#).ok()?;
    let tag = tag_re.find(block)?.as_str();
    let href_re = Regex::new(r#"(?i)href\s*=\s*"([^"]*)""#).ok()?;
    let href = href_re.captures(tag)?.get(1)?.as_str();

    let link = decode_entities(href);
    if link.starts_with(REDIRECT_PREFIX) {
        Some(link[REDIRECT_PREFIX.len()..].to_string())
    } else {
        Some(link)
    }
}

/// Drop tags and decode common entities from an HTML fragment.
fn strip_markup(fragment: &str) -> String {
    let mut text = fragment.to_string();
    if let Ok(re) = Regex::new(r"</?\w+[^>]*>") {
        text = re.replace_all(&text, "").to_string();
    }
    let text = decode_entities(&text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
