//! Research tools: web search and page fetch
//!
//! Network failures map to `CollaboratorUnavailable` and are retried here
//! with bounded backoff before a fault ever reaches the dispatcher;
//! everything else is a plain execution fault.

use serde_json::{json, Value};

use forge_core::{ForgeError, Result, RetryPolicy};

use crate::context::{Args, ToolEnv};

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; ForgeBot/1.0)";
const MAX_PAGE_CHARS: usize = 50_000;
const DEFAULT_RESULTS: i64 = 5;
const NETWORK_ATTEMPTS: u32 = 3;

/// Retry a network operation on transient failure, doubling backoff
async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempts = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && policy.allows_retry(attempts + 1) => {
                attempts += 1;
                let backoff = policy.backoff_for(attempts);
                tracing::warn!(
                    attempt = attempts,
                    backoff_secs = backoff.as_secs(),
                    error = %err,
                    "Transient network failure, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

pub async fn web_search(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let query = args.non_empty_str("query")?;
    let num_results = args
        .integer_opt("num_results")
        .unwrap_or(DEFAULT_RESULTS)
        .clamp(1, 10);

    let api_key = std::env::var("GOOGLE_SEARCH_API_KEY").map_err(|_| {
        ForgeError::ToolExecution("Web search is not configured (GOOGLE_SEARCH_API_KEY)".into())
    })?;
    let cx = std::env::var("GOOGLE_SEARCH_CX").map_err(|_| {
        ForgeError::ToolExecution("Web search is not configured (GOOGLE_SEARCH_CX)".into())
    })?;

    tracing::debug!(query, num_results, "Web search");
    let policy = RetryPolicy::new(NETWORK_ATTEMPTS);
    let num = num_results.to_string();
    let (http, key, cx, num) = (&env.http, api_key.as_str(), cx.as_str(), num.as_str());
    let response = with_retry(&policy, move || async move {
        let response = http
            .get(SEARCH_ENDPOINT)
            .query(&[("key", key), ("cx", cx), ("q", query), ("num", num)])
            .send()
            .await
            .map_err(|e| {
                ForgeError::CollaboratorUnavailable(format!("Search request failed: {}", e))
            })?;
        if !response.status().is_success() {
            return Err(ForgeError::CollaboratorUnavailable(format!(
                "Search returned HTTP {}",
                response.status()
            )));
        }
        Ok(response)
    })
    .await?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| ForgeError::ToolExecution(format!("Malformed search response: {}", e)))?;

    let results: Vec<Value> = body["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    json!({
                        "title": item["title"].as_str().unwrap_or(""),
                        "link": item["link"].as_str().unwrap_or(""),
                        "snippet": item["snippet"].as_str().unwrap_or(""),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(json!({ "query": query, "results": results }))
}

pub async fn view_text_website(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let url = args.non_empty_str("url")?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ForgeError::InvalidArguments(format!(
            "Unsupported URL scheme in '{}'",
            url
        )));
    }

    tracing::debug!(url, "Fetching page");
    let policy = RetryPolicy::new(NETWORK_ATTEMPTS);
    let http = &env.http;
    let response = with_retry(&policy, move || async move {
        http.get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| ForgeError::CollaboratorUnavailable(format!("Fetch failed: {}", e)))
    })
    .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ForgeError::ToolExecution(format!(
            "'{}' returned HTTP {}",
            url, status
        )));
    }

    let html = response
        .text()
        .await
        .map_err(|e| ForgeError::CollaboratorUnavailable(format!("Fetch failed: {}", e)))?;

    let mut content = html_to_text(&html);
    let truncated = content.len() > MAX_PAGE_CHARS;
    if truncated {
        content.truncate(MAX_PAGE_CHARS);
        content.push_str("\n[... content truncated ...]");
    }

    Ok(json!({ "url": url, "content": content, "truncated": truncated }))
}

/// Reduce an HTML document to readable text: drop non-content elements,
/// strip the remaining tags, decode common entities, collapse blank runs
fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();
    for element in ["script", "style", "noscript", "nav", "footer", "header"] {
        text = drop_element(&text, element);
    }

    let mut out = String::with_capacity(text.len() / 2);
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => {
                in_tag = true;
                // Tags frequently act as word separators
                out.push(' ');
            }
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }

    let out = decode_entities(&out);
    let lines: Vec<&str> = out
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n")
}

/// Remove every `<element ...>...</element>` region, case-insensitively
fn drop_element(html: &str, element: &str) -> String {
    // ASCII lowering keeps byte offsets aligned with the original
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", element);
    let close = format!("</{}>", element);

    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open) {
        let start = pos + start;
        out.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return out,
        }
    }
    out.push_str(&html[pos..]);
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
