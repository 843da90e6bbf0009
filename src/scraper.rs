use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use regex::Regex;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::{info, warn};

use crate::db::SnapshotRow;
use crate::settings::Settings;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static BLANKS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Retrieve the reference page as markdown.
///
/// Goes through spider.cloud when an API key is configured, otherwise a plain
/// GET whose body is taken as markdown. Failures come back as a row with
/// `error` set so they still land in the cache.
pub async fn fetch_page(settings: &Settings) -> Result<SnapshotRow> {
    let url = settings.page_url.as_str();
    match settings.spider_api_key.as_deref() {
        Some(key) => {
            let spider = Spider::new(Some(key.to_string()))
                .map_err(|e| anyhow!("Failed to create Spider client: {}", e))?;
            Ok(with_retry(url, || scrape_one(&spider, url)).await)
        }
        None => {
            info!(url, "no spider key, fetching directly");
            Ok(with_retry(url, || fetch_direct(url)).await)
        }
    }
}

async fn with_retry<F, Fut>(url: &str, fetch: F) -> SnapshotRow
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = SnapshotRow>,
{
    for attempt in 0..MAX_RETRIES {
        let row = fetch().await;
        if !should_retry(&row) {
            return row;
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Retryable failure on {} (attempt {}/{}), backing off {:.1}s",
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    fetch().await
}

fn should_retry(row: &SnapshotRow) -> bool {
    if let Some(status) = row.status {
        if status == 429 || (500..600).contains(&status) {
            return true;
        }
    }
    match &row.error {
        Some(e) if e.contains("429") || e.contains("rate") => true,
        Some(e) if e.contains("500") || e.contains("502") || e.contains("503") => true,
        _ => false,
    }
}

async fn scrape_one(spider: &Spider, url: &str) -> SnapshotRow {
    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Markdown)),
        ..Default::default()
    };

    let start = Instant::now();
    let response = spider.scrape_url(url, Some(params), "application/json").await;
    let elapsed = start.elapsed().as_millis() as i64;

    match response {
        Ok(value) => {
            let parsed: serde_json::Value = match value.as_str() {
                Some(s) => serde_json::from_str(s).unwrap_or(value.clone()),
                None => value,
            };

            let first = parsed.as_array().and_then(|arr| arr.first());

            let markdown = first
                .and_then(|obj| obj.get("content"))
                .and_then(|c| c.as_str())
                .map(strip_images);

            let status = first
                .and_then(|obj| obj.get("status"))
                .and_then(|s| s.as_i64())
                .map(|s| s as i32);

            let error = markdown.is_none().then(|| "No content in spider response".to_string());

            SnapshotRow {
                url: url.to_string(),
                markdown,
                status,
                error,
                latency_ms: Some(elapsed),
            }
        }
        Err(e) => SnapshotRow {
            url: url.to_string(),
            markdown: None,
            status: None,
            error: Some(e.to_string()),
            latency_ms: Some(elapsed),
        },
    }
}

async fn fetch_direct(url: &str) -> SnapshotRow {
    let start = Instant::now();
    let result = async {
        let response = reqwest::get(url).await?;
        let status = response.status();
        let body = response.text().await?;
        Ok::<_, reqwest::Error>((status, body))
    }
    .await;
    let elapsed = start.elapsed().as_millis() as i64;

    match result {
        Ok((status, body)) if status.is_success() => SnapshotRow {
            url: url.to_string(),
            markdown: Some(strip_images(&body)),
            status: Some(status.as_u16() as i32),
            error: None,
            latency_ms: Some(elapsed),
        },
        Ok((status, _)) => SnapshotRow {
            url: url.to_string(),
            markdown: None,
            status: Some(status.as_u16() as i32),
            error: Some(format!("HTTP {}", status)),
            latency_ms: Some(elapsed),
        },
        Err(e) => SnapshotRow {
            url: url.to_string(),
            markdown: None,
            status: None,
            error: Some(e.to_string()),
            latency_ms: Some(elapsed),
        },
    }
}

/// Remove markdown image syntax and squeeze the blank runs it leaves.
fn strip_images(md: &str) -> String {
    let cleaned = IMAGE_RE.replace_all(md, "");
    BLANKS_RE.replace_all(&cleaned, "\n\n").to_string()
}
