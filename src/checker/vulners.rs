use super::{LookupFailure, LookupHit, LookupTransport};
use crate::config::LookupConfig;
use crate::model::{PackageRecord, UNKNOWN_IDENTIFIER};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Vulners software audit endpoint.
pub const DEFAULT_API_URL: &str = "https://vulners.com/api/v3/burp/software/";

/// Longest slice of a malformed body kept for diagnostics.
const BODY_EXCERPT_LEN: usize = 200;

/// Queries the Vulners software search API, one GET per package.
pub struct VulnersTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl VulnersTransport {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("patchwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: None,
        })
    }

    pub fn from_config(config: &LookupConfig) -> Result<Self> {
        let transport = Self::new(&config.api_url, Duration::from_secs(config.timeout_secs))?;
        Ok(match &config.api_key {
            Some(key) if !key.is_empty() => transport.with_api_key(key.clone()),
            _ => transport,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn query_params<'a>(&'a self, package: &'a PackageRecord) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![
            ("software", package.name.as_str()),
            ("version", package.version.as_str()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("apiKey", key.as_str()));
        }
        params
    }
}

#[derive(Deserialize)]
struct VulnersResponse {
    data: Option<VulnersData>,
}

#[derive(Deserialize)]
struct VulnersData {
    search: Option<Vec<VulnersHit>>,
}

#[derive(Deserialize)]
struct VulnersHit {
    id: Option<String>,
}

fn classify_transport_error(err: &reqwest::Error) -> LookupFailure {
    if err.is_timeout() {
        LookupFailure::Timeout
    } else {
        LookupFailure::Network(err.to_string())
    }
}

/// Extracts hits from a response body.
///
/// A missing `data` object or `search` list means no known vulnerabilities.
fn parse_hits(body: &str) -> Result<Vec<LookupHit>, LookupFailure> {
    let response: VulnersResponse = serde_json::from_str(body).map_err(|e| {
        let excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
        LookupFailure::Malformed(format!("{} (body: {})", e, excerpt))
    })?;

    let hits = response
        .data
        .and_then(|data| data.search)
        .unwrap_or_default()
        .into_iter()
        .map(|hit| LookupHit::new(hit.id.unwrap_or_else(|| UNKNOWN_IDENTIFIER.to_string())))
        .collect();

    Ok(hits)
}

#[async_trait]
impl LookupTransport for VulnersTransport {
    fn name(&self) -> &'static str {
        "Vulners"
    }

    async fn lookup(&self, package: &PackageRecord) -> Result<Vec<LookupHit>, LookupFailure> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&self.query_params(package))
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupFailure::RateLimited);
        }
        if !status.is_success() {
            return Err(LookupFailure::Http(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        parse_hits(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hits_with_results() {
        let body = r#"{"result":"OK","data":{"search":[{"id":"CVE-2021-0001"},{"id":"CVE-2021-0002","_source":{}}]}}"#;
        let hits = parse_hits(body).unwrap();
        assert_eq!(
            hits,
            vec![LookupHit::new("CVE-2021-0001"), LookupHit::new("CVE-2021-0002")]
        );
    }

    #[test]
    fn test_parse_hits_missing_id_is_unknown() {
        let body = r#"{"data":{"search":[{"title":"no id here"}]}}"#;
        let hits = parse_hits(body).unwrap();
        assert_eq!(hits, vec![LookupHit::new("unknown")]);
    }

    #[test]
    fn test_parse_hits_absent_or_empty_list() {
        assert!(parse_hits(r#"{"data":{"search":[]}}"#).unwrap().is_empty());
        assert!(parse_hits(r#"{"data":{"error":"Nothing found","errorCode":0}}"#)
            .unwrap()
            .is_empty());
        assert!(parse_hits(r#"{"result":"OK"}"#).unwrap().is_empty());
        assert!(parse_hits(r#"{"data":null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_hits_malformed_is_fatal() {
        let err = parse_hits("<html>Bad gateway</html>").unwrap_err();
        assert!(matches!(err, LookupFailure::Malformed(_)));
        assert!(err.to_string().contains("<html>"));

        let err = parse_hits(r#"{"data":{"search":"oops"}}"#).unwrap_err();
        assert!(matches!(err, LookupFailure::Malformed(_)));
    }

    #[test]
    fn test_query_params_include_api_key() {
        let transport = VulnersTransport::new(DEFAULT_API_URL, Duration::from_secs(5))
            .unwrap()
            .with_api_key("secret");
        let pkg = PackageRecord::new("openssl", "1.1.1");
        assert_eq!(
            transport.query_params(&pkg),
            vec![("software", "openssl"), ("version", "1.1.1"), ("apiKey", "secret")]
        );
    }

    #[test]
    fn test_transport_name() {
        let transport = VulnersTransport::new(DEFAULT_API_URL, Duration::from_secs(5)).unwrap();
        assert_eq!(transport.name(), "Vulners");
    }
}
