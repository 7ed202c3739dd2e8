use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::AnalysisResult;
use crate::export;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    Mock,
    Live,
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMode::Mock => f.write_str("mock"),
            ClientMode::Live => f.write_str("live"),
        }
    }
}

impl FromStr for ClientMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(ClientMode::Mock),
            "live" => Ok(ClientMode::Live),
            _ => Err(format!("invalid client mode: {s} (expected mock|live)")),
        }
    }
}

// The backend collaborator, reduced to its three capabilities. Send + Sync
// so the TUI can hand a clone of the boxed client to its worker thread.
pub trait AnalysisClient: Send + Sync {
    fn mode(&self) -> ClientMode;

    fn analyze(&self, raw_text: &str) -> Result<AnalysisResult>;

    fn export_csv(&self, feature_id: &str) -> Result<String>;

    fn export_json(&self, feature_id: &str) -> Result<String>;
}

// Envelope the analyze endpoint wraps results in.
#[derive(Debug, Deserialize)]
struct AnalyzeEnvelope {
    status: String,
    #[serde(default)]
    data: Option<AnalysisResult>,
    #[serde(default)]
    message: Option<String>,
}

pub struct HttpAnalysisClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn get_text(&self, url: &str, what: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("{what}: backend unreachable at {}", self.base_url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("{what}: API error: {status}");
        }
        resp.text().with_context(|| format!("{what}: failed to read response body"))
    }
}

impl AnalysisClient for HttpAnalysisClient {
    fn mode(&self) -> ClientMode {
        ClientMode::Live
    }

    fn analyze(&self, raw_text: &str) -> Result<AnalysisResult> {
        let url = format!("{}/analyze", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("text", raw_text)])
            .send()
            .with_context(|| format!("analyze: backend unreachable at {}", self.base_url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("analyze: API error: {status}");
        }

        let envelope: AnalyzeEnvelope = resp
            .json()
            .context("analyze: response was not valid JSON")?;

        if envelope.status != "success" {
            anyhow::bail!(
                "{}",
                envelope
                    .message
                    .unwrap_or_else(|| "Analysis failed".to_string())
            );
        }
        envelope
            .data
            .ok_or_else(|| anyhow::anyhow!("analyze: response carried no data"))
    }

    fn export_csv(&self, feature_id: &str) -> Result<String> {
        let url = format!("{}/export/csv?feature_id={feature_id}", self.base_url);
        self.get_text(&url, "export csv")
    }

    fn export_json(&self, feature_id: &str) -> Result<String> {
        let url = format!("{}/export/json?feature_id={feature_id}", self.base_url);
        self.get_text(&url, "export json")
    }
}

// Offline stand-in: the demo fixture for analyze, client-side builders for
// the exports.
pub struct MockAnalysisClient;

impl AnalysisClient for MockAnalysisClient {
    fn mode(&self) -> ClientMode {
        ClientMode::Mock
    }

    fn analyze(&self, _raw_text: &str) -> Result<AnalysisResult> {
        Ok(crate::mock::sample_result())
    }

    fn export_csv(&self, _feature_id: &str) -> Result<String> {
        Ok(export::build_csv(&crate::mock::sample_result()))
    }

    fn export_json(&self, _feature_id: &str) -> Result<String> {
        export::build_json(&crate::mock::sample_result())
    }
}

// Mode is an explicit input here, never read from ambient state at the call
// site.
pub fn from_mode(
    mode: ClientMode,
    base_url: &str,
    timeout: Duration,
) -> Result<Box<dyn AnalysisClient>> {
    match mode {
        ClientMode::Mock => Ok(Box::new(MockAnalysisClient)),
        ClientMode::Live => Ok(Box::new(HttpAnalysisClient::new(base_url, timeout)?)),
    }
}
