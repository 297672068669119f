//! HTTP client for the verification oracle (the ML analysis service).
//!
//! The service judges a report's text and media and returns a sentiment,
//! keyword, and fake-detection verdict. Its wire format is camelCase; the
//! stored [`MlAnalysis`] is the platform-native shape.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shorewatch_common::config::Config;
use shorewatch_common::types::{
    FakeDetection, HazardKind, MediaAttachment, MlAnalysis, Report, ReportSeverity,
};

use crate::traits::VerificationOracle;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    report_id: Uuid,
    text: String,
    hazard_type: HazardKind,
    severity: ReportSeverity,
    media: &'a [MediaAttachment],
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    sentiment: String,
    confidence: f64,
    #[serde(default)]
    keywords: Vec<String>,
    fake_detection: FakeDetectionWire,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct FakeDetectionWire {
    is_fake: bool,
    confidence: f64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOracle {
    /// `timeout` caps the HTTP round trip; dispatch applies its own overall
    /// bound on top.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build oracle HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.oracle_url.clone(), config.oracle_timeout())
    }
}

#[async_trait]
impl VerificationOracle for HttpOracle {
    async fn analyze(&self, report: &Report) -> Result<MlAnalysis> {
        let request = AnalyzeRequest {
            report_id: report.id,
            text: format!("{} {}", report.title, report.description),
            hazard_type: report.hazard,
            severity: report.severity,
            media: &report.media,
        };

        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Analysis request failed")?;

        if !response.status().is_success() {
            bail!("Analysis service returned {}", response.status());
        }

        let body: AnalyzeResponse = response
            .json()
            .await
            .context("Failed to parse analysis response")?;

        Ok(MlAnalysis {
            sentiment: body.sentiment,
            confidence: body.confidence,
            keywords: body.keywords,
            fake_detection: FakeDetection {
                is_fake: body.fake_detection.is_fake,
                confidence: body.fake_detection.confidence,
            },
        })
    }
}
