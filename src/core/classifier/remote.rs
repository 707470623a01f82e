//! HTTP inference endpoint client.
//!
//! The endpoint receives a JPEG body and answers with a JSON array of
//! `{"label": ..., "score": ...}` objects.

use std::time::Duration;

use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use super::{ClassifierError, FrameClassifier, LabelScore, LoadedClassifier};
use crate::core::video::Frame;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteClassifierConfig {
    pub endpoint: String,
    /// Probed once by `load`; defaults to the endpoint itself.
    pub health_url: Option<String>,
    pub api_token: Option<String>,
    pub timeout_ms: u64,
    pub jpeg_quality: u8,
    /// Frames are downscaled to this square size before upload.
    pub input_size: u32,
}

impl Default for RemoteClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            health_url: None,
            api_token: None,
            timeout_ms: 30_000,
            jpeg_quality: 85,
            input_size: 224,
        }
    }
}

pub struct RemoteClassifier {
    config: RemoteClassifierConfig,
}

impl RemoteClassifier {
    pub fn new(config: RemoteClassifierConfig) -> Self {
        Self { config }
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self::new(RemoteClassifierConfig {
            endpoint: endpoint.into(),
            ..Default::default()
        })
    }
}

impl FrameClassifier for RemoteClassifier {
    fn name(&self) -> &str {
        "remote"
    }

    fn load(&self) -> Result<Box<dyn LoadedClassifier>, ClassifierError> {
        if self.config.endpoint.is_empty() {
            return Err(ClassifierError::LoadFailed("no endpoint configured".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .build()?;

        let health_url = self
            .config
            .health_url
            .as_deref()
            .unwrap_or(&self.config.endpoint);

        info!("🔧 Checking inference endpoint: {}", health_url);
        let mut request = client.get(health_url);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| ClassifierError::LoadFailed(format!("{} unreachable: {}", health_url, e)))?;

        if response.status().is_server_error() {
            return Err(ClassifierError::LoadFailed(format!(
                "{} answered {}",
                health_url,
                response.status()
            )));
        }

        info!("✅ Inference endpoint ready");
        Ok(Box::new(RemoteHandle {
            client,
            config: self.config.clone(),
        }))
    }
}

struct RemoteHandle {
    client: Client,
    config: RemoteClassifierConfig,
}

impl LoadedClassifier for RemoteHandle {
    fn classify(&self, frame: &Frame) -> Result<Vec<LabelScore>, ClassifierError> {
        let size = self.config.input_size;
        let body = frame.resize_to(size, size)?.encode_jpeg(self.config.jpeg_quality)?;

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "image/jpeg")
            .body(body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            warn!("Inference endpoint answered {} for frame {}", status, frame.frame_number);
            return Err(ClassifierError::ClassificationFailed(format!(
                "endpoint answered {}",
                status
            )));
        }

        parse_labels(&response.bytes()?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelsResponse {
    Flat(Vec<LabelScore>),
    // batched endpoints wrap the single image result in an outer array
    Batched(Vec<Vec<LabelScore>>),
}

fn parse_labels(body: &[u8]) -> Result<Vec<LabelScore>, ClassifierError> {
    let parsed: LabelsResponse = serde_json::from_slice(body)
        .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

    let labels = match parsed {
        LabelsResponse::Flat(labels) => labels,
        LabelsResponse::Batched(mut batches) => {
            if batches.is_empty() {
                Vec::new()
            } else {
                batches.swap_remove(0)
            }
        }
    };

    if let Some(bad) = labels
        .iter()
        .find(|l| !l.score.is_finite() || l.score < 0.0)
    {
        return Err(ClassifierError::InvalidResponse(format!(
            "label {} has invalid score {}",
            bad.label, bad.score
        )));
    }

    Ok(labels)
}
