//! HTTP clients for the image inference sidecars
//!
//! Zero-shot classification and background removal run in external model
//! servers. These clients speak their small JSON/PNG protocol.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::payload::ImagePayload;
use super::{BackgroundRemover, ImageClassifier, ImageModelLoader};
use crate::classifier::{sort_descending, ClassifierError, LabelScore};
use crate::config::ImageConfig;

/// Connection settings shared by both sidecar clients
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub api_key: Option<SecretString>,
}

impl SidecarConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            api_key: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn http_client(&self) -> Result<Client, ClassifierError> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ClassifierError::Upstream(e.to_string()))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }
}

#[derive(Debug, Serialize)]
struct LoadRequest<'a> {
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    /// base64 encoded PNG
    image: String,
    candidate_labels: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    scores: Vec<LabelScore>,
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClassifierError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClassifierError::Upstream(format!(
        "upstream returned {}: {}",
        status,
        body.trim()
    )))
}

/// Zero-shot image classifier backed by the inference sidecar
pub struct ZeroShotClient {
    http: Client,
    config: SidecarConfig,
    model: String,
}

impl ZeroShotClient {
    pub fn new(config: SidecarConfig, model: impl Into<String>) -> Result<Self, ClassifierError> {
        let http = config.http_client()?;
        Ok(Self {
            http,
            config,
            model: model.into(),
        })
    }

    /// Ask the sidecar to fetch and load the model weights
    pub async fn load_model(&self) -> Result<(), ClassifierError> {
        let url = self.config.url("/v1/models/load");
        info!("Loading image model {} via {}", self.model, url);

        let request = self
            .config
            .authorize(self.http.post(&url))
            .json(&LoadRequest { model: &self.model });

        let response = request
            .send()
            .await
            .map_err(|e| ClassifierError::Upstream(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ImageClassifier for ZeroShotClient {
    async fn classify(
        &self,
        image: &ImagePayload,
        labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        let url = self.config.url("/v1/zero-shot/classify");
        debug!(
            "Zero-shot classify: {}x{} image against {} labels",
            image.width(),
            image.height(),
            labels.len()
        );

        let body = ClassifyRequest {
            model: &self.model,
            image: BASE64.encode(image.png_bytes()),
            candidate_labels: labels,
        };

        let response = self
            .config
            .authorize(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::Upstream(e.to_string()))?;

        let parsed: ClassifyResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        let returned = parsed.scores.len();
        let mut scores: Vec<LabelScore> = parsed
            .scores
            .into_iter()
            .filter(|s| labels.contains(&s.label))
            .collect();
        if scores.len() < returned {
            warn!(
                "Dropped {} score(s) for labels outside the candidate set",
                returned - scores.len()
            );
        }
        if scores.is_empty() {
            return Err(ClassifierError::InvalidResponse(
                "classifier returned no scores for the candidate labels".to_string(),
            ));
        }
        sort_descending(&mut scores);
        Ok(scores)
    }
}

/// Loads the zero-shot model and hands back a ready classifier
pub struct ZeroShotLoader {
    config: SidecarConfig,
    model: String,
}

impl ZeroShotLoader {
    pub fn new(config: SidecarConfig, model: impl Into<String>) -> Self {
        Self {
            config,
            model: model.into(),
        }
    }

    pub fn from_config(image: &ImageConfig) -> Self {
        let sidecar = SidecarConfig {
            base_url: image.service_url.clone(),
            timeout: image.timeout(),
            api_key: image.api_key.clone(),
        };
        Self::new(sidecar, image.model_name.clone())
    }
}

#[async_trait]
impl ImageModelLoader for ZeroShotLoader {
    async fn load(&self) -> Result<Box<dyn ImageClassifier>, ClassifierError> {
        let client = ZeroShotClient::new(self.config.clone(), self.model.clone())?;
        client.load_model().await?;
        Ok(Box::new(client))
    }
}

/// Background removal backed by the segmentation sidecar
pub struct BackgroundRemovalClient {
    http: Client,
    config: SidecarConfig,
}

impl BackgroundRemovalClient {
    pub fn new(config: SidecarConfig) -> Result<Self, ClassifierError> {
        let http = config.http_client()?;
        Ok(Self { http, config })
    }

    pub fn from_config(image: &ImageConfig) -> Result<Self, ClassifierError> {
        Self::new(SidecarConfig {
            base_url: image.background_url.clone(),
            timeout: image.timeout(),
            api_key: image.api_key.clone(),
        })
    }
}

#[async_trait]
impl BackgroundRemover for BackgroundRemovalClient {
    async fn isolate_subject(&self, image: &ImagePayload) -> Result<ImagePayload, ClassifierError> {
        let url = self.config.url("/v1/remove-background");
        debug!("Removing background from {}x{} image", image.width(), image.height());

        let response = self
            .config
            .authorize(self.http.post(&url))
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(image.png_bytes().clone())
            .send()
            .await
            .map_err(|e| ClassifierError::Upstream(e.to_string()))?;

        let png: Bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        ImagePayload::from_png(png)
    }
}
