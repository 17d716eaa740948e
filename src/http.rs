//! HTTP implementation of the three remote collaborators.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{Readiness, StagedFile};
use crate::services::{CollectionResolver, NameChecker, UploadTransport};

#[derive(Clone)]
pub struct HttpKnowledgeBase {
    client: reqwest::Client,
    upload_url: String,
    name_check_url: String,
    info_url: String,
    index_field: String,
}

impl HttpKnowledgeBase {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kb-upload/", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::debug!("Knowledge base api at {}", config.api_url);

        Ok(Self {
            client,
            upload_url: config.endpoint(&config.upload_path),
            name_check_url: config.endpoint(&config.name_check_path),
            info_url: config.endpoint(&config.info_path),
            index_field: config.index_field.clone(),
        })
    }

    // append path segments, percent-encoding user supplied names
    fn url_with_segments(base: &str, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = Url::parse(base)
            .map_err(|e| ServiceError::Transport(format!("invalid url {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Transport(format!("url {} cannot take a path", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn file_part(file: &StagedFile) -> Part {
        let part = || Part::stream_with_length(file.data.clone(), file.size()).file_name(file.name.clone());
        match file.media_type.as_deref() {
            Some(media_type) => part().mime_str(media_type).unwrap_or_else(|e| {
                tracing::warn!("Ignoring media type {} of {}: {}", media_type, file.name, e);
                part()
            }),
            None => part(),
        }
    }
}

#[async_trait]
impl CollectionResolver for HttpKnowledgeBase {
    async fn resolve(&self, scope: &str, cancel: CancellationToken) -> Result<Readiness, ServiceError> {
        let url = Self::url_with_segments(&self.info_url, &[scope, "info"])?;
        tracing::trace!("GET {}", url);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
            res = self.client.get(url).send() => res?,
        };

        match response.status() {
            s if s.is_success() => Ok(Readiness::Ready),
            StatusCode::NOT_FOUND => Ok(Readiness::NotReady),
            s => Err(ServiceError::Status(s.as_u16())),
        }
    }
}

#[async_trait]
impl NameChecker for HttpKnowledgeBase {
    async fn name_exists(&self, name: &str) -> Result<bool, ServiceError> {
        let url = Self::url_with_segments(&self.name_check_url, &[name])?;
        tracing::trace!("GET {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }
        Ok(response.json::<bool>().await?)
    }
}

#[async_trait]
impl UploadTransport for HttpKnowledgeBase {
    async fn upload(&self, file: &StagedFile, target: &str) -> Result<serde_json::Value, ServiceError> {
        let form = Form::new()
            .part("file", Self::file_part(file))
            .text(self.index_field.clone(), target.to_string());

        let response = self.client.post(&self.upload_url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }
        Ok(response.json::<serde_json::Value>().await?)
    }
}
