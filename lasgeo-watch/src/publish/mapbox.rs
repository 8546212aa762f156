//! Client de l'API Mapbox Uploads (`/uploads/v1`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::{PublishError, StagingCredentials, TilesetService, UploadAccepted, UploadRequest};
use crate::config::PublishConfig;

/// Client HTTP de l'API Uploads
#[derive(Debug, Clone)]
pub struct MapboxUploads {
    config: PublishConfig,
    client: reqwest::Client,
}

impl MapboxUploads {
    pub fn new(config: PublishConfig, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { config, client })
    }

    fn credentials_url(&self) -> String {
        format!(
            "{}/uploads/v1/{}/credentials?access_token={}",
            self.config.api_url, self.config.username, self.config.access_token
        )
    }

    fn uploads_url(&self) -> String {
        format!(
            "{}/uploads/v1/{}?access_token={}",
            self.config.api_url, self.config.username, self.config.access_token
        )
    }
}

#[async_trait]
impl TilesetService for MapboxUploads {
    async fn request_credentials(&self) -> Result<StagingCredentials, PublishError> {
        debug!(user = self.config.username.as_str(), "Requesting staging credentials");
        let response = self.client.post(self.credentials_url()).send().await?;

        if response.status() != StatusCode::OK {
            return Err(PublishError::Credentials {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<StagingCredentials>().await?)
    }

    async fn create_upload(&self, request: &UploadRequest) -> Result<UploadAccepted, PublishError> {
        debug!(tileset = request.tileset.as_str(), "Creating upload");
        let response = self
            .client
            .post(self.uploads_url())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::CreateUpload {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let upload_id = body
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        Ok(UploadAccepted { upload_id })
    }
}
