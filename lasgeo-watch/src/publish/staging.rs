//! Dépôt du document dans le stockage objet de staging
//!
//! Le client S3 n'existe qu'avec le feature `s3`. Sans lui, [`NullStaging`]
//! refuse chaque dépôt et la publication est abandonnée proprement.

use std::sync::Arc;

use async_trait::async_trait;

use super::{PublishError, StagingCredentials};

/// Capacité de dépôt d'un objet avec des identifiants temporaires
#[async_trait]
pub trait StagingStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn put_object(
        &self,
        credentials: &StagingCredentials,
        body: Vec<u8>,
    ) -> Result<(), PublishError>;
}

/// Stockage absent: chaque dépôt échoue en `StagingUnavailable`
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStaging;

#[async_trait]
impl StagingStore for NullStaging {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn put_object(
        &self,
        _credentials: &StagingCredentials,
        _body: Vec<u8>,
    ) -> Result<(), PublishError> {
        Err(PublishError::StagingUnavailable)
    }
}

#[cfg(feature = "s3")]
pub use self::s3_staging::S3Staging;

#[cfg(feature = "s3")]
mod s3_staging {
    use async_trait::async_trait;
    use s3::creds::Credentials;
    use s3::{Bucket, Region};
    use tracing::debug;

    use super::StagingStore;
    use crate::publish::{PublishError, StagingCredentials};

    /// Dépôt S3 (bucket de staging Mapbox, région us-east-1)
    #[derive(Debug, Clone, Copy, Default)]
    pub struct S3Staging;

    #[async_trait]
    impl StagingStore for S3Staging {
        fn name(&self) -> &'static str {
            "s3"
        }

        async fn put_object(
            &self,
            credentials: &StagingCredentials,
            body: Vec<u8>,
        ) -> Result<(), PublishError> {
            let creds = Credentials::new(
                Some(credentials.access_key_id.as_str()),
                Some(credentials.secret_access_key.as_str()),
                None,
                Some(credentials.session_token.as_str()),
                None,
            )
            .map_err(|e| PublishError::Staging(e.to_string()))?;

            let bucket = Bucket::new(&credentials.bucket, Region::UsEast1, creds)
                .map_err(|e| PublishError::Staging(e.to_string()))?;

            debug!(
                bucket = credentials.bucket.as_str(),
                key = credentials.key.as_str(),
                bytes = body.len(),
                "Uploading to staging bucket"
            );

            let response = bucket
                .put_object(&credentials.key, &body)
                .await
                .map_err(|e| PublishError::Staging(e.to_string()))?;

            if !(200..300).contains(&response.status_code()) {
                return Err(PublishError::Staging(format!(
                    "S3 responded with HTTP {}",
                    response.status_code()
                )));
            }

            Ok(())
        }
    }
}

/// Stockage retenu au démarrage selon les features compilés
pub fn default_staging() -> Arc<dyn StagingStore> {
    #[cfg(feature = "s3")]
    {
        Arc::new(S3Staging)
    }

    #[cfg(not(feature = "s3"))]
    {
        Arc::new(NullStaging)
    }
}
