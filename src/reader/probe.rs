use crate::error::LayerError;
use crate::traits::ResourceProbe;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::debug;

/// Checks that a remote file answers with a 2xx status.
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(HttpProbe { client })
    }
}

#[async_trait]
impl ResourceProbe for HttpProbe {
    async fn probe(&self, locator: &str) -> Result<(), LayerError> {
        debug!(resource = locator, "probing");
        let response =
            self.client
                .get(locator)
                .send()
                .await
                .map_err(|e| LayerError::Unreachable {
                    resource: locator.to_string(),
                    message: e.to_string(),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LayerError::ResourceNotFound {
                resource: locator.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }
}

/// Filesystem counterpart of [`HttpProbe`], reporting HTTP-style statuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProbe;

#[async_trait]
impl ResourceProbe for LocalProbe {
    async fn probe(&self, locator: &str) -> Result<(), LayerError> {
        debug!(resource = locator, "probing");
        let not_found = |status: u16, reason: &str| LayerError::ResourceNotFound {
            resource: locator.to_string(),
            status,
            reason: reason.to_string(),
        };

        match tokio::fs::metadata(locator).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(not_found(404, "Not Found")),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(404, "Not Found")),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(not_found(403, "Forbidden")),
            Err(e) => Err(LayerError::Unreachable {
                resource: locator.to_string(),
                message: e.to_string(),
            }),
        }
    }
}
