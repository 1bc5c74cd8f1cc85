use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::command::{Attachment, AttachmentSource};
use crate::error::ServiceError;

/// Fetches the bytes behind an [`Attachment`].
#[async_trait]
pub trait AttachmentLoader: Send + Sync {
    async fn load(&self, attachment: &Attachment) -> Result<Vec<u8>, ServiceError>;
}

/// Downloads URL attachments over HTTP and reads path attachments from disk.
pub struct HttpAttachmentLoader {
    http: Client,
}

impl HttpAttachmentLoader {
    pub fn new(timeout_secs: u64) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl AttachmentLoader for HttpAttachmentLoader {
    async fn load(&self, attachment: &Attachment) -> Result<Vec<u8>, ServiceError> {
        match &attachment.source {
            AttachmentSource::Bytes(bytes) => Ok(bytes.clone()),
            AttachmentSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| ServiceError::Attachment(format!("{}: {e}", path.display()))),
            AttachmentSource::Url(url) => {
                debug!(%url, "downloading attachment");
                let resp = self.http.get(url.clone()).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(ServiceError::Attachment(format!("{url} returned HTTP {status}")));
                }
                Ok(resp.bytes().await?.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn downloads_url_attachments() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/notes.pdf")
            .with_status(200)
            .with_body("%PDF-1.5 fake")
            .create_async()
            .await;

        let loader = HttpAttachmentLoader::new(5).unwrap();
        let attachment = Attachment::from_location(&format!("{}/notes.pdf", server.url()));
        let bytes = loader.load(&attachment).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.5 fake");
    }

    #[tokio::test]
    async fn missing_download_is_an_attachment_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/gone.pdf").with_status(404).create_async().await;

        let loader = HttpAttachmentLoader::new(5).unwrap();
        let attachment = Attachment::from_location(&format!("{}/gone.pdf", server.url()));
        assert!(matches!(
            loader.load(&attachment).await,
            Err(ServiceError::Attachment(_))
        ));
    }

    #[tokio::test]
    async fn reads_local_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"local bytes").unwrap();
        let attachment = Attachment::from_location(&file.path().to_string_lossy());

        let loader = HttpAttachmentLoader::new(5).unwrap();
        assert_eq!(loader.load(&attachment).await.unwrap(), b"local bytes");
    }
}
