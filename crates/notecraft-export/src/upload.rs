//! Server persistence of the finished PDF, with one token refresh on 401

use crate::constants::UPLOAD_PATH;
use crate::types::{ExportError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Supplies the current bearer token, read fresh before every attempt
pub trait CredentialSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Renews the access token. `true` means a new token is now available.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> bool;
}

/// The finished document as sent to the server
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One HTTP attempt; returns the response status
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(&self, request: &UploadRequest, token: Option<&str>) -> Result<u16>;
}

/// `POST {server}/add_pdf/` as multipart, the part named after the file
#[derive(Debug, Clone)]
pub struct HttpUploadTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploadTransport {
    pub fn new(client: reqwest::Client, server_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", server_url.trim_end_matches('/'), UPLOAD_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn send(&self, request: &UploadRequest, token: Option<&str>) -> Result<u16> {
        let part = reqwest::multipart::Part::bytes(request.bytes.clone())
            .file_name(request.filename.clone())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part(request.filename.clone(), part);

        let mut builder = self.client.post(&self.endpoint).multipart(form);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;
        Ok(response.status().as_u16())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadAttempt {
    FirstAttempt,
    RetriedAfterRefresh,
}

/// Drives the upload state machine
#[derive(Clone)]
pub struct Uploader {
    transport: Arc<dyn UploadTransport>,
    credentials: Arc<dyn CredentialSource>,
}

impl Uploader {
    pub fn new(transport: Arc<dyn UploadTransport>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    /// Upload `request`. A 401 on the first attempt triggers exactly one
    /// `refresh`; a successful refresh is followed by exactly one retry.
    pub async fn upload(&self, request: &UploadRequest, refresher: &dyn TokenRefresher) -> Result<()> {
        let mut attempt = UploadAttempt::FirstAttempt;
        loop {
            let token = self.credentials.access_token();
            let status = self.transport.send(request, token.as_deref()).await?;

            match (status, attempt) {
                (201, _) => {
                    log::info!("PDF uploaded successfully: {}", request.filename);
                    return Ok(());
                }
                (401, UploadAttempt::FirstAttempt) => {
                    log::debug!("Upload unauthorized, refreshing token");
                    if !refresher.refresh().await {
                        return Err(ExportError::SessionExpired);
                    }
                    attempt = UploadAttempt::RetriedAfterRefresh;
                }
                (status, _) => return Err(ExportError::UploadStatus(status)),
            }
        }
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_server_and_path() {
        let transport = HttpUploadTransport::new(reqwest::Client::new(), "http://localhost:8000/");
        assert_eq!(transport.endpoint(), "http://localhost:8000/add_pdf/");
    }
}
