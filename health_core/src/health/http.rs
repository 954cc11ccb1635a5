//! HTTP dependency probe: GET the dependency's health URL, 200 means alive

use super::context::ProbeContext;
use super::probe::{error_chain, DependencyProbe, ProbeError};
use crate::error::{AppError, Result};
use reqwest::{Client, StatusCode, Url};

pub struct HttpProbe {
    url: Url,
    client: Client,
}

impl HttpProbe {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Self::with_client(url, client)
    }

    /// Shares an existing client (and its connection pool) with this probe.
    pub fn with_client(url: &str, client: Client) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| AppError::Configuration(format!("invalid health URL '{}': {}", url, e)))?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl DependencyProbe for HttpProbe {
    async fn check(&self, ctx: &ProbeContext) -> std::result::Result<(), ProbeError> {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let mut request = self.client.get(self.url.clone());
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }

        let response = tokio::select! {
            sent = request.send() => sent.map_err(|e| ProbeError::Transport(error_chain(&e)))?,
            reason = ctx.done() => return Err(reason.into()),
        };

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(ProbeError::UnexpectedStatus(status.as_u16())),
        }
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}
