//! HTTP plumbing shared by the REST connectors.

use anyhow::{anyhow, Context, Result};
use reqwest::{Certificate, Client, Response};
use std::path::Path;

pub const USER_AGENT: &str = concat!("tasksync/", env!("CARGO_PKG_VERSION"));

/// TLS options for a service's HTTP client.
#[derive(Clone, Debug, Default)]
pub struct TlsOptions<'a> {
    /// PEM root certificate to trust instead of the built-in roots.
    pub ca_path: Option<&'a Path>,
    /// Skip certificate verification entirely.
    pub accept_invalid_certs: bool,
}

impl TlsOptions<'_> {
    /// A configured CA bundle replaces the platform roots.
    pub fn trusts_built_in_roots(&self) -> bool {
        self.ca_path.is_none()
    }
}

/// Builds a client with the shared User-Agent and the given TLS options.
pub fn build_client(tls: TlsOptions<'_>) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .tls_built_in_root_certs(tls.trusts_built_in_roots());
    if let Some(path) = tls.ca_path {
        let pem = std::fs::read(path)
            .with_context(|| format!("Failed to read CA certificate {}", path.display()))?;
        let cert = Certificate::from_pem(&pem)
            .with_context(|| format!("Invalid PEM certificate {}", path.display()))?;
        builder = builder.add_root_certificate(cert);
    }
    if tls.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build().context("Failed to build HTTP client")
}

/// Passes 2xx responses through; anything else becomes an error naming the
/// service, status, URL and the start of the body.
pub async fn ensure_success(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());
    let snippet: String = body.chars().take(200).collect();
    Err(anyhow!(
        "{} API error: {} for {}: {}",
        service,
        status,
        url,
        snippet.trim()
    ))
}
