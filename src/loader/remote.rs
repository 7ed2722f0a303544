//! Remote key/value providers
//!
//! Remote configuration is best effort: a provider that cannot be read or
//! parsed is logged and skipped, the remaining providers are still applied.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::format::ConfigFormat;
use crate::config::spec::RemoteProvider;
use crate::store::Store;

/// Request timeout of the HTTP transport
const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while reading one provider
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Unsupported remote provider '{0}'. Valid providers are: consul, etcd")]
    UnsupportedProvider(String),

    #[error("Cannot read key file {path}: {message}")]
    KeyFile { path: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Unexpected response from {url}: {message}")]
    Response { url: String, message: String },

    #[error(transparent)]
    Parse(#[from] crate::config::error::ConfigError),
}

/// Kind of key/value provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Consul,
    Etcd,
}

impl FromStr for ProviderKind {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consul" => Ok(ProviderKind::Consul),
            "etcd" => Ok(ProviderKind::Etcd),
            _ => Err(RemoteError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Transport fetching the raw configuration document of a provider
pub trait RemoteFetcher {
    fn fetch(&self, provider: &RemoteProvider) -> Result<Vec<u8>, RemoteError>;
}

/// Outcome of a remote load pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemoteReport {
    /// Providers merged into the store, `name@url/path`
    pub loaded: Vec<String>,
    /// Providers skipped with the reason
    pub failed: Vec<(String, String)>,
}

impl RemoteReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

fn describe(provider: &RemoteProvider) -> String {
    format!("{}@{}/{}", provider.name, provider.url, provider.path.trim_start_matches('/'))
}

/// Read every provider in order and deep merge its document into the
/// remote layer of `store`
///
/// Later providers win over earlier ones for the same key. Failures never
/// propagate.
pub fn load_remote(
    store: &mut Store,
    providers: &[RemoteProvider],
    format: ConfigFormat,
    fetcher: &dyn RemoteFetcher,
) -> RemoteReport {
    let mut report = RemoteReport::default();

    for provider in providers {
        let id = describe(provider);
        let result = fetcher
            .fetch(provider)
            .and_then(|body| Ok(format.parse_bytes(&body, &id)?));

        match result {
            Ok(map) => {
                store.merge_remote_map(map);
                info!(provider = %id, secure = provider.is_secure(), "Loaded remote configuration");
                report.loaded.push(id);
            }
            Err(e) => {
                warn!(provider = %id, error = %e, "Error reading remote configuration, skipping provider");
                report.failed.push((id, e.to_string()));
            }
        }
    }

    report
}

/// HTTP transport for consul and etcd
///
/// A provider with a key file is read over HTTPS, trusting the PEM
/// certificate found in the key file.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            timeout: REMOTE_TIMEOUT,
        }
    }

    fn client(&self, provider: &RemoteProvider) -> Result<reqwest::blocking::Client, RemoteError> {
        let mut builder = reqwest::blocking::Client::builder().timeout(self.timeout);

        if let Some(key_file) = &provider.key_file {
            let key_error = |message: String| RemoteError::KeyFile {
                path: key_file.display().to_string(),
                message,
            };
            let pem = std::fs::read(key_file).map_err(|e| key_error(e.to_string()))?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| key_error(e.to_string()))?;
            builder = builder.add_root_certificate(certificate).https_only(true);
        }

        builder.build().map_err(|e| RemoteError::Transport {
            url: provider.url.clone(),
            message: e.to_string(),
        })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// etcd v2 key response
#[derive(Debug, Deserialize)]
struct EtcdResponse {
    node: EtcdNode,
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    value: Option<String>,
}

/// Endpoint serving the raw document of `provider`
pub fn endpoint(kind: ProviderKind, provider: &RemoteProvider) -> String {
    let scheme = if provider.is_secure() { "https" } else { "http" };
    let base = if provider.url.contains("://") {
        provider.url.trim_end_matches('/').to_string()
    } else {
        format!("{scheme}://{}", provider.url.trim_end_matches('/'))
    };
    let path = provider.path.trim_start_matches('/');

    match kind {
        ProviderKind::Consul => format!("{base}/v1/kv/{path}?raw"),
        ProviderKind::Etcd => format!("{base}/v2/keys/{path}"),
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, provider: &RemoteProvider) -> Result<Vec<u8>, RemoteError> {
        let kind: ProviderKind = provider.name.parse()?;
        let url = endpoint(kind, provider);
        let transport = |e: reqwest::Error| RemoteError::Transport {
            url: url.clone(),
            message: e.to_string(),
        };

        let response = self
            .client(provider)?
            .get(&url)
            .send()
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        let body = response.bytes().map_err(transport)?;

        match kind {
            ProviderKind::Consul => Ok(body.to_vec()),
            ProviderKind::Etcd => {
                let parsed: EtcdResponse =
                    serde_json::from_slice(&body).map_err(|e| RemoteError::Response {
                        url: url.clone(),
                        message: e.to_string(),
                    })?;
                parsed
                    .node
                    .value
                    .map(String::into_bytes)
                    .ok_or_else(|| RemoteError::Response {
                        url: url.clone(),
                        message: "key has no value".to_string(),
                    })
            }
        }
    }
}
