//! Fetching a chain's description and establishing trust in it.

use crate::chain_info::{verify_chain_keys, ChainInfo};
use crate::config::ChainOptions;
use crate::http::{fetch_json, HttpOptions};
use crate::{DrandClientError, Transport};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// What a node reported at `{base_url}/info`.
///
/// A description checked against verification params is always parsed. Without params
/// any JSON body is accepted, and structural validation is left to whoever reads the
/// fields through [`ChainDescription::chain_info`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChainDescription {
    Info(Arc<ChainInfo>),
    /// an unverified body that isn't chain info
    Unparsed {
        url: String,
        body: Value,
        reason: String,
    },
}

impl ChainDescription {
    /// the typed chain info; `MalformedResponse` if the node sent something else
    pub fn chain_info(&self) -> Result<Arc<ChainInfo>, DrandClientError> {
        match self {
            ChainDescription::Info(info) => Ok(Arc::clone(info)),
            ChainDescription::Unparsed { url, reason, .. } => {
                Err(DrandClientError::MalformedResponse {
                    url: url.clone(),
                    reason: reason.clone(),
                })
            }
        }
    }

    pub fn as_info(&self) -> Option<&ChainInfo> {
        match self {
            ChainDescription::Info(info) => Some(info),
            ChainDescription::Unparsed { .. } => None,
        }
    }

    /// the body as the node sent it, if it wasn't chain info
    pub fn raw(&self) -> Option<&Value> {
        match self {
            ChainDescription::Info(_) => None,
            ChainDescription::Unparsed { body, .. } => Some(body),
        }
    }
}

/// A chain served at `base_url`. Every call to [`HttpChain::info`] fetches and verifies
/// the description again.
pub struct HttpChain<T: Transport> {
    base_url: String,
    transport: T,
    options: ChainOptions,
    http_options: HttpOptions,
}

impl<T: Transport> HttpChain<T> {
    pub fn new(base_url: impl Into<String>, transport: T, options: ChainOptions) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpChain {
            base_url,
            transport,
            options,
            http_options: HttpOptions::default(),
        }
    }

    pub fn with_http_options(mut self, http_options: HttpOptions) -> Self {
        self.http_options = http_options;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    pub fn http_options(&self) -> &HttpOptions {
        &self.http_options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// fetch `{base_url}/info` and check it against the configured verification params
    pub async fn info(&self) -> Result<ChainDescription, DrandClientError> {
        let url = format!("{}/info", self.base_url);
        let body: Value = fetch_json(&self.transport, &url, &self.http_options).await?;

        // checked on the raw body so absent and null fields are told apart from wrong ones
        verify_chain_keys(
            self.options.chain_verification_params.as_ref(),
            body.get("hash").and_then(Value::as_str),
            body.get("public_key").and_then(Value::as_str),
        )?;

        match ChainInfo::deserialize(&body) {
            Ok(info) => Ok(ChainDescription::Info(Arc::new(info))),
            Err(e) if self.options.chain_verification_params.is_none() => {
                debug!(url = %url, error = %e, "unverified chain info kept unparsed");
                Ok(ChainDescription::Unparsed {
                    url,
                    body,
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(DrandClientError::malformed(&url, e)),
        }
    }
}

/// A chain whose description is fetched and verified once, then served from memory.
///
/// A rejected description is never stored, so the next call fetches again. Concurrent
/// first calls each fetch on their own; they can only ever store identical verified
/// values.
pub struct HttpCachingChain<T: Transport> {
    chain: HttpChain<T>,
    cached: RwLock<Option<ChainDescription>>,
}

impl<T: Transport> HttpCachingChain<T> {
    pub fn new(base_url: impl Into<String>, transport: T, options: ChainOptions) -> Self {
        HttpCachingChain::from_chain(HttpChain::new(base_url, transport, options))
    }

    pub fn from_chain(chain: HttpChain<T>) -> Self {
        HttpCachingChain {
            chain,
            cached: RwLock::new(None),
        }
    }

    pub fn with_http_options(self, http_options: HttpOptions) -> Self {
        HttpCachingChain::from_chain(self.chain.with_http_options(http_options))
    }

    pub fn base_url(&self) -> &str {
        self.chain.base_url()
    }

    pub fn options(&self) -> &ChainOptions {
        self.chain.options()
    }

    pub fn http_options(&self) -> &HttpOptions {
        self.chain.http_options()
    }

    pub fn transport(&self) -> &T {
        self.chain.transport()
    }

    pub async fn info(&self) -> Result<ChainDescription, DrandClientError> {
        let no_cache = self.chain.options().no_cache;
        if !no_cache {
            let cached = self.cached.read().clone();
            if let Some(description) = cached {
                debug!(base_url = self.base_url(), "using cached chain info");
                return Ok(description);
            }
        }

        let description = self.chain.info().await?;
        if !no_cache {
            *self.cached.write() = Some(description.clone());
        }
        Ok(description)
    }

    /// the typed chain info, for callers that need its fields
    pub async fn chain_info(&self) -> Result<Arc<ChainInfo>, DrandClientError> {
        self.info().await?.chain_info()
    }
}
