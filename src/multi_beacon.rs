//! A node serving several chains, each under `{base_url}/{chain_hash}`.

use crate::chain::HttpCachingChain;
use crate::config::ChainOptions;
use crate::http::{fetch_json, HttpOptions};
use crate::{DrandClientError, Transport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub struct MultiBeaconNode<T: Transport + Clone> {
    base_url: String,
    transport: T,
    options: ChainOptions,
    http_options: HttpOptions,
}

/// A node's view of its own progress. `current` and `expected` are -1 when the node
/// didn't answer with a 2xx; `status` is 0 when it didn't answer at all.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: u16,
    pub current: i64,
    pub expected: i64,
}

#[derive(Deserialize)]
struct HealthBody {
    current: i64,
    expected: i64,
}

impl<T: Transport + Clone> MultiBeaconNode<T> {
    pub fn new(base_url: impl Into<String>, transport: T, options: ChainOptions) -> Self {
        MultiBeaconNode {
            base_url: base_url.into().trim_end_matches('/').to_string(),
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

    /// one caching chain per chain hash the node lists, sharing this node's options
    pub async fn chains(&self) -> Result<Vec<HttpCachingChain<T>>, DrandClientError> {
        let url = format!("{}/chains", self.base_url);
        let body: Value = fetch_json(&self.transport, &url, &self.http_options).await?;
        let hashes = body
            .as_array()
            .ok_or_else(|| DrandClientError::malformed(&url, "expected an array of chain hashes"))?;

        let mut chains = Vec::with_capacity(hashes.len());
        for hash in hashes {
            let hash = hash
                .as_str()
                .ok_or_else(|| DrandClientError::malformed(&url, "expected an array of chain hashes"))?;
            let chain = HttpCachingChain::new(
                format!("{}/{}", self.base_url, hash),
                self.transport.clone(),
                self.options.clone(),
            );
            chains.push(chain.with_http_options(self.http_options.clone()));
        }
        Ok(chains)
    }

    /// Ask the node how far along it is. Never fails; problems are folded into the status.
    pub async fn health(&self) -> HealthStatus {
        let url = format!("{}/health", self.base_url);
        let res = match self.transport.fetch(&url, &self.http_options).await {
            Ok(res) => res,
            Err(e) => {
                warn!(error = %e, "health check failed");
                return HealthStatus {
                    status: 0,
                    current: -1,
                    expected: -1,
                };
            }
        };

        let status = res.status.as_u16();
        if !res.status.is_success() {
            return HealthStatus {
                status,
                current: -1,
                expected: -1,
            };
        }
        match serde_json::from_str::<HealthBody>(&res.body) {
            Ok(body) => HealthStatus {
                status,
                current: body.current,
                expected: body.expected,
            },
            Err(e) => {
                warn!(error = %e, url = %url, "unreadable health response");
                HealthStatus {
                    status,
                    current: -1,
                    expected: -1,
                }
            }
        }
    }
}
