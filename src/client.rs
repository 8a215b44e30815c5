use crate::chain::HttpCachingChain;
use crate::chain_info::ChainInfo;
use crate::config::ChainOptions;
use crate::http::fetch_json;
use crate::round::round_for_time;
use crate::verify::{verify_beacon_with, Beacon, BlsVerifier, SignatureVerifier};
use crate::{DrandClientError, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;

/// Anything that can hand out verified beacons for a single chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn options(&self) -> &ChainOptions;

    /// the node requests currently go to
    fn base_url(&self) -> &str;

    /// the verified description of the chain the client serves
    async fn chain_info(&self) -> Result<Arc<ChainInfo>, DrandClientError>;

    /// fetch the latest available randomness beacon
    async fn latest(&self) -> Result<Beacon, DrandClientError>;

    /// fetch a randomness beacon for a specific round
    async fn get(&self, round_number: u64) -> Result<Beacon, DrandClientError>;
}

/// a client encapsulating all the necessary state for retrieving and validating beacons from one node
pub struct HttpChainClient<T: Transport> {
    chain: HttpCachingChain<T>,
    options: ChainOptions,
    verifier: Arc<dyn SignatureVerifier>,
}

impl<T: Transport> HttpChainClient<T> {
    pub fn new(chain: HttpCachingChain<T>, options: ChainOptions) -> Self {
        HttpChainClient {
            chain,
            options,
            verifier: Arc::new(BlsVerifier),
        }
    }

    /// replace the BLS verifier, e.g. with another backend
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn chain(&self) -> &HttpCachingChain<T> {
        &self.chain
    }

    /// fetch the beacon for the round that was current at `time`
    pub async fn get_by_time(&self, time: SystemTime) -> Result<Beacon, DrandClientError> {
        let info = self.chain.chain_info().await?;
        self.get(round_for_time(&info, time)).await
    }

    async fn fetch_beacon_tag(
        &self,
        info: &ChainInfo,
        tag: &str,
    ) -> Result<Beacon, DrandClientError> {
        let url = format!("{}/public/{}", self.chain.base_url(), tag);
        let beacon: Beacon =
            fetch_json(self.chain.transport(), &url, self.chain.http_options()).await?;

        if !self.options.disable_beacon_verification {
            verify_beacon_with(self.verifier.as_ref(), info, &beacon, None).map_err(|source| {
                DrandClientError::FailedVerification {
                    round: beacon.round_number,
                    source,
                }
            })?;
        }
        Ok(beacon)
    }
}

#[async_trait]
impl<T: Transport> ChainClient for HttpChainClient<T> {
    fn options(&self) -> &ChainOptions {
        &self.options
    }

    fn base_url(&self) -> &str {
        self.chain.base_url()
    }

    async fn chain_info(&self) -> Result<Arc<ChainInfo>, DrandClientError> {
        self.chain.chain_info().await
    }

    async fn latest(&self) -> Result<Beacon, DrandClientError> {
        let info = self.chain.chain_info().await?;
        let beacon = self.fetch_beacon_tag(&info, "latest").await?;

        if !self.options.disable_beacon_verification {
            // it could take some time to aggregate beacons, so we tolerate one round early for latest
            let expected = round_for_time(&info, SystemTime::now());
            if beacon.round_number.saturating_add(1) < expected {
                return Err(DrandClientError::StaleBeacon {
                    round: beacon.round_number,
                    expected,
                });
            }
        }
        Ok(beacon)
    }

    async fn get(&self, round_number: u64) -> Result<Beacon, DrandClientError> {
        if round_number == 0 {
            return Err(DrandClientError::InvalidRound(round_number));
        }
        let info = self.chain.chain_info().await?;
        let beacon = self
            .fetch_beacon_tag(&info, &round_number.to_string())
            .await?;

        if !self.options.disable_beacon_verification && beacon.round_number != round_number {
            return Err(DrandClientError::UnexpectedRound {
                expected: round_number,
                received: beacon.round_number,
            });
        }
        Ok(beacon)
    }
}
