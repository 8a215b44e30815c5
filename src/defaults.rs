//! Well-known drand networks.

use crate::chain::HttpCachingChain;
use crate::chain_info::{ChainInfo, ChainInfoMetadata, ChainVerificationParams};
use crate::client::HttpChainClient;
use crate::config::ChainOptions;
use crate::http::{new_http_transport, HttpTransport};
use crate::verify::SchemeID;
use crate::{DrandClientError, Transport};

/// A chain served by the League of Entropy, pinned by its hash and public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkPreset {
    pub base_url: &'static str,
    pub chain_hash: &'static str,
    pub public_key: &'static str,
    pub group_hash: &'static str,
    pub scheme_id: SchemeID,
    pub period_seconds: u64,
    pub genesis_time: u64,
    pub beacon_id: &'static str,
}

/// the original chained mainnet beacon, a round every 30 seconds
pub const MAINNET_DEFAULT: NetworkPreset = NetworkPreset {
    base_url: "https://api.drand.sh",
    chain_hash: "8990e7a9aaed2ffed73dbd7092123d6f289930540d7651336225dc172e51b2ce",
    public_key: "868f005eb8e6e4ca0a47c8a77ceaa5309a47978a7c71bc5cce96366b5d7a569937c529eeda66c7293784a9402801af31",
    group_hash: "176f93498eac9ca337150b46d21dd58673ea4e3581185f869672e59fa4cb390a",
    scheme_id: SchemeID::PedersenBlsChained,
    period_seconds: 30,
    genesis_time: 1595431050,
    beacon_id: "default",
};

/// the unchained mainnet beacon with signatures on G1, a round every 3 seconds
pub const QUICKNET: NetworkPreset = NetworkPreset {
    base_url: "https://api.drand.sh/52db9ba70e0cc0f6eaf7803dd07447a1f5477735fd3f661792ba94600c84e971",
    chain_hash: "52db9ba70e0cc0f6eaf7803dd07447a1f5477735fd3f661792ba94600c84e971",
    public_key: "83cf0f2896adee7eb8b5f01fcad3912212c437e0073e911fb90022d3e760183c8c4b450b6a0a6c3ac6a5776a2d1064510d1fec758c921cc22b0e17e63aaf4bcb5ed66304de9cf809bd274ca73bab4af5a6e9c76a4bc09e76eae8991ef5ece45a",
    group_hash: "f477d5c89f21a17c863a7f937c6a6d15859414d2be09cd448d4279af331c5d3e",
    scheme_id: SchemeID::UnchainedOnG1RFC9380,
    period_seconds: 3,
    genesis_time: 1692803367,
    beacon_id: "quicknet",
};

impl NetworkPreset {
    pub fn verification_params(&self) -> ChainVerificationParams {
        ChainVerificationParams::new(self.chain_hash, self.public_key)
    }

    /// options that only accept this network's chain
    pub fn options(&self) -> ChainOptions {
        ChainOptions::verified(self.verification_params())
    }

    /// the chain info the network is expected to serve
    pub fn chain_info(&self) -> Result<ChainInfo, hex::FromHexError> {
        Ok(ChainInfo {
            scheme_id: self.scheme_id,
            public_key: hex::decode(self.public_key)?,
            chain_hash: hex::decode(self.chain_hash)?,
            group_hash: hex::decode(self.group_hash)?,
            genesis_time: self.genesis_time,
            period_seconds: self.period_seconds,
            metadata: ChainInfoMetadata {
                beacon_id: self.beacon_id.to_string(),
            },
        })
    }

    /// a client for this network's public endpoint over `transport`
    pub fn client<T: Transport>(&self, transport: T) -> HttpChainClient<T> {
        let options = self.options();
        let chain = HttpCachingChain::new(self.base_url, transport, options.clone());
        HttpChainClient::new(chain, options)
    }
}

/// a verified HTTP client for mainnet's default chain
pub fn default_client() -> Result<HttpChainClient<HttpTransport>, DrandClientError> {
    Ok(MAINNET_DEFAULT.client(new_http_transport()?))
}

/// a verified HTTP client for quicknet
pub fn quicknet_client() -> Result<HttpChainClient<HttpTransport>, DrandClientError> {
    Ok(QUICKNET.client(new_http_transport()?))
}
