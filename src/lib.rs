//! # drand-feed
//!
//! `drand_feed` is a rust library for following the [drand network](https://drand.love)'s
//! randomness beacons as a single verified feed.
//!
//! A client pins the chain it expects by hash and public key, verifies every beacon it
//! hands out, and can spread its requests over several nodes, always using the one
//! that has been answering fastest. [`watch`] turns any client into an endless stream
//! of beacons, one per round.
//!
//! ```no_run
//! use drand_feed::{defaults, fetch_beacon};
//!
//! # async fn run() -> Result<(), drand_feed::DrandClientError> {
//! let client = defaults::default_client()?;
//! let beacon = fetch_beacon(&client, None).await?;
//! println!("round {}: {}", beacon.round_number, hex::encode(&beacon.randomness));
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod chain_info;
pub mod client;
pub mod config;
pub mod defaults;
pub mod fastest_node;
pub mod http;
pub mod multi_beacon;
pub mod round;
pub mod speedtest;
pub mod verify;
pub mod watch;

#[cfg(test)]
mod mock;

pub use crate::chain::{ChainDescription, HttpCachingChain, HttpChain};
pub use crate::chain_info::{ChainInfo, ChainVerificationError, ChainVerificationParams};
pub use crate::client::{ChainClient, HttpChainClient};
pub use crate::config::{ChainOptions, SpeedTestOptions};
pub use crate::fastest_node::FastestNodeClient;
pub use crate::http::{new_http_transport, HttpOptions, HttpResponse, HttpTransport};
pub use crate::multi_beacon::{HealthStatus, MultiBeaconNode};
pub use crate::round::round_for_time;
pub use crate::verify::{Beacon, SchemeID, VerificationError};
pub use crate::watch::watch;

use async_trait::async_trait;
use std::fmt::Display;
use std::time::SystemTime;
use thiserror::Error;

/// the version of this library
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// represents a transport on which to connect to the drand network. This crate provides an
/// HTTP transport out of the box, which can be created by calling `new_http_transport()`
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`. Any response that came back is `Ok`, whatever its status.
    async fn fetch(&self, url: &str, options: &HttpOptions) -> Result<HttpResponse, TransportError>;
}

/// fetch a beacon for a specific round, or the latest one if `round_number` is `None`
pub async fn fetch_beacon<C: ChainClient + ?Sized>(
    client: &C,
    round_number: Option<u64>,
) -> Result<Beacon, DrandClientError> {
    match round_number {
        Some(round_number) => client.get(round_number).await,
        None => client.latest().await,
    }
}

/// fetch the beacon for the round that was current at `time`
pub async fn fetch_beacon_by_time<C: ChainClient + ?Sized>(
    client: &C,
    time: SystemTime,
) -> Result<Beacon, DrandClientError> {
    let info = client.chain_info().await?;
    client.get(round_for_time(&info, time)).await
}

#[derive(Error, Debug, PartialEq)]
pub enum DrandClientError {
    #[error("invalid round {0}: rounds start at 1")]
    InvalidRound(u64),
    #[error("no base URLs were provided")]
    NoBaseUrls,
    #[error(transparent)]
    ChainVerification(#[from] ChainVerificationError),
    #[error("beacon for round {round} failed verification")]
    FailedVerification {
        round: u64,
        #[source]
        source: VerificationError,
    },
    #[error("requested round {expected} but received round {received}")]
    UnexpectedRound { expected: u64, received: u64 },
    #[error("latest beacon is round {round} but round {expected} should be available")]
    StaleBeacon { round: u64, expected: u64 },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("error response fetching {url}: status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },
}

impl DrandClientError {
    pub(crate) fn malformed(url: &str, e: impl Display) -> Self {
        DrandClientError::MalformedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }

    /// whether the caller passed something no node could ever satisfy
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            DrandClientError::InvalidRound(_) | DrandClientError::NoBaseUrls
        )
    }
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum TransportError {
    #[error("could not reach {url}: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("could not create HTTP client: {0}")]
    Client(String),
}
