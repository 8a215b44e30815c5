//! Client configuration.
//!
//! Every value here is constructed once by the caller and handed to the client
//! constructors; nothing in the crate reads process-wide state.

use crate::chain_info::ChainVerificationParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// how often each node is probed by default
pub const DEFAULT_SPEED_TEST_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// how many probe results are averaged by default
pub const DEFAULT_SPEED_TEST_SAMPLES: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainOptions {
    /// accept any well-formed beacon without checking its randomness or signature
    pub disable_beacon_verification: bool,
    /// fetch and verify the chain info on every call instead of memoizing it
    pub no_cache: bool,
    /// the chain the client must be talking to; `None` trusts whatever the node reports
    pub chain_verification_params: Option<ChainVerificationParams>,
}

impl ChainOptions {
    pub fn verified(params: ChainVerificationParams) -> Self {
        ChainOptions {
            chain_verification_params: Some(params),
            ..ChainOptions::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SpeedTestOptions {
    pub interval: Duration,
    pub samples: usize,
}

impl Default for SpeedTestOptions {
    fn default() -> Self {
        SpeedTestOptions {
            interval: DEFAULT_SPEED_TEST_INTERVAL,
            samples: DEFAULT_SPEED_TEST_SAMPLES,
        }
    }
}
