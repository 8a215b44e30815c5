use crate::verify::SchemeID;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// the beacon ID drand nodes use for the chain they serve without a path prefix
pub const DEFAULT_BEACON_ID: &str = "default";

/// A chain's self-reported description, as served from `{base_url}/info`.
///
/// Serialized with the field names drand uses on the wire; the snake case names are
/// accepted as aliases.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct ChainInfo {
    #[serde(rename = "schemeID", alias = "scheme_id")]
    pub scheme_id: SchemeID,
    #[serde(with = "hex")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex", rename = "hash", alias = "chain_hash")]
    pub chain_hash: Vec<u8>,
    #[serde(with = "hex", rename = "groupHash", alias = "group_hash")]
    pub group_hash: Vec<u8>,
    pub genesis_time: u64,
    #[serde(rename = "period", alias = "period_seconds")]
    pub period_seconds: u64,
    pub metadata: ChainInfoMetadata,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct ChainInfoMetadata {
    #[serde(rename = "beaconID", alias = "beacon_id")]
    pub beacon_id: String,
}

impl ChainInfo {
    /// Recompute the chain hash from the other fields.
    ///
    /// sha256 over the period (u32, big endian), the genesis time (i64, big endian), the
    /// public key and the group hash, followed by the scheme ID and beacon ID when they
    /// differ from the mainnet defaults.
    pub fn fingerprint(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update((self.period_seconds as u32).to_be_bytes());
        hasher.update((self.genesis_time as i64).to_be_bytes());
        hasher.update(&self.public_key);
        hasher.update(&self.group_hash);
        if self.scheme_id != SchemeID::PedersenBlsChained {
            hasher.update(self.scheme_id.as_str().as_bytes());
        }
        let beacon_id = self.metadata.beacon_id.as_str();
        if !beacon_id.is_empty() && beacon_id != DEFAULT_BEACON_ID {
            hasher.update(beacon_id.as_bytes());
        }
        hasher.finalize().to_vec()
    }

    /// whether the self-reported hash is consistent with the rest of the description
    pub fn has_valid_fingerprint(&self) -> bool {
        self.fingerprint() == self.chain_hash
    }
}

/// The chain a client expects to talk to, pinned by hash and public key (both hex).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerificationParams {
    pub chain_hash: String,
    pub public_key: String,
}

impl ChainVerificationParams {
    pub fn new(chain_hash: impl Into<String>, public_key: impl Into<String>) -> Self {
        ChainVerificationParams {
            chain_hash: chain_hash.into(),
            public_key: public_key.into(),
        }
    }

    /// pin the params to an already trusted description
    pub fn for_chain(info: &ChainInfo) -> Self {
        ChainVerificationParams::new(hex::encode(&info.chain_hash), hex::encode(&info.public_key))
    }

    /// Compare the remote hash and public key against the expected ones.
    ///
    /// The comparison is literal: `None` (absent or null on the remote side) never
    /// matches, and an empty string only matches an empty string.
    pub fn verify(
        &self,
        actual_hash: Option<&str>,
        actual_public_key: Option<&str>,
    ) -> Result<(), ChainVerificationError> {
        if actual_hash == Some(self.chain_hash.as_str())
            && actual_public_key == Some(self.public_key.as_str())
        {
            return Ok(());
        }
        Err(ChainVerificationError {
            expected_hash: self.chain_hash.clone(),
            actual_hash: actual_hash.map(str::to_owned),
            expected_public_key: self.public_key.clone(),
            actual_public_key: actual_public_key.map(str::to_owned),
        })
    }
}

/// verify a remote chain's hash and public key; absent params mean verification is disabled
pub fn verify_chain_keys(
    params: Option<&ChainVerificationParams>,
    actual_hash: Option<&str>,
    actual_public_key: Option<&str>,
) -> Result<(), ChainVerificationError> {
    match params {
        None => Ok(()),
        Some(params) => params.verify(actual_hash, actual_public_key),
    }
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[error(
    "chain info did not match the verification params: expected hash {expected_hash} and public key {expected_public_key}, got hash {} and public key {}",
    .actual_hash.as_deref().unwrap_or("<missing>"),
    .actual_public_key.as_deref().unwrap_or("<missing>")
)]
pub struct ChainVerificationError {
    pub expected_hash: String,
    pub actual_hash: Option<String>,
    pub expected_public_key: String,
    pub actual_public_key: Option<String>,
}

impl ChainVerificationError {
    /// the remote description lacked the hash or the public key entirely
    pub fn is_missing_fields(&self) -> bool {
        self.actual_hash.is_none() || self.actual_public_key.is_none()
    }
}
