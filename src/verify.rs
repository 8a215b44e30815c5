//! # verify
//!
//! this module contains the beacon verification logic. The cryptographic primitive is
//! reachable through the [`SignatureVerifier`] trait so callers can swap it out; the
//! BLS internals are also exported for users who wish to verify beacons manually
//! without the client.
//!

use crate::chain_info::ChainInfo;
use energon::drand::{BeaconDigest, DefaultScheme, Scheme, SchortSigScheme, UnchainedScheme};
use energon::traits::{Affine, Group};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Beacon {
    #[serde(rename = "round", alias = "round_number")]
    pub round_number: u64,
    #[serde(with = "hex")]
    pub randomness: Vec<u8>,
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
    #[serde(default, with = "hex", skip_serializing_if = "Vec::is_empty")]
    pub previous_signature: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SchemeID {
    PedersenBlsChained,
    PedersenBlsUnchained,
    UnchainedOnG1RFC9380,
}

impl SchemeID {
    pub const ALL: [&'static str; 3] = [
        "pedersen-bls-chained",
        "pedersen-bls-unchained",
        "bls-unchained-g1-rfc9380",
    ];

    /// the identifier used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeID::PedersenBlsChained => Self::ALL[0],
            SchemeID::PedersenBlsUnchained => Self::ALL[1],
            SchemeID::UnchainedOnG1RFC9380 => Self::ALL[2],
        }
    }

    /// chained schemes sign over the previous round's signature as well as the round
    pub fn is_chained(&self) -> bool {
        matches!(self, SchemeID::PedersenBlsChained)
    }
}

impl<'de> Deserialize<'de> for SchemeID {
    fn deserialize<D>(deserializer: D) -> Result<SchemeID, D::Error>
    where
        D: Deserializer<'de>,
    {
        // owned, so chain info can also be read out of a `serde_json::Value`
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "pedersen-bls-chained" => Ok(SchemeID::PedersenBlsChained),
            "pedersen-bls-unchained" => Ok(SchemeID::PedersenBlsUnchained),
            "bls-unchained-g1-rfc9380" => Ok(SchemeID::UnchainedOnG1RFC9380),
            other => Err(serde::de::Error::unknown_variant(other, &SchemeID::ALL)),
        }
    }
}

impl Serialize for SchemeID {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum VerificationError {
    #[error("chained beacons must have a `previous_signature`")]
    ChainedBeaconNeedsPreviousSignature,
    #[error("invalid signature length")]
    InvalidSignatureLength,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("message can't be empty")]
    EmptyMessage,
    #[error("signature verification failed")]
    SignatureFailedVerification,
    #[error("the randomness for the beacon did not match the signature")]
    InvalidRandomness,
    #[error("round {round} does not follow the previous round {previous}")]
    RoundNotConsecutive { previous: u64, round: u64 },
    #[error("the `previous_signature` of round {round} does not match the signature of the previous beacon")]
    PreviousSignatureMismatch { round: u64 },
}

/// The cryptographic capability used by the client to check beacons.
///
/// [`BlsVerifier`] is the production implementation; tests and alternative backends
/// can provide their own.
pub trait SignatureVerifier: Send + Sync {
    /// check the beacon's signature against the chain's scheme and public key
    fn verify_signature(&self, info: &ChainInfo, beacon: &Beacon) -> Result<(), VerificationError>;

    /// the randomness a valid beacon with this signature must carry
    fn randomness(&self, signature: &[u8]) -> Vec<u8> {
        Sha256::digest(signature).to_vec()
    }
}

/// BLS12-381 verification backed by `energon`
#[derive(Debug, Clone, Copy, Default)]
pub struct BlsVerifier;

impl SignatureVerifier for BlsVerifier {
    fn verify_signature(&self, info: &ChainInfo, beacon: &Beacon) -> Result<(), VerificationError> {
        verify_scheme(&info.scheme_id, &info.public_key, beacon)
    }
}

/// verify a beacon for a chain using the given verifier.
///
/// The randomness must be the digest of the signature, chained beacons must carry a
/// `previous_signature` and, when the caller knows the `previous` beacon, must link to
/// it. The signature check itself is delegated to `verifier`.
pub fn verify_beacon_with(
    verifier: &dyn SignatureVerifier,
    info: &ChainInfo,
    beacon: &Beacon,
    previous: Option<&Beacon>,
) -> Result<(), VerificationError> {
    if verifier.randomness(&beacon.signature) != beacon.randomness {
        return Err(VerificationError::InvalidRandomness);
    }
    if beacon.signature.is_empty() {
        return Err(VerificationError::InvalidSignatureLength);
    }
    if info.scheme_id.is_chained() {
        if beacon.previous_signature.is_empty() {
            return Err(VerificationError::ChainedBeaconNeedsPreviousSignature);
        }
        if let Some(previous) = previous {
            verify_chain_link(previous, beacon)?;
        }
    }
    verifier.verify_signature(info, beacon)
}

/// check that `beacon` is the direct successor of `previous` on a chained scheme
pub fn verify_chain_link(previous: &Beacon, beacon: &Beacon) -> Result<(), VerificationError> {
    if previous.round_number.checked_add(1) != Some(beacon.round_number) {
        return Err(VerificationError::RoundNotConsecutive {
            previous: previous.round_number,
            round: beacon.round_number,
        });
    }
    if beacon.previous_signature != previous.signature {
        return Err(VerificationError::PreviousSignatureMismatch {
            round: beacon.round_number,
        });
    }
    Ok(())
}

/// verify a randomness beacon for a given scheme and public key
pub fn verify_beacon(
    scheme_id: &SchemeID,
    public_key: &[u8],
    beacon: &Beacon,
) -> Result<(), VerificationError> {
    if Sha256::digest(&beacon.signature).to_vec() != beacon.randomness {
        return Err(VerificationError::InvalidRandomness);
    }
    verify_scheme(scheme_id, public_key, beacon)
}

fn verify_scheme(
    scheme_id: &SchemeID,
    public_key: &[u8],
    beacon: &Beacon,
) -> Result<(), VerificationError> {
    match scheme_id {
        SchemeID::PedersenBlsChained => verify::<DefaultScheme>(public_key, beacon),
        SchemeID::PedersenBlsUnchained => verify::<UnchainedScheme>(public_key, beacon),
        SchemeID::UnchainedOnG1RFC9380 => verify::<SchortSigScheme>(public_key, beacon),
    }
}

pub fn verify<S: Scheme>(public_key: &[u8], beacon: &Beacon) -> Result<(), VerificationError> {
    if beacon.signature.is_empty() {
        return Err(VerificationError::InvalidSignatureLength);
    }

    if S::Beacon::is_chained() && beacon.previous_signature.is_empty() {
        return Err(VerificationError::ChainedBeaconNeedsPreviousSignature);
    }

    let signature_point = Affine::deserialize(&beacon.signature)
        .map_err(|_| VerificationError::SignatureFailedVerification)?;
    let pubkey_point = <S::Key as Group>::Affine::deserialize(public_key)
        .map_err(|_| VerificationError::InvalidPublicKey)?;

    if !pubkey_point.is_on_curve() || pubkey_point.is_identity() {
        return Err(VerificationError::InvalidPublicKey);
    }

    let message = S::Beacon::digest(&beacon.previous_signature, beacon.round_number);

    if S::bls_verify(&pubkey_point, &signature_point, &message).is_err() {
        return Err(VerificationError::SignatureFailedVerification);
    }

    Ok(())
}
