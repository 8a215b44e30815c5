//! Test doubles shared by the unit tests.

use crate::chain_info::{ChainInfo, ChainInfoMetadata, DEFAULT_BEACON_ID};
use crate::http::{HttpOptions, HttpResponse};
use crate::verify::{Beacon, SchemeID, SignatureVerifier, VerificationError};
use crate::{Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type Reply = Result<HttpResponse, TransportError>;

/// A scripted transport. Queued replies are handed out in order; once the queue is empty
/// the fallback reply is used, if any.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<State>,
}

#[derive(Default)]
struct State {
    queue: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    delays: Mutex<Vec<(String, Duration)>>,
    calls: Mutex<Vec<(String, HttpOptions)>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        MockTransport::default()
    }

    pub(crate) fn respond(&self, status: u16, body: &str) -> &Self {
        self.state.queue.lock().push_back(Ok(response(status, body)));
        self
    }

    pub(crate) fn respond_json(&self, body: &impl Serialize) -> &Self {
        self.respond(200, &json(body))
    }

    pub(crate) fn respond_always(&self, status: u16, body: &str) -> &Self {
        *self.state.fallback.lock() = Some(Ok(response(status, body)));
        self
    }

    pub(crate) fn respond_json_always(&self, body: &impl Serialize) -> &Self {
        self.respond_always(200, &json(body))
    }

    pub(crate) fn fail(&self) -> &Self {
        self.state.queue.lock().push_back(Err(unreachable("connection refused")));
        self
    }

    pub(crate) fn fail_always(&self) -> &Self {
        *self.state.fallback.lock() = Some(Err(unreachable("connection refused")));
        self
    }

    /// hold every request to a URL starting with `prefix` for `delay`
    pub(crate) fn delay(&self, prefix: &str, delay: Duration) -> &Self {
        self.state.delays.lock().push((prefix.to_string(), delay));
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, HttpOptions)> {
        self.state.calls.lock().clone()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.state
            .calls
            .lock()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.state.calls.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &str, options: &HttpOptions) -> Result<HttpResponse, TransportError> {
        self.state
            .calls
            .lock()
            .push((url.to_string(), options.clone()));

        let delay = self
            .state
            .delays
            .lock()
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.state.queue.lock().pop_front();
        match queued {
            Some(reply) => reply,
            None => self
                .state
                .fallback
                .lock()
                .clone()
                .unwrap_or_else(|| Err(unreachable("no mock response"))),
        }
    }
}

fn response(status: u16, body: &str) -> HttpResponse {
    let status = StatusCode::from_u16(status).expect("valid status code");
    HttpResponse::new(status, body)
}

fn json(body: &impl Serialize) -> String {
    serde_json::to_string(body).expect("serializable test body")
}

fn unreachable(reason: &str) -> TransportError {
    TransportError::Unreachable {
        url: "mock".to_string(),
        reason: reason.to_string(),
    }
}

/// mainnet's keys with the given scheme and genesis; only the scheme and timing matter
/// to the tests using it
pub(crate) fn chain_info(scheme_id: SchemeID, genesis_time: u64) -> ChainInfo {
    ChainInfo {
        scheme_id,
        public_key: hex::decode("868f005eb8e6e4ca0a47c8a77ceaa5309a47978a7c71bc5cce96366b5d7a569937c529eeda66c7293784a9402801af31").unwrap(),
        chain_hash: hex::decode("8990e7a9aaed2ffed73dbd7092123d6f289930540d7651336225dc172e51b2ce").unwrap(),
        group_hash: hex::decode("176f93498eac9ca337150b46d21dd58673ea4e3581185f869672e59fa4cb390a").unwrap(),
        genesis_time,
        period_seconds: 30,
        metadata: ChainInfoMetadata {
            beacon_id: DEFAULT_BEACON_ID.to_string(),
        },
    }
}

/// a chain whose genesis was ten seconds ago, so round 1 is current
pub(crate) fn recent_chain_info(scheme_id: SchemeID) -> ChainInfo {
    chain_info(scheme_id, now_secs() - 10)
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn signature(round: u64) -> Vec<u8> {
    Sha256::digest(format!("sig-{round}").as_bytes()).to_vec()
}

/// A beacon with a fake signature and matching randomness. Chained beacons carry the
/// signature of the round before, so consecutive fixtures link up.
pub(crate) fn beacon(round_number: u64, chained: bool) -> Beacon {
    let signature = signature(round_number);
    Beacon {
        round_number,
        randomness: Sha256::digest(&signature).to_vec(),
        previous_signature: if chained {
            self::signature(round_number - 1)
        } else {
            Vec::new()
        },
        signature,
    }
}

pub(crate) struct AcceptAllSignatures;

impl SignatureVerifier for AcceptAllSignatures {
    fn verify_signature(&self, _: &ChainInfo, _: &Beacon) -> Result<(), VerificationError> {
        Ok(())
    }
}

pub(crate) struct RejectAllSignatures;

impl SignatureVerifier for RejectAllSignatures {
    fn verify_signature(&self, _: &ChainInfo, _: &Beacon) -> Result<(), VerificationError> {
        Err(VerificationError::SignatureFailedVerification)
    }
}
