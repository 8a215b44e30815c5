//! Following a chain as it grows.

use crate::chain_info::ChainInfo;
use crate::client::ChainClient;
use crate::round::{round_for_time, time_for_round};
use crate::verify::{verify_chain_link, Beacon};
use crate::DrandClientError;
use futures::stream::{self, Stream};
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

enum State {
    Init,
    Polling(Cursor),
    Done,
}

struct Cursor {
    info: Arc<ChainInfo>,
    round: u64,
    previous: Option<Beacon>,
}

type Step = Option<(Result<Beacon, DrandClientError>, State)>;

/// An endless stream of beacons, one per round, each yielded as soon as its round is
/// published.
///
/// The stream starts at the round current when it is first polled. A failed fetch is
/// yielded as an error and the same round is tried again on the next poll; only a
/// failure to fetch the chain info ends the stream. Cancelling the token ends the
/// stream without an error, also while it is waiting for the next round; a request
/// already in flight is allowed to finish first.
pub fn watch<'a, C>(
    client: &'a C,
    cancellation: CancellationToken,
) -> impl Stream<Item = Result<Beacon, DrandClientError>> + Send + 'a
where
    C: ChainClient + ?Sized + 'a,
{
    stream::unfold(State::Init, move |state| {
        let cancellation = cancellation.clone();
        async move { step(client, &cancellation, state).await }
    })
}

async fn step<C: ChainClient + ?Sized>(
    client: &C,
    cancellation: &CancellationToken,
    state: State,
) -> Step {
    let cursor = match state {
        State::Done => return None,
        State::Polling(cursor) => cursor,
        State::Init => {
            if cancellation.is_cancelled() {
                return None;
            }
            match client.chain_info().await {
                Ok(info) => {
                    let round = round_for_time(&info, SystemTime::now());
                    debug!(round, "starting to watch");
                    Cursor {
                        info,
                        round,
                        previous: None,
                    }
                }
                Err(e) => return Some((Err(e), State::Done)),
            }
        }
    };

    if cancellation.is_cancelled() {
        return None;
    }
    let Some(deadline) = time_for_round(&cursor.info, cursor.round) else {
        let url = format!("{}/info", client.base_url());
        let reason = format!("round {} falls outside the representable time range", cursor.round);
        return Some((Err(DrandClientError::malformed(&url, reason)), State::Done));
    };
    // a deadline in the past means the round is already out
    if let Ok(wait) = deadline.duration_since(SystemTime::now()) {
        debug!(round = cursor.round, ?wait, "waiting for the next round");
        until_cancelled(cancellation, sleep(wait)).await?;
    }

    match next_beacon(client, &cursor).await {
        Ok(beacon) => {
            let next = Cursor {
                info: cursor.info,
                round: cursor.round + 1,
                previous: Some(beacon.clone()),
            };
            Some((Ok(beacon), State::Polling(next)))
        }
        Err(e) => {
            warn!(round = cursor.round, error = %e, "failed to fetch beacon, will retry");
            Some((Err(e), State::Polling(cursor)))
        }
    }
}

async fn next_beacon<C: ChainClient + ?Sized>(
    client: &C,
    cursor: &Cursor,
) -> Result<Beacon, DrandClientError> {
    let beacon = client.get(cursor.round).await?;

    let verify_link =
        cursor.info.scheme_id.is_chained() && !client.options().disable_beacon_verification;
    if let (true, Some(previous)) = (verify_link, &cursor.previous) {
        verify_chain_link(previous, &beacon).map_err(|source| {
            DrandClientError::FailedVerification {
                round: beacon.round_number,
                source,
            }
        })?;
    }
    Ok(beacon)
}

/// `None` if the token was cancelled before `fut` completed
async fn until_cancelled<F: Future>(cancellation: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => None,
        output = fut => Some(output),
    }
}
