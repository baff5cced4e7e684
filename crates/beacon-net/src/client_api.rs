use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::Stream;
use tokio_util::sync::CancellationToken;

use beacon_group::Group;
use beacon_store::ChainStore;

use crate::messages::{BeaconView, ChainInfoView};

/// Shared state behind the client-facing HTTP surface (§6 family 2).
/// Mirrors `node/rpc-api`'s `RPCState<DB, B>` pattern: a small struct of
/// `Arc`-shared handles, built once and cloned cheaply into every
/// handler via axum's `State` extractor.
#[derive(Clone)]
pub struct RpcState {
    pub store: Arc<dyn ChainStore>,
    pub group: Arc<Group>,
}

pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/public/latest", get(public_rand_latest))
        .route("/public/{round}", get(public_rand))
        .route("/public/stream/{from_round}", get(public_rand_stream))
        .route("/info", get(chain_info))
        .with_state(state)
}

async fn beacon_to_view(
    store: &Arc<dyn ChainStore>,
    round: u64,
) -> Result<Json<BeaconView>, axum::http::StatusCode> {
    let token = CancellationToken::new();
    let beacon = if round == 0 {
        store.last(&token)
    } else {
        store.get(round, &token)
    };
    match beacon {
        Ok(b) => Ok(Json(BeaconView::from(&b))),
        Err(beacon_store::Error::NotFound) => Err(axum::http::StatusCode::NOT_FOUND),
        Err(_) => Err(axum::http::StatusCode::SERVICE_UNAVAILABLE),
    }
}

async fn public_rand_latest(State(state): State<RpcState>) -> impl IntoResponse {
    beacon_to_view(&state.store, 0).await
}

async fn public_rand(State(state): State<RpcState>, Path(round): Path<u64>) -> impl IntoResponse {
    beacon_to_view(&state.store, round).await
}

async fn chain_info(State(state): State<RpcState>) -> Json<ChainInfoView> {
    let group = &state.group;
    Json(ChainInfoView {
        public_key: hex::encode(group.public_poly.public_key().to_compressed()),
        period: group.period_secs,
        genesis_time: group.genesis_time,
        hash: hex::encode(group.hash()),
        group_hash: hex::encode(group.hash()),
        scheme_id: format!("{:?}", group.scheme),
    })
}

/// Streams beacons from `from_round` onward as Server-Sent Events,
/// polling the store at roughly the group's period. A real deployment
/// would wake on the engine's own "beacon produced" callback instead of
/// polling; that wiring lives in the (excluded) node supervisor.
async fn public_rand_stream(
    State(state): State<RpcState>,
    Path(from_round): Path<u64>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let store = state.store;
    let period = Duration::from_secs(state.group.period_secs.max(1));
    let stream = async_stream::stream! {
        let mut next_round = from_round.max(1);
        loop {
            let token = CancellationToken::new();
            match store.get(next_round, &token) {
                Ok(beacon) => {
                    let view = BeaconView::from(&beacon);
                    if let Ok(json) = serde_json::to_string(&view) {
                        yield Ok(Event::default().data(json));
                    }
                    next_round += 1;
                }
                Err(_) => tokio::time::sleep(period).await,
            }
        }
    };
    Sse::new(stream)
}
