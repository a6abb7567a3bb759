//! Live subscriptions over Server-Sent Events.
//!
//! A subscriber receives the full ordered record set once on connect and again
//! after every change to the collection it follows.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{future, Stream, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::errors::AppError;
use crate::events::Collection;
use crate::AppState;

/// SSE event name carrying a full snapshot.
pub const SNAPSHOT_EVENT: &str = "snapshot";
/// SSE event name carrying a read failure.
pub const ERROR_EVENT: &str = "error";

/// GET /api/posts/stream - Follow the post feed.
pub async fn stream_posts(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    subscribe(state, Collection::Posts)
}

/// GET /api/squads/stream - Follow the squad list.
pub async fn stream_squads(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    subscribe(state, Collection::Squads)
}

fn subscribe(
    state: AppState,
    collection: Collection,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before the first read so no change falls between the two.
    let changes = BroadcastStream::new(state.events.subscribe()).filter_map(move |res| {
        future::ready(match res {
            Ok(event) if event.collection == collection => Some(()),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!("Subscriber lagged by {} events", skipped);
                Some(())
            }
        })
    });

    let snapshots = futures::stream::once(future::ready(()))
        .chain(changes)
        .then(move |()| {
            let state = state.clone();
            async move { Ok(snapshot_event(&state, collection).await) }
        });

    Sse::new(snapshots).keep_alive(KeepAlive::default())
}

async fn snapshot_event(state: &AppState, collection: Collection) -> Event {
    match read_snapshot(state, collection).await {
        Ok(json) => Event::default().event(SNAPSHOT_EVENT).data(json),
        Err(e) => {
            tracing::warn!("Failed to read {:?} snapshot: {}", collection, e);
            Event::default().event(ERROR_EVENT).data(e.message())
        }
    }
}

async fn read_snapshot(state: &AppState, collection: Collection) -> Result<String, AppError> {
    let json = match collection {
        Collection::Posts => serde_json::to_string(&state.repo.list_posts().await?)?,
        Collection::Squads => serde_json::to_string(&state.repo.list_squads().await?)?,
    };
    Ok(json)
}
