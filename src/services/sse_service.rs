//! Fan-out of confirmed room updates to SSE clients.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::{
    dto::sse::{Handshake, RoomChangedEvent, RoomGoneEvent, ServerEvent},
    state::{SharedState, session::{RoomSession, SessionUpdate}},
};

/// Stream a room's confirmed updates as SSE events.
///
/// The client receives a handshake, then the current snapshot, then one
/// `room` event per confirmed change. A `room_gone` event is emitted once if
/// the room disappears, after which the stream ends. Dropping the response
/// tears the forwarder down.
pub fn room_stream(
    state: SharedState,
    session: Arc<RoomSession>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let mut updates = session.updates();
    let room_id = session.room_id();

    tokio::spawn(async move {
        let handshake = Handshake {
            room_id,
            message: "room stream connected".into(),
            degraded: state.is_degraded().await,
        };
        if let Ok(event) = ServerEvent::json(Some("handshake".to_string()), &handshake)
            && !forward(&tx, event).await
        {
            return;
        }

        loop {
            // Emit the value currently held by the channel, then wait for the
            // next change. The first pass therefore delivers the snapshot the
            // client subscribed at.
            let update = updates.borrow_and_update().clone();
            match update {
                SessionUpdate::Room(room) => {
                    if let Ok(event) = ServerEvent::json(
                        Some("room".to_string()),
                        &RoomChangedEvent((*room).into()),
                    ) && !forward(&tx, event).await
                    {
                        break;
                    }
                }
                SessionUpdate::Terminated => {
                    if let Ok(event) = ServerEvent::json(
                        Some("room_gone".to_string()),
                        &RoomGoneEvent { room_id },
                    ) {
                        forward(&tx, event).await;
                    }
                    // The document is gone; do not let later requests reuse
                    // the dead session.
                    state.evict_session(room_id).await;
                    break;
                }
            }

            tokio::select! {
                _ = tx.closed() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(room_id = %room_id, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn forward(tx: &mpsc::Sender<Result<Event, Infallible>>, payload: ServerEvent) -> bool {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    tx.send(Ok(event)).await.is_ok()
}
