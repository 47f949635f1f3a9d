// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::response::sse::Event;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::hub::{DistributionHub, Frame, SubscriberId};

/// Receiving end of one hub subscriber. Dropping it closes the subscriber.
pub struct Subscription {
    id: SubscriberId,
    rx: ReceiverStream<Frame>,
    hub: Arc<DistributionHub>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Subscription {
    pub(super) fn new(id: SubscriberId, rx: mpsc::Receiver<Frame>, hub: Arc<DistributionHub>) -> Self {
        Self {
            id,
            rx: ReceiverStream::new(rx),
            hub,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Adapt into a stream of SSE events for an axum `Sse` response.
    pub fn into_sse(self) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
        futures::StreamExt::map(self, |frame| Ok(frame.into_sse()))
    }
}

impl Stream for Subscription {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

impl Frame {
    /// Open and keepalive are SSE comments; events carry name, id and JSON data.
    pub fn into_sse(self) -> Event {
        match self {
            Frame::Open => Event::default().comment("connected"),
            Frame::KeepAlive => Event::default().comment("keepalive"),
            Frame::Event { id, event_type, data } => Event::default()
                .event(&*event_type)
                .id(id.to_string())
                .data(&*data),
        }
    }
}
