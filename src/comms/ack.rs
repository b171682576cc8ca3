//! Response body that gates deferred work on the acknowledgment.
//!
//! The platform rejects a follow-up for an interaction it has not seen
//! acknowledged, so background work must not start before the response body
//! has been handed to the connection. [`gate`] wraps a response and returns an
//! [`Acknowledged`] handle that resolves once the body reaches end of stream
//! or is dropped, whichever comes first.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::response::Response;
use http_body::{Body as HttpBody, Frame, SizeHint};
use tokio::sync::oneshot;

struct AckBody {
    inner: Body,
    release: Option<oneshot::Sender<()>>,
}

impl AckBody {
    fn release(&mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
    }
}

impl HttpBody for AckBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => this.release(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.release(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Resolves once the gated response has been written or abandoned.
#[derive(Debug)]
pub struct Acknowledged(oneshot::Receiver<()>);

impl Acknowledged {
    pub async fn wait(self) {
        // A dropped sender means the body went away; either way the
        // acknowledgment is no longer pending.
        let _ = self.0.await;
    }
}

pub fn gate(response: Response) -> (Response, Acknowledged) {
    let (tx, rx) = oneshot::channel();
    let response = response.map(|inner| {
        Body::new(AckBody {
            inner,
            release: Some(tx),
        })
    });
    (response, Acknowledged(rx))
}
