//! Upstream response body bounded by the forward deadline.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use hyper::body::{Body, Bytes, Frame, Incoming, SizeHint};
use tokio::time::{self, Instant, Sleep};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[error("upstream body not complete within the forward timeout")]
pub struct BodyDeadlineElapsed;

/// Streams an upstream body and fails it once `deadline` passes.
///
/// Frames already available are still yielded; the deadline is checked only
/// while waiting for the next frame.
pub struct DeadlineBody {
    inner: Pin<Box<Incoming>>,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
}

impl DeadlineBody {
    pub fn new(inner: Incoming, deadline: Instant) -> Self {
        Self {
            inner: Box::pin(inner),
            deadline: Box::pin(time::sleep_until(deadline)),
            expired: false,
        }
    }
}

impl Body for DeadlineBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        if this.expired {
            return Poll::Ready(None);
        }

        if let Poll::Ready(frame) = this.inner.as_mut().poll_frame(cx) {
            return Poll::Ready(frame.map(|result| result.map_err(Into::into)));
        }

        match this.deadline.as_mut().poll(cx) {
            Poll::Ready(()) => {
                this.expired = true;
                tracing::warn!("Upstream body timed out");
                Poll::Ready(Some(Err(BodyDeadlineElapsed.into())))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.expired || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
