//! Response body that keeps its request's deadline running until the last
//! frame is out.
//!
//! A handler returning headers is not the end of its unit of work: a streamed
//! body can stall after the status line. The deadline therefore moves into the
//! body and completes only when the body ends, errors, or is dropped. If the
//! timer fires mid-stream the record has already been reported; the body then
//! yields an error so the connection is cut instead of hanging.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use http_body::{Body as HttpBody, Frame, SizeHint};
use tokio::sync::oneshot;

use crate::error::TimeoutExceeded;
use crate::guard::deadline::Deadline;

/// Body wrapper owning the [`Deadline`] of the request that produced it.
#[derive(Debug)]
pub struct GuardedBody {
    inner: Body,
    deadline: Deadline,
    fired: Option<oneshot::Receiver<()>>,
    failure: TimeoutExceeded,
    done: bool,
}

impl GuardedBody {
    /// Wrap `inner`; `fired` resolves when the deadline's timer wins.
    pub fn new(
        inner: Body,
        deadline: Deadline,
        fired: oneshot::Receiver<()>,
        failure: TimeoutExceeded,
    ) -> Self {
        Self {
            inner,
            deadline,
            fired: Some(fired),
            failure,
            done: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.deadline.complete();
    }
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if let Some(fired) = this.fired.as_mut() {
            match Pin::new(fired).poll(cx) {
                Poll::Ready(Ok(())) => {
                    this.done = true;
                    tracing::warn!(
                        operation = %this.failure.operation,
                        timeout_ms = this.failure.timeout_ms,
                        "Response body cut off at deadline"
                    );
                    return Poll::Ready(Some(Err(axum::Error::new(this.failure.clone()))));
                }
                // Timer released without firing.
                Poll::Ready(Err(_)) => this.fired = None,
                Poll::Pending => {}
            }
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        if self.done {
            return true;
        }
        let ended = self.inner.is_end_stream();
        if ended {
            // Last frame already handed out.
            self.deadline.complete();
        }
        ended
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
