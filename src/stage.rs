//! The capability set shared by every pipeline stage, and the driver that
//! turns a stage plus an upstream into a `Stream`.
//!
//! A stage only has to say what happens when an item arrives ([`Stage::accept`])
//! and, optionally, when the upstream ends ([`Stage::flush`]). Polling the
//! upstream, queueing outputs and propagating errors live once in [`Piped`],
//! so the file stage and the content collector stay small.
//!
//! ## Error semantics
//!
//! A failing `accept`/`flush`, or an error item from the upstream, is yielded
//! once as `Err` and then the stream ends. A failed stage never processes
//! another item.

use crate::error::StageError;
use futures::stream::{FusedStream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_stream::Stream;
use tracing::warn;

/// Queue of items a stage has produced but not yet handed downstream.
#[derive(Debug)]
pub struct Emitter<T> {
    queue: VecDeque<T>,
}

impl<T> Emitter<T> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Queue one item for downstream.
    pub fn emit(&mut self, item: T) {
        self.queue.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One step of a pipeline.
pub trait Stage {
    type Input;
    type Output;

    /// Handle one item from upstream, emitting zero or more outputs.
    fn accept(&mut self, item: Self::Input, out: &mut Emitter<Self::Output>) -> Result<(), StageError>;

    /// Called once after the upstream ended.
    fn flush(&mut self, out: &mut Emitter<Self::Output>) -> Result<(), StageError> {
        let _ = out;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipeState {
    Open,
    Done,
}

/// A stage fed by an upstream stream; itself a stream of the stage's outputs.
///
/// Built by [`pipe`].
pub struct Piped<S, T: Stage> {
    upstream: S,
    stage: T,
    out: Emitter<T::Output>,
    state: PipeState,
}

/// Feed `upstream` through `stage`.
pub fn pipe<S, T>(upstream: S, stage: T) -> Piped<S, T>
where
    S: Stream<Item = Result<T::Input, StageError>> + Unpin,
    T: Stage + Unpin,
{
    Piped {
        upstream,
        stage,
        out: Emitter::new(),
        state: PipeState::Open,
    }
}

// Fields are never pinned structurally.
impl<S: Unpin, T: Stage + Unpin> Unpin for Piped<S, T> {}

impl<S, T: Stage> Piped<S, T> {
    /// The stage being driven.
    pub fn stage(&self) -> &T {
        &self.stage
    }

    fn fail(&mut self, e: StageError) -> Poll<Option<Result<T::Output, StageError>>> {
        self.state = PipeState::Done;
        self.out.clear();
        Poll::Ready(Some(Err(e)))
    }
}

impl<S, T> Stream for Piped<S, T>
where
    S: Stream<Item = Result<T::Input, StageError>> + Unpin,
    T: Stage + Unpin,
{
    type Item = Result<T::Output, StageError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(item) = this.out.pop() {
                return Poll::Ready(Some(Ok(item)));
            }
            if this.state == PipeState::Done {
                return Poll::Ready(None);
            }

            match this.upstream.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(item))) => {
                    if let Err(e) = this.stage.accept(item, &mut this.out) {
                        return this.fail(e);
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!("Upstream failed: {}", e);
                    return this.fail(e);
                }
                Poll::Ready(None) => {
                    this.state = PipeState::Done;
                    if let Err(e) = this.stage.flush(&mut this.out) {
                        return this.fail(e);
                    }
                }
            }
        }
    }
}

impl<S, T> FusedStream for Piped<S, T>
where
    S: Stream<Item = Result<T::Input, StageError>> + Unpin,
    T: Stage + Unpin,
{
    fn is_terminated(&self) -> bool {
        self.state == PipeState::Done && self.out.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, TryStreamExt};

    /// Doubles every number and emits a running total at the end.
    #[derive(Default)]
    struct DoubleAndSum {
        total: u32,
    }

    impl Stage for DoubleAndSum {
        type Input = u32;
        type Output = u32;

        fn accept(&mut self, item: u32, out: &mut Emitter<u32>) -> Result<(), StageError> {
            if item == 13 {
                return Err(StageError::configuration("unlucky"));
            }
            self.total += item;
            out.emit(item * 2);
            Ok(())
        }

        fn flush(&mut self, out: &mut Emitter<u32>) -> Result<(), StageError> {
            out.emit(self.total);
            Ok(())
        }
    }

    fn ok_iter(items: Vec<u32>) -> impl Stream<Item = Result<u32, StageError>> + Unpin {
        stream::iter(items.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn accepts_in_order_then_flushes() {
        let out: Vec<u32> = pipe(ok_iter(vec![1, 2, 3]), DoubleAndSum::default())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(out, vec![2, 4, 6, 6]);
    }

    #[tokio::test]
    async fn empty_upstream_still_flushes() {
        let out: Vec<u32> = pipe(ok_iter(vec![]), DoubleAndSum::default())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(out, vec![0]);
    }

    #[tokio::test]
    async fn accept_error_terminates_the_stream() {
        let mut piped = pipe(ok_iter(vec![1, 13, 2]), DoubleAndSum::default());
        assert_eq!(piped.next().await.unwrap().unwrap(), 2);
        assert!(piped.next().await.unwrap().is_err());
        assert!(piped.is_terminated());
        assert!(piped.next().await.is_none());
        assert_eq!(piped.stage().total, 1, "nothing after the failure is accepted");
    }

    #[tokio::test]
    async fn upstream_error_is_forwarded() {
        let upstream = stream::iter(vec![
            Ok(1),
            Err(StageError::Stream(std::io::Error::other("boom"))),
            Ok(2),
        ]);
        let mut piped = pipe(upstream, DoubleAndSum::default());
        assert_eq!(piped.next().await.unwrap().unwrap(), 2);
        assert!(matches!(piped.next().await, Some(Err(StageError::Stream(_)))));
        assert!(piped.next().await.is_none());
    }

    #[test]
    fn pending_upstream_yields_pending() {
        let mut piped = tokio_test::task::spawn(pipe(
            stream::pending::<Result<u32, StageError>>(),
            DoubleAndSum::default(),
        ));
        tokio_test::assert_pending!(piped.poll_next());
    }
}
