use std::future::Future;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use crate::event::RawBlockEvent;
use crate::Error;

pub mod http;

pub type EventResult = Result<Box<dyn RawBlockEvent>, Error>;

/// Hands out live, already-authenticated connections to a ledger gateway,
/// keyed by organization name.
///
/// Lookup failures (unknown organization, provider never initialized) are
/// retryable from the listener's point of view.
pub trait ConnectionProvider: Send + Sync {
    type Connection: LedgerConnection;

    fn connection(&self, org_name: &str) -> Result<&Self::Connection, Error>;
}

/// A connected gateway client.
///
/// "Subscribe to blocks starting at N" is exposed differently across client
/// versions: either as a single method call, or as a request builder that is
/// configured and then opened. A connection advertises each convention it
/// supports; [`open_block_events`] tries them in preference order.
pub trait LedgerConnection: Send + Sync {
    type Request: BlockEventsRequest;

    /// Single-call subscription convention. Client builds lacking the method
    /// return [`Error::UnsupportedSubscription`] so the binder can fall
    /// through; transport failures are returned as-is and propagate.
    fn block_events(
        &self,
        start_block: u64,
    ) -> impl Future<Output = Result<BlockEventStream, Error>> + Send;

    /// Builder-style subscription convention, `None` where absent.
    fn block_events_request(&self) -> Option<Self::Request>;
}

pub trait BlockEventsRequest: Send {
    fn start_block(self, start_block: u64) -> Self;

    fn open(self) -> impl Future<Output = Result<BlockEventStream, Error>> + Send;
}

/// Opens a resumable block event subscription starting at `start_block`,
/// using the first subscription convention the connected client supports.
///
/// Fails with [`Error::UnsupportedSubscription`] when the client exposes none
/// of the known conventions; that is a configuration/version mismatch, not a
/// transient fault, and callers log it accordingly.
pub async fn open_block_events<C>(
    connection: &C,
    start_block: u64,
) -> Result<BlockEventStream, Error>
where
    C: LedgerConnection,
{
    match connection.block_events(start_block).await {
        Ok(stream) => return Ok(stream),
        Err(Error::UnsupportedSubscription) => {}
        Err(err) => return Err(err),
    }

    match connection.block_events_request() {
        Some(request) => request.start_block(start_block).open().await,
        None => Err(Error::UnsupportedSubscription),
    }
}

/// [`BlockEventsRequest`] for connections without the builder convention.
pub struct NullBlockEventsRequest;

impl BlockEventsRequest for NullBlockEventsRequest {
    fn start_block(self, _start_block: u64) -> Self {
        self
    }

    async fn open(self) -> Result<BlockEventStream, Error> {
        Err(Error::UnsupportedSubscription)
    }
}

/// A normalized block event subscription: a lazy pull sequence backed by a
/// live network stream, plus an idempotent close.
pub struct BlockEventStream {
    events: Pin<Box<dyn Stream<Item = EventResult> + Send>>,
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for BlockEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockEventStream").finish_non_exhaustive()
    }
}

impl BlockEventStream {
    pub fn new(events: impl Stream<Item = EventResult> + Send + 'static) -> Self {
        Self {
            events: Box::pin(events),
            closer: None,
        }
    }

    /// Attaches a teardown hook to run on [`BlockEventStream::close`].
    pub fn with_closer(mut self, closer: impl FnOnce() + Send + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }

    /// Pulls the next raw event. May stay pending for an unbounded time while
    /// waiting on network I/O; transport failures surface as `Some(Err(_))`
    /// and exhaustion as `None`.
    pub async fn next(&mut self) -> Option<EventResult> {
        self.events.next().await
    }

    /// Releases the underlying subscription. Idempotent; teardown errors are
    /// swallowed, shutdown must not fail.
    pub fn close(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
        self.events = Box::pin(futures_util::stream::empty());
    }
}

impl Drop for BlockEventStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures_util::stream;

    use super::*;
    use crate::event::RawBlock;

    struct EmptyEvent;

    impl RawBlockEvent for EmptyEvent {
        fn nested_block(&self) -> Option<&dyn RawBlock> {
            None
        }

        fn direct_block(&self) -> Option<&dyn RawBlock> {
            None
        }
    }

    fn one_event_stream() -> BlockEventStream {
        BlockEventStream::new(stream::iter([Ok(Box::new(EmptyEvent) as Box<dyn RawBlockEvent>)]))
    }

    struct DirectConnection;

    impl LedgerConnection for DirectConnection {
        type Request = NullBlockEventsRequest;

        async fn block_events(&self, _start_block: u64) -> Result<BlockEventStream, Error> {
            Ok(one_event_stream())
        }

        fn block_events_request(&self) -> Option<Self::Request> {
            None
        }
    }

    struct BuilderRequest {
        start_block: u64,
    }

    impl BlockEventsRequest for BuilderRequest {
        fn start_block(self, start_block: u64) -> Self {
            Self { start_block }
        }

        async fn open(self) -> Result<BlockEventStream, Error> {
            assert_eq!(self.start_block, 7);
            Ok(one_event_stream())
        }
    }

    struct BuilderOnlyConnection;

    impl LedgerConnection for BuilderOnlyConnection {
        type Request = BuilderRequest;

        async fn block_events(&self, _start_block: u64) -> Result<BlockEventStream, Error> {
            Err(Error::UnsupportedSubscription)
        }

        fn block_events_request(&self) -> Option<Self::Request> {
            Some(BuilderRequest { start_block: 0 })
        }
    }

    struct BareConnection;

    impl LedgerConnection for BareConnection {
        type Request = NullBlockEventsRequest;

        async fn block_events(&self, _start_block: u64) -> Result<BlockEventStream, Error> {
            Err(Error::UnsupportedSubscription)
        }

        fn block_events_request(&self) -> Option<Self::Request> {
            None
        }
    }

    struct FailingDirectConnection;

    impl LedgerConnection for FailingDirectConnection {
        type Request = BuilderRequest;

        async fn block_events(&self, _start_block: u64) -> Result<BlockEventStream, Error> {
            Err(Error::Transport("connection reset".into()))
        }

        fn block_events_request(&self) -> Option<Self::Request> {
            Some(BuilderRequest { start_block: 0 })
        }
    }

    #[tokio::test]
    async fn single_call_convention_is_preferred() {
        let mut stream = open_block_events(&DirectConnection, 0).await.unwrap();
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn builder_convention_is_the_fallback() {
        let mut stream = open_block_events(&BuilderOnlyConnection, 7).await.unwrap();
        assert!(stream.next().await.is_some());
    }

    #[tokio::test]
    async fn no_known_convention_is_a_configuration_failure() {
        let err = open_block_events(&BareConnection, 0).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedSubscription));
    }

    #[tokio::test]
    async fn transport_failure_does_not_fall_through_to_the_builder() {
        let err = open_block_events(&FailingDirectConnection, 0).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_the_sequence() {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = closed.clone();
        let mut stream = one_event_stream().with_closer(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        stream.close();
        stream.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn drop_runs_the_closer_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = closed.clone();
        {
            let mut stream = one_event_stream().with_closer(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            stream.close();
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
