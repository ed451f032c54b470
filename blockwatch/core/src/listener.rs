use std::time::Duration;

use log::{debug, error, info, warn};

use crate::event;
use crate::gateway::{self, BlockEventStream, ConnectionProvider};
use crate::service::{Daemon, FinishHandle, ShutdownHandle};
use crate::storage::BlockStore;
use crate::Error;

const MIN_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Runs one long-lived ingestion loop per configured organization.
///
/// Each loop reads its resume cursor, opens a block event subscription at the
/// cursor, extracts and persists every event, and on any failure waits out the
/// retry interval before reconnecting. Failures are expected (peer restarts,
/// network partitions) and never fatal; the loops only end on an explicit
/// shutdown request.
pub struct BlockListenerManager<P, S> {
    provider: P,
    store: S,
    organizations: Vec<String>,
    retry_interval: Duration,
    finish_handle: FinishHandle,
}

impl<P, S> BlockListenerManager<P, S>
where
    P: ConnectionProvider + Clone + 'static,
    S: BlockStore + Clone + Send + Sync + 'static,
{
    pub fn new(
        provider: P,
        store: S,
        organizations: Vec<String>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            organizations,
            retry_interval: retry_interval.max(MIN_RETRY_INTERVAL),
            finish_handle: FinishHandle::new(),
        }
    }

    async fn run(self) {
        if self.organizations.is_empty() {
            warn!("No organizations configured; block listeners stay idle");
            self.finish_handle.shutdown_requested().await;
            self.finish_handle.finish();
            return;
        }

        let mut listeners = Vec::new();
        for org_name in &self.organizations {
            let listener = OrgListener {
                org_name: org_name.clone(),
                provider: self.provider.clone(),
                store: self.store.clone(),
                retry_interval: self.retry_interval,
                finish_handle: self.finish_handle.clone(),
            };
            listeners.push(tokio::spawn(listener.run()));
        }
        info!("Block listeners started: orgs={:?}", self.organizations);

        futures_util::future::join_all(listeners).await;
        debug!("Graceful shutdown finished");
        self.finish_handle.finish();
    }
}

impl<P, S> Daemon for BlockListenerManager<P, S>
where
    P: ConnectionProvider + Clone + 'static,
    S: BlockStore + Clone + Send + Sync + 'static,
{
    fn shutdown_handle(&self) -> ShutdownHandle {
        self.finish_handle.shutdown_handle()
    }

    fn start(self) {
        tokio::spawn(self.run());
    }
}

struct OrgListener<P, S> {
    org_name: String,
    provider: P,
    store: S,
    retry_interval: Duration,
    finish_handle: FinishHandle,
}

impl<P, S> OrgListener<P, S>
where
    P: ConnectionProvider,
    S: BlockStore,
{
    async fn run(self) {
        loop {
            if self.finish_handle.is_shutdown_requested() {
                break;
            }
            if self.connect_and_stream().await {
                break;
            }
            // RETRY_WAIT, cut short by a shutdown request.
            tokio::select! {
                _ = self.finish_handle.shutdown_requested() => break,
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }
        debug!("Block listener stopped: org={}", self.org_name);
    }

    /// One connection attempt followed by streaming until the subscription
    /// fails or runs dry. Returns whether a shutdown was requested.
    async fn connect_and_stream(&self) -> bool {
        let start_block = match self.store.latest_block_num(&self.org_name).await {
            Ok(Some(latest)) => latest + 1,
            Ok(None) => 0,
            Err(err) => {
                warn!(
                    "Failed to read resume cursor: org={}, error={}",
                    self.org_name, err
                );
                return false;
            }
        };

        let connection = match self.provider.connection(&self.org_name) {
            Ok(connection) => connection,
            Err(err) => {
                error!(
                    "Block listener init failed: org={}, error={}",
                    self.org_name, err
                );
                return false;
            }
        };

        info!(
            "Block listener connecting: org={}, start_block={}",
            self.org_name, start_block
        );

        let mut stream = tokio::select! {
            _ = self.finish_handle.shutdown_requested() => return true,
            result = gateway::open_block_events(connection, start_block) => match result {
                Ok(stream) => stream,
                Err(err @ Error::UnsupportedSubscription) => {
                    // Likely a client/version mismatch rather than a
                    // transient fault; logged louder so operators can tell
                    // the two apart, but still retried.
                    error!(
                        "Block subscription unsupported: org={}, error={}",
                        self.org_name, err
                    );
                    return false;
                }
                Err(err) => {
                    warn!(
                        "Block listener error: org={}, start_block={}, error={}",
                        self.org_name, start_block, err
                    );
                    return false;
                }
            }
        };

        let stop = self.stream_events(&mut stream).await;
        stream.close();
        stop
    }

    async fn stream_events(&self, stream: &mut BlockEventStream) -> bool {
        loop {
            let event = tokio::select! {
                _ = self.finish_handle.shutdown_requested() => return true,
                event = stream.next() => event,
            };

            let event = match event {
                Some(Ok(event)) => event,
                Some(Err(err)) => {
                    warn!(
                        "Block listener error: org={}, error={}",
                        self.org_name, err
                    );
                    return false;
                }
                None => {
                    warn!(
                        "Block events stream ended: org={}, will retry after {}s",
                        self.org_name,
                        self.retry_interval.as_secs()
                    );
                    return false;
                }
            };

            let record = match event::block_record_from_event(event.as_ref()) {
                Ok(record) => record,
                Err(err) => {
                    // Nothing was written for the bad event, so state stays
                    // consistent; reconnecting gets a fresh delivery.
                    warn!(
                        "Failed to extract block event: org={}, error={}",
                        self.org_name, err
                    );
                    return false;
                }
            };

            match self.store.save_block(&self.org_name, &record).await {
                Ok(()) => debug!(
                    "Saved block: org={}, block_num={}",
                    self.org_name, record.block_num
                ),
                Err(err) => {
                    warn!(
                        "Failed to save block: org={}, block_num={}, error={}",
                        self.org_name, record.block_num, err
                    );
                    return false;
                }
            }
        }
    }
}
