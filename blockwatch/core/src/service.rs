use tokio_util::sync::CancellationToken;

/// Long-running background services that support graceful shutdown.
pub trait Daemon: Send {
    fn shutdown_handle(&self) -> ShutdownHandle;

    fn start(self);
}

/// Held by a running service. Lets the service observe shutdown requests made
/// through its [`ShutdownHandle`]s and announce when it has wound down, whether
/// due to such a request or a voluntary exit.
#[derive(Debug, Default, Clone)]
pub struct FinishHandle {
    cancellation: CancellationToken,
    finish: CancellationToken,
}

/// Held by whoever supervises a service. Requests cancellation and waits for
/// the service to report that it has stopped.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    cancellation: CancellationToken,
    finish: CancellationToken,
}

impl FinishHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            cancellation: self.cancellation.clone(),
            finish: self.finish.clone(),
        }
    }

    /// Announces that the service has stopped executing.
    pub fn finish(&self) {
        self.finish.cancel();
    }

    /// Whether a shutdown request has been made via [`ShutdownHandle::shutdown`].
    pub fn is_shutdown_requested(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once a shutdown request is made. Services select on this
    /// future alongside their blocking operations so that pending pulls and
    /// sleeps abort promptly instead of running out their full duration.
    pub async fn shutdown_requested(&self) {
        self.cancellation.cancelled().await
    }
}

impl ShutdownHandle {
    /// Requests a shutdown without waiting for the service to stop.
    ///
    /// Idempotent. Use [`ShutdownHandle::finished`] to wait for the service.
    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }

    /// Resolves once the service has stopped executing, either through a
    /// requested shutdown or a voluntary exit.
    pub async fn finished(&self) {
        self.finish.cancelled().await
    }
}
