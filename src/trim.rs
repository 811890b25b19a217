//! Background trimming of idle instances

use crate::host::Host;
use crate::pool::Pool;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Running [`Pool::trim_loop`] for one pool.
///
/// Stopping is immediate: a trim pass is synchronous, so the task can only
/// be interrupted while it waits for the next tick. Dropping the handle
/// stops the task too.
///
/// # Examples
///
/// ```
/// use esox_instancepool::{MemoryHost, Pool, PoolConfiguration, TrimTask};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = Pool::new(Arc::new(MemoryHost::new()), "leaf", PoolConfiguration::default()).unwrap();
/// let task = TrimTask::start(pool, &tokio::runtime::Handle::current());
/// assert!(!task.is_cancelled());
/// task.stop();
/// # }
/// ```
#[derive(Debug)]
pub struct TrimTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TrimTask {
    /// Spawn the trim loop of `pool` on `scheduler`
    pub fn start<H: Host>(pool: Pool<H>, scheduler: &Handle) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        debug!(template = ?pool.template(), "Starting trim task");
        let handle = scheduler.spawn(async move {
            pool.trim_loop(token).await;
            debug!(template = ?pool.template(), "Trim task finished");
        });

        Self { cancel, handle }
    }

    /// Ask the loop to stop at its next wait
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the loop right away
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for TrimTask {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}
