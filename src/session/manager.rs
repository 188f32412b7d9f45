use super::handlers::CommandExecutor;
use super::proxy::DeviceProxy;
use super::state::{SessionShared, SessionSnapshot, SessionStats};
use super::worker::CommandQueue;
use crate::config::CameraConfig;
use crate::error::Result;
use crate::hardware::{CameraId, CameraProvider, DisplayContext};
use crate::storage::StorageGateway;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};

/// State every proxy reaches through its weak reference
pub(crate) struct SessionCore {
    pub queue: CommandQueue,
    pub shared: Arc<SessionShared>,
    pub default_camera_id: CameraId,
}

/// Owns the camera session worker and hands out proxies to it.
///
/// Create one per physical camera stack. Dropping the manager drains the queue,
/// releases any open camera, and joins the worker.
pub struct SessionManager {
    core: Option<Arc<SessionCore>>,
    shared: Arc<SessionShared>,
    worker: Option<JoinHandle<()>>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        storage: Arc<dyn StorageGateway>,
        config: CameraConfig,
    ) -> Result<Self> {
        let shared = Arc::new(SessionShared::new());
        let default_camera_id = config.default_id;
        let executor = CommandExecutor::new(Arc::clone(&shared), provider, storage, config);
        let (queue, worker) = CommandQueue::spawn(executor, Arc::clone(&shared))?;

        info!(
            "Camera session manager started (default camera {})",
            default_camera_id
        );

        Ok(Self {
            core: Some(Arc::new(SessionCore {
                queue,
                shared: Arc::clone(&shared),
                default_camera_id,
            })),
            shared,
            worker: Some(worker),
        })
    }

    /// New caller handle rendering onto `display`
    pub fn device(&self, display: Arc<dyn DisplayContext>) -> DeviceProxy {
        let core = self.core.as_ref().map(Arc::downgrade).unwrap_or_default();
        DeviceProxy::new(core, display)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.stats()
    }

    /// Commands waiting behind the one executing
    pub fn pending(&self) -> usize {
        self.core.as_ref().map(|core| core.queue.pending()).unwrap_or(0)
    }

    /// Wait until every command submitted so far has run.
    ///
    /// Returns `false` on timeout or after shutdown. Never call this from a
    /// session callback: those run on the worker it would wait for.
    pub fn flush(&self, timeout: Duration) -> bool {
        match &self.core {
            Some(core) => core.queue.flush(timeout),
            None => false,
        }
    }

    /// Stop accepting commands, let queued ones finish, and join the worker
    pub fn shutdown(&mut self) {
        // proxies only hold weak references, so this closes the channel
        self.core.take();

        if let Some(worker) = self.worker.take() {
            info!("Waiting for camera session worker to drain");
            if worker.join().is_err() {
                error!("Camera session worker panicked during shutdown");
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
