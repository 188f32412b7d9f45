use super::command::{CaptureResult, Command, PictureCallback};
use super::manager::SessionCore;
use crate::hardware::{CameraId, DisplayContext, SurfaceHandle};
use crate::storage::GeoLocation;
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Lifecycle events of the render target a preview is shown on
pub trait SurfaceCallback {
    fn surface_created(&self, surface: SurfaceHandle);

    fn surface_changed(&self, surface: SurfaceHandle, format: u32, width: u32, height: u32);

    fn surface_destroyed(&self, surface: SurfaceHandle);
}

/// Per-caller handle onto the shared camera session.
///
/// Every method only enqueues work and returns whether it was accepted. The
/// proxy holds a weak reference, so it never keeps the session alive on its own.
#[derive(Clone)]
pub struct DeviceProxy {
    core: Weak<SessionCore>,
    display: Arc<dyn DisplayContext>,
}

impl DeviceProxy {
    pub(crate) fn new(core: Weak<SessionCore>, display: Arc<dyn DisplayContext>) -> Self {
        Self { core, display }
    }

    /// Open the configured default camera and stream it to `surface`
    pub fn start_preview(&self, surface: SurfaceHandle) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        let camera_id = core.default_camera_id;
        core.queue
            .submit(Command::start_preview(surface, camera_id, Arc::clone(&self.display)))
    }

    pub fn start_preview_with(&self, surface: SurfaceHandle, camera_id: CameraId) -> bool {
        self.submit(Command::start_preview(
            surface,
            camera_id,
            Arc::clone(&self.display),
        ))
    }

    /// Run one focus pass and log the result
    pub fn set_auto_focus(&self) -> bool {
        self.set_auto_focus_with(|success| info!("Auto focus finished: {}", success))
    }

    pub fn set_auto_focus_with<F>(&self, callback: F) -> bool
    where
        F: FnOnce(bool) + Send + 'static,
    {
        if !self.is_open() {
            debug!("Auto focus ignored: no camera open");
            return false;
        }
        self.submit(Command::set_auto_focus(Box::new(callback)))
    }

    pub fn stop_preview(&self) -> bool {
        if !self.is_open() {
            debug!("Stop preview ignored: no camera open");
            return false;
        }
        self.submit(Command::stop_preview())
    }

    /// Capture one still from the open camera.
    ///
    /// Returns `false` without queueing when no camera is open or another
    /// capture is queued or running.
    pub fn take_picture<F>(&self, callback: F) -> bool
    where
        F: FnOnce(CaptureResult) + Send + 'static,
    {
        self.submit_picture(None, Box::new(callback))
    }

    /// Like [`DeviceProxy::take_picture`], tagging the record with a location
    pub fn take_picture_at<F>(&self, location: GeoLocation, callback: F) -> bool
    where
        F: FnOnce(CaptureResult) + Send + 'static,
    {
        self.submit_picture(Some(location), Box::new(callback))
    }

    /// Queue a capture and hand back a receiver for its outcome
    pub fn capture(&self) -> Option<oneshot::Receiver<CaptureResult>> {
        let (tx, rx) = oneshot::channel();
        let queued = self.take_picture(move |result| {
            let _ = tx.send(result);
        });
        queued.then_some(rx)
    }

    /// Queue a focus pass and hand back a receiver for its outcome
    pub fn auto_focus(&self) -> Option<oneshot::Receiver<bool>> {
        let (tx, rx) = oneshot::channel();
        let queued = self.set_auto_focus_with(move |success| {
            let _ = tx.send(success);
        });
        queued.then_some(rx)
    }

    /// A camera is open right now. May change before a queued command runs.
    pub fn is_open(&self) -> bool {
        self.core
            .upgrade()
            .map(|core| core.shared.is_open())
            .unwrap_or(false)
    }

    /// The session this proxy was created from is still running
    pub fn is_attached(&self) -> bool {
        self.core.strong_count() > 0
    }

    fn submit_picture(
        &self,
        location: Option<GeoLocation>,
        callback: PictureCallback,
    ) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };

        // orientation must come from the camera open now, not at execution time
        let Some(camera_id) = core.shared.active_camera_id() else {
            debug!("Take picture ignored: no camera open");
            return false;
        };

        core.queue
            .submit(Command::take_picture(camera_id, location, callback))
    }

    fn submit(&self, command: Command) -> bool {
        match self.core.upgrade() {
            Some(core) => core.queue.submit(command),
            None => {
                debug!("Session is gone, dropping {}", command.kind());
                false
            }
        }
    }
}

impl SurfaceCallback for DeviceProxy {
    fn surface_created(&self, surface: SurfaceHandle) {
        debug!("{} created", surface);
    }

    fn surface_changed(&self, surface: SurfaceHandle, format: u32, width: u32, height: u32) {
        let portrait = self.display.is_portrait();
        self.submit(Command::configure_surface(
            surface, format, width, height, portrait,
        ));
    }

    fn surface_destroyed(&self, surface: SurfaceHandle) {
        debug!("{} destroyed", surface);
        self.submit(Command::stop_preview());
    }
}
