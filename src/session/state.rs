use crate::hardware::{CameraHandle, CameraId, NO_CAMERA};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Session flags visible to every thread.
///
/// Only the worker mutates the camera id and `capturing`; submitters read them
/// for their guards and race only on the capture reservation.
#[derive(Debug)]
pub struct SessionShared {
    active_camera_id: AtomicI32,
    capturing: AtomicBool,
    capture_queued: AtomicBool,
    stats: SessionStatsCounters,
}

impl SessionShared {
    pub fn new() -> Self {
        Self {
            active_camera_id: AtomicI32::new(NO_CAMERA),
            capturing: AtomicBool::new(false),
            capture_queued: AtomicBool::new(false),
            stats: SessionStatsCounters::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.active_camera_id.load(Ordering::SeqCst) != NO_CAMERA
    }

    pub fn active_camera_id(&self) -> Option<CameraId> {
        match self.active_camera_id.load(Ordering::SeqCst) {
            NO_CAMERA => None,
            id => Some(id),
        }
    }

    /// A capture is executing on the worker
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// A capture is queued or executing
    pub fn capture_pending(&self) -> bool {
        self.capture_queued.load(Ordering::SeqCst) || self.is_capturing()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            camera_id: self.active_camera_id(),
            capturing: self.is_capturing(),
            capture_queued: self.capture_queued.load(Ordering::SeqCst),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.snapshot()
    }

    pub(crate) fn counters(&self) -> &SessionStatsCounters {
        &self.stats
    }

    /// Claim the single capture slot. Fails while another capture is queued or running.
    pub(crate) fn try_reserve_capture(&self) -> bool {
        if self
            .capture_queued
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        // the worker raises `capturing` before it clears `capture_queued`
        if self.capturing.load(Ordering::SeqCst) {
            self.capture_queued.store(false, Ordering::SeqCst);
            return false;
        }

        true
    }

    pub(crate) fn release_capture_reservation(&self) {
        self.capture_queued.store(false, Ordering::SeqCst);
    }

    /// Move the reservation to the in-flight flag. Cleared when the guard drops.
    pub(crate) fn begin_capture(&self) -> CaptureGuard<'_> {
        self.capturing.store(true, Ordering::SeqCst);
        self.capture_queued.store(false, Ordering::SeqCst);
        CaptureGuard { shared: self }
    }

    fn set_active_camera(&self, id: CameraId) {
        self.active_camera_id.store(id, Ordering::SeqCst);
    }

    fn clear_capturing(&self) {
        self.capturing.store(false, Ordering::SeqCst);
    }
}

impl Default for SessionShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the capturing flag on every exit path of a capture
pub(crate) struct CaptureGuard<'a> {
    shared: &'a SessionShared,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.shared.clear_capturing();
    }
}

/// Point-in-time view of the session flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub camera_id: Option<CameraId>,
    pub capturing: bool,
    pub capture_queued: bool,
}

/// Counters for queue and capture activity
#[derive(Debug, Default)]
pub(crate) struct SessionStatsCounters {
    pub commands_submitted: AtomicU64,
    pub commands_processed: AtomicU64,
    pub commands_failed: AtomicU64,
    pub pictures_persisted: AtomicU64,
    pub duplicate_captures_rejected: AtomicU64,
}

impl SessionStatsCounters {
    pub fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            commands_submitted: self.commands_submitted.load(Ordering::Relaxed),
            commands_processed: self.commands_processed.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            pictures_persisted: self.pictures_persisted.load(Ordering::Relaxed),
            duplicate_captures_rejected: self.duplicate_captures_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of session statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub commands_submitted: u64,
    pub commands_processed: u64,
    pub commands_failed: u64,
    pub pictures_persisted: u64,
    pub duplicate_captures_rejected: u64,
}

/// The live session, owned by the worker thread alone
pub(crate) struct Session {
    handle: Option<Box<dyn CameraHandle>>,
    camera_id: CameraId,
    shared: Arc<SessionShared>,
}

impl Session {
    pub fn new(shared: Arc<SessionShared>) -> Self {
        Self {
            handle: None,
            camera_id: NO_CAMERA,
            shared,
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn handle_mut(&mut self) -> Option<&mut (dyn CameraHandle + 'static)> {
        self.handle.as_deref_mut()
    }

    /// Adopt a freshly opened handle. The previous session must be closed.
    pub fn attach(&mut self, handle: Box<dyn CameraHandle>) {
        debug_assert!(self.handle.is_none(), "camera handle attached twice");
        self.camera_id = handle.id();
        self.handle = Some(handle);
        self.shared.set_active_camera(self.camera_id);
        info!("Camera {} opened", self.camera_id);
    }

    /// Release the handle if present. Safe to call on a closed session.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            let id = self.camera_id;
            handle.release();
            info!("Camera {} released", id);
        } else {
            debug!("Stop requested with no open camera");
        }

        self.camera_id = NO_CAMERA;
        self.shared.set_active_camera(NO_CAMERA);
        self.shared.clear_capturing();
    }
}
