use super::command::{CaptureResult, CapturedPicture, Command, CommandKind, PictureCallback};
use super::state::{Session, SessionShared, SessionStatsCounters};
use crate::config::CameraConfig;
use crate::error::{CameraError, CaptureError, Result};
use crate::hardware::{
    CameraId, CameraProvider, DisplayContext, FocusCallback, FocusMode, PictureFormat,
    SurfaceHandle, DEFAULT_CAMERA_ID,
};
use crate::orientation::{capture_orientation, display_orientation};
use crate::size::{best_picture_size, best_preview_size};
use crate::storage::{GeoLocation, NewMediaRecord, StorageGateway};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// Applies commands to the live session. Runs only on the worker thread.
pub(crate) struct CommandExecutor {
    session: Session,
    provider: Arc<dyn CameraProvider>,
    storage: Arc<dyn StorageGateway>,
    config: CameraConfig,
    shared: Arc<SessionShared>,
}

impl CommandExecutor {
    pub fn new(
        shared: Arc<SessionShared>,
        provider: Arc<dyn CameraProvider>,
        storage: Arc<dyn StorageGateway>,
        config: CameraConfig,
    ) -> Self {
        Self {
            session: Session::new(Arc::clone(&shared)),
            provider,
            storage,
            config,
            shared,
        }
    }

    pub fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    pub fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::StartPreview {
                surface,
                camera_id,
                display,
                ..
            } => self.start_preview(surface, camera_id, display.as_ref()),
            Command::ConfigureSurface {
                surface,
                format,
                width,
                height,
                portrait,
                ..
            } => self.configure_surface(surface, format, width, height, portrait),
            Command::StopPreview { .. } => {
                self.session.close();
                Ok(())
            }
            Command::SetAutoFocus { callback, .. } => self.set_auto_focus(callback),
            Command::TakePicture {
                camera_id,
                location,
                callback,
                issued_at,
            } => {
                self.take_picture(camera_id, location, issued_at, callback);
                Ok(())
            }
        }
    }

    /// Restore the session invariants after a handler unwound.
    ///
    /// A capture needs nothing here: its guard clears `capturing` while unwinding.
    pub fn recover_after_panic(&mut self, kind: CommandKind) {
        if kind == CommandKind::StartPreview {
            warn!("Closing camera after interrupted start_preview");
            self.session.close();
        }
    }

    /// Release any open camera when the worker exits
    pub fn shutdown(&mut self) {
        if self.session.is_open() {
            info!("Releasing camera {} on shutdown", self.session.camera_id());
        }
        self.session.close();
    }

    fn start_preview(
        &mut self,
        surface: SurfaceHandle,
        camera_id: CameraId,
        display: &dyn DisplayContext,
    ) -> Result<()> {
        if self.session.is_open() && self.session.camera_id() == camera_id {
            debug!("Camera {} already previewing", camera_id);
            return Ok(());
        }

        if self.provider.is_disabled_by_policy() {
            error!("Camera is disabled by device policy");
        }

        self.session.close();

        let count = self.provider.camera_count();
        let id = match usize::try_from(camera_id) {
            Ok(index) if index < count => camera_id,
            _ => {
                warn!(
                    "Camera id {} out of range ({} cameras), using default camera",
                    camera_id, count
                );
                DEFAULT_CAMERA_ID
            }
        };

        let handle = self.provider.open(id)?;
        self.session.attach(handle);

        if let Err(e) = self.bring_up_preview(surface, id, display) {
            self.session.close();
            return Err(e);
        }

        info!("Preview started on camera {} ({})", id, surface);
        Ok(())
    }

    fn bring_up_preview(
        &mut self,
        surface: SurfaceHandle,
        id: CameraId,
        display: &dyn DisplayContext,
    ) -> Result<()> {
        let info = self.provider.camera_info(id)?;
        let handle = self
            .session
            .handle_mut()
            .ok_or(CameraError::SessionClosed)?;

        let mut parameters = handle.parameters()?;
        for size in &parameters.supported_preview_sizes {
            debug!("Supported preview size: {}", size);
        }
        for size in &parameters.supported_picture_sizes {
            debug!("Supported picture size: {}", size);
        }

        let degrees = display_orientation(display.rotation(), info.orientation, info.facing);
        debug!(
            "Display orientation {} for {:?} camera mounted at {}",
            degrees, info.facing, info.orientation
        );
        handle.set_display_orientation(degrees)?;

        parameters.picture_format = PictureFormat::Jpeg;
        parameters.jpeg_quality = self.config.jpeg_quality;
        if parameters.supports_focus_mode(FocusMode::Auto) {
            parameters.focus_mode = Some(FocusMode::Auto);
        }
        handle.set_parameters(&parameters)?;

        handle.set_preview_surface(surface)?;
        handle.start_preview()?;

        if self.config.auto_focus_on_start {
            handle.auto_focus(Box::new(move |success| {
                debug!("Camera {} initial auto focus {}", id, success);
            }))?;
        }

        Ok(())
    }

    fn configure_surface(
        &mut self,
        surface: SurfaceHandle,
        format: u32,
        width: u32,
        height: u32,
        portrait: bool,
    ) -> Result<()> {
        let Some(handle) = self.session.handle_mut() else {
            debug!("Ignoring surface change on {}: no camera open", surface);
            return Ok(());
        };

        debug!(
            "Configuring {} format {} at {}x{} ({})",
            surface,
            format,
            width,
            height,
            if portrait { "portrait" } else { "landscape" }
        );

        let mut parameters = handle.parameters()?;
        let preview = best_preview_size(&parameters.supported_preview_sizes, width, height, portrait)
            .ok_or(CameraError::NoSupportedSize)?;
        parameters.preview_size = Some(preview);
        info!("Set preview size {}", preview);

        match best_picture_size(&parameters.supported_picture_sizes, preview) {
            Some(picture) => {
                parameters.picture_size = Some(picture);
                info!("Set picture size {}", picture);
            }
            None => warn!(
                "No picture size matches preview {}, keeping {:?}",
                preview, parameters.picture_size
            ),
        }

        handle.set_parameters(&parameters)?;
        Ok(())
    }

    fn set_auto_focus(&mut self, callback: FocusCallback) -> Result<()> {
        let Some(handle) = self.session.handle_mut() else {
            debug!("Auto focus requested with no camera open");
            callback(false);
            return Ok(());
        };

        // the hardware owns the callback once accepted; keep a way to report a refusal
        let slot = Arc::new(Mutex::new(Some(callback)));
        let hardware_slot = Arc::clone(&slot);
        let result = handle.auto_focus(Box::new(move |success| {
            if let Some(callback) = hardware_slot.lock().take() {
                callback(success);
            }
        }));

        if let Err(e) = result {
            if let Some(callback) = slot.lock().take() {
                callback(false);
            }
            return Err(e.into());
        }

        Ok(())
    }

    fn take_picture(
        &mut self,
        camera_id: CameraId,
        location: Option<GeoLocation>,
        issued_at: SystemTime,
        callback: PictureCallback,
    ) {
        let outcome = if self.session.is_open() {
            let shared = Arc::clone(&self.shared);
            let _capturing = shared.begin_capture();
            self.capture(camera_id, location, issued_at)
        } else {
            self.shared.release_capture_reservation();
            Err(CaptureError::SessionClosed)
        };

        match &outcome {
            Ok(picture) => {
                SessionStatsCounters::increment(&self.shared.counters().pictures_persisted);
                info!(
                    "Picture {} saved to {} ({} bytes)",
                    picture.record,
                    picture.path.display(),
                    picture.size_bytes
                );
            }
            Err(CaptureError::SessionClosed) => {
                debug!("Capture skipped: camera closed before it ran")
            }
            Err(e) => error!("Capture failed: {}", e),
        }

        callback(outcome);
    }

    fn capture(
        &mut self,
        camera_id: CameraId,
        location: Option<GeoLocation>,
        issued_at: SystemTime,
    ) -> CaptureResult {
        let handle = self
            .session
            .handle_mut()
            .ok_or(CaptureError::SessionClosed)?;

        let data = handle.take_picture()?;
        let parameters = handle.parameters()?;
        let size = parameters
            .picture_size
            .or_else(|| parameters.supported_picture_sizes.first().copied())
            .unwrap_or_default();

        // the camera that was open at submission, not whatever is open now
        let orientation = capture_orientation(self.provider.as_ref(), camera_id)?;

        let (title, path) = self
            .storage
            .unique_path(&self.storage.generate_filename())
            .map_err(CaptureError::Storage)?;
        self.storage
            .write_bytes(&path, &data)
            .map_err(CaptureError::Write)?;

        let size_bytes = data.len() as u64;
        let record = self
            .storage
            .insert_record(NewMediaRecord {
                title,
                taken_at: DateTime::<Utc>::from(issued_at),
                orientation,
                size_bytes,
                path: path.clone(),
                width: size.width,
                height: size.height,
                location,
            })
            .map_err(|source| CaptureError::Index {
                path: path.clone(),
                source,
            })?;

        Ok(CapturedPicture {
            record,
            path,
            camera_id,
            size,
            orientation,
            size_bytes,
        })
    }
}
