use crate::error::CaptureError;
use crate::hardware::{CameraId, DisplayContext, FocusCallback, SurfaceHandle};
use crate::size::Size;
use crate::storage::{GeoLocation, RecordRef};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// A persisted and indexed capture
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPicture {
    pub record: RecordRef,
    pub path: PathBuf,
    pub camera_id: CameraId,
    pub size: Size,
    pub orientation: u32,
    pub size_bytes: u64,
}

pub type CaptureResult = Result<CapturedPicture, CaptureError>;

/// Invoked exactly once, from the worker thread, with the capture outcome
pub type PictureCallback = Box<dyn FnOnce(CaptureResult) + Send + 'static>;

/// Discriminant of a [`Command`], used for logging and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    StartPreview,
    ConfigureSurface,
    StopPreview,
    SetAutoFocus,
    TakePicture,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::StartPreview => "start_preview",
            CommandKind::ConfigureSurface => "configure_surface",
            CommandKind::StopPreview => "stop_preview",
            CommandKind::SetAutoFocus => "set_auto_focus",
            CommandKind::TakePicture => "take_picture",
        };
        f.write_str(name)
    }
}

/// One unit of session work. Immutable once queued.
pub enum Command {
    StartPreview {
        surface: SurfaceHandle,
        camera_id: CameraId,
        display: Arc<dyn DisplayContext>,
        issued_at: SystemTime,
    },
    ConfigureSurface {
        surface: SurfaceHandle,
        format: u32,
        width: u32,
        height: u32,
        portrait: bool,
        issued_at: SystemTime,
    },
    StopPreview {
        issued_at: SystemTime,
    },
    SetAutoFocus {
        callback: FocusCallback,
        issued_at: SystemTime,
    },
    TakePicture {
        /// Camera open when the request was made; orientation is derived from it
        camera_id: CameraId,
        location: Option<GeoLocation>,
        callback: PictureCallback,
        issued_at: SystemTime,
    },
}

impl Command {
    pub fn start_preview(
        surface: SurfaceHandle,
        camera_id: CameraId,
        display: Arc<dyn DisplayContext>,
    ) -> Self {
        Command::StartPreview {
            surface,
            camera_id,
            display,
            issued_at: SystemTime::now(),
        }
    }

    pub fn configure_surface(
        surface: SurfaceHandle,
        format: u32,
        width: u32,
        height: u32,
        portrait: bool,
    ) -> Self {
        Command::ConfigureSurface {
            surface,
            format,
            width,
            height,
            portrait,
            issued_at: SystemTime::now(),
        }
    }

    pub fn stop_preview() -> Self {
        Command::StopPreview {
            issued_at: SystemTime::now(),
        }
    }

    pub fn set_auto_focus(callback: FocusCallback) -> Self {
        Command::SetAutoFocus {
            callback,
            issued_at: SystemTime::now(),
        }
    }

    pub fn take_picture(
        camera_id: CameraId,
        location: Option<GeoLocation>,
        callback: PictureCallback,
    ) -> Self {
        Command::TakePicture {
            camera_id,
            location,
            callback,
            issued_at: SystemTime::now(),
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::StartPreview { .. } => CommandKind::StartPreview,
            Command::ConfigureSurface { .. } => CommandKind::ConfigureSurface,
            Command::StopPreview { .. } => CommandKind::StopPreview,
            Command::SetAutoFocus { .. } => CommandKind::SetAutoFocus,
            Command::TakePicture { .. } => CommandKind::TakePicture,
        }
    }

    /// When the command was submitted
    pub fn issued_at(&self) -> SystemTime {
        match self {
            Command::StartPreview { issued_at, .. }
            | Command::ConfigureSurface { issued_at, .. }
            | Command::StopPreview { issued_at }
            | Command::SetAutoFocus { issued_at, .. }
            | Command::TakePicture { issued_at, .. } => *issued_at,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::StartPreview {
                surface,
                camera_id,
                issued_at,
                ..
            } => f
                .debug_struct("StartPreview")
                .field("surface", surface)
                .field("camera_id", camera_id)
                .field("issued_at", issued_at)
                .finish_non_exhaustive(),
            Command::ConfigureSurface {
                surface,
                format,
                width,
                height,
                portrait,
                issued_at,
            } => f
                .debug_struct("ConfigureSurface")
                .field("surface", surface)
                .field("format", format)
                .field("width", width)
                .field("height", height)
                .field("portrait", portrait)
                .field("issued_at", issued_at)
                .finish(),
            Command::StopPreview { issued_at } => f
                .debug_struct("StopPreview")
                .field("issued_at", issued_at)
                .finish(),
            Command::SetAutoFocus { issued_at, .. } => f
                .debug_struct("SetAutoFocus")
                .field("issued_at", issued_at)
                .finish_non_exhaustive(),
            Command::TakePicture {
                camera_id,
                location,
                issued_at,
                ..
            } => f
                .debug_struct("TakePicture")
                .field("camera_id", camera_id)
                .field("location", location)
                .field("issued_at", issued_at)
                .finish_non_exhaustive(),
        }
    }
}
