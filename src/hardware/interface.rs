use crate::error::CameraError;
use crate::orientation::{Facing, Rotation};
use crate::size::Size;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware camera index. Negative means "no camera".
pub type CameraId = i32;

/// Default rear-facing camera
pub const DEFAULT_CAMERA_ID: CameraId = 0;

/// Sentinel for a closed session
pub const NO_CAMERA: CameraId = -1;

/// Opaque render target the preview stream is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle(pub u64);

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Static facts about a camera sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraInfo {
    pub facing: Facing,
    /// Clockwise angle the sensor image must be rotated to be upright
    pub orientation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusMode {
    Auto,
    ContinuousPicture,
    Fixed,
    Infinity,
    Macro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PictureFormat {
    Jpeg,
    Nv21,
    Raw,
}

/// Snapshot of a handle's settings together with what the hardware supports
#[derive(Debug, Clone, PartialEq)]
pub struct CameraParameters {
    pub supported_preview_sizes: Vec<Size>,
    pub supported_picture_sizes: Vec<Size>,
    pub supported_focus_modes: Vec<FocusMode>,
    pub preview_size: Option<Size>,
    pub picture_size: Option<Size>,
    pub picture_format: PictureFormat,
    pub jpeg_quality: u8,
    pub focus_mode: Option<FocusMode>,
}

impl CameraParameters {
    pub fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        self.supported_focus_modes.contains(&mode)
    }
}

/// Invoked once with the autofocus result, from whatever thread the hardware uses
pub type FocusCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Capability query collaborator: enumerates and opens camera devices
pub trait CameraProvider: Send + Sync {
    /// Number of cameras currently attached
    fn camera_count(&self) -> usize;

    fn camera_info(&self, id: CameraId) -> Result<CameraInfo, CameraError>;

    /// Whether an administrator policy disables camera use
    fn is_disabled_by_policy(&self) -> bool {
        false
    }

    fn open(&self, id: CameraId) -> Result<Box<dyn CameraHandle>, CameraError>;
}

/// A live, exclusively owned connection to one camera device
pub trait CameraHandle: Send {
    fn id(&self) -> CameraId;

    fn parameters(&self) -> Result<CameraParameters, CameraError>;

    fn set_parameters(&mut self, parameters: &CameraParameters) -> Result<(), CameraError>;

    fn set_display_orientation(&mut self, degrees: u32) -> Result<(), CameraError>;

    fn set_preview_surface(&mut self, surface: SurfaceHandle) -> Result<(), CameraError>;

    fn start_preview(&mut self) -> Result<(), CameraError>;

    /// Start one focus pass. Returns immediately; `on_done` fires later.
    fn auto_focus(&mut self, on_done: FocusCallback) -> Result<(), CameraError>;

    /// Capture a single still and return its encoded bytes
    fn take_picture(&mut self) -> Result<Vec<u8>, CameraError>;

    fn release(self: Box<Self>);
}

/// The caller's view of the display the preview is shown on
pub trait DisplayContext: Send + Sync {
    fn rotation(&self) -> Rotation;

    fn is_portrait(&self) -> bool;
}

/// Display context with settable values, for callers that track rotation themselves
#[derive(Debug, Default)]
pub struct FixedDisplay {
    state: RwLock<(Rotation, bool)>,
}

impl FixedDisplay {
    pub fn new(rotation: Rotation, portrait: bool) -> Self {
        Self {
            state: RwLock::new((rotation, portrait)),
        }
    }

    pub fn set_rotation(&self, rotation: Rotation) {
        self.state.write().0 = rotation;
    }

    pub fn set_portrait(&self, portrait: bool) {
        self.state.write().1 = portrait;
    }
}

impl DisplayContext for FixedDisplay {
    fn rotation(&self) -> Rotation {
        self.state.read().0
    }

    fn is_portrait(&self) -> bool {
        self.state.read().1
    }
}
