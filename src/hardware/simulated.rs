use super::interface::{
    CameraHandle, CameraId, CameraInfo, CameraParameters, CameraProvider, FocusCallback,
    FocusMode, PictureFormat, SurfaceHandle,
};
use crate::config::SimulatorConfig;
use crate::error::CameraError;
use crate::orientation::Facing;
use crate::size::Size;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Description of one simulated sensor
#[derive(Debug, Clone)]
pub struct SimulatedCameraSpec {
    pub facing: Facing,
    pub orientation: u32,
    pub preview_sizes: Vec<Size>,
    pub picture_sizes: Vec<Size>,
    pub focus_modes: Vec<FocusMode>,
}

impl SimulatedCameraSpec {
    pub fn back(orientation: u32) -> Self {
        Self {
            facing: Facing::Back,
            orientation,
            preview_sizes: vec![
                Size::new(1920, 1080),
                Size::new(1280, 720),
                Size::new(640, 480),
                Size::new(320, 240),
            ],
            picture_sizes: vec![
                Size::new(4032, 3024),
                Size::new(1920, 1080),
                Size::new(1280, 720),
            ],
            focus_modes: vec![FocusMode::Auto, FocusMode::ContinuousPicture],
        }
    }

    pub fn front(orientation: u32) -> Self {
        Self {
            facing: Facing::Front,
            orientation,
            preview_sizes: vec![Size::new(1280, 720), Size::new(640, 480)],
            picture_sizes: vec![Size::new(2560, 1440), Size::new(1280, 720)],
            focus_modes: vec![FocusMode::Fixed],
        }
    }
}

/// Hardware operations that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedOp {
    Open,
    SetParameters,
    StartPreview,
    AutoFocus,
    TakePicture,
}

/// Every observable hardware call, in the order the hardware saw it
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareEvent {
    Opened(CameraId),
    Released(CameraId),
    ParametersApplied {
        id: CameraId,
        preview_size: Option<Size>,
        picture_size: Option<Size>,
        picture_format: PictureFormat,
        jpeg_quality: u8,
        focus_mode: Option<FocusMode>,
    },
    DisplayOrientation { id: CameraId, degrees: u32 },
    SurfaceBound { id: CameraId, surface: SurfaceHandle },
    PreviewStarted(CameraId),
    AutoFocusRequested(CameraId),
    PictureTaken { id: CameraId, bytes: usize },
}

struct SimulatorState {
    cameras: Vec<SimulatedCameraSpec>,
    events: Mutex<Vec<HardwareEvent>>,
    pending_failures: Mutex<HashSet<SimulatedOp>>,
    unavailable: Mutex<HashSet<CameraId>>,
    open_handles: AtomicUsize,
    max_open_handles: AtomicUsize,
    disabled_by_policy: AtomicBool,
    focus_succeeds: AtomicBool,
    capture_delay: Mutex<Duration>,
    picture_bytes: usize,
}

impl SimulatorState {
    fn record(&self, event: HardwareEvent) {
        trace!("Simulated hardware event: {:?}", event);
        self.events.lock().push(event);
    }

    fn check_failure(&self, op: SimulatedOp) -> Result<(), CameraError> {
        if self.pending_failures.lock().remove(&op) {
            debug!("Injecting simulated failure for {:?}", op);
            Err(CameraError::hardware(format!("{:?}", op), "simulated failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// In-process camera provider used by the demo binary and by tests
#[derive(Clone)]
pub struct SimulatedCameraProvider {
    state: Arc<SimulatorState>,
}

impl SimulatedCameraProvider {
    pub fn new(cameras: Vec<SimulatedCameraSpec>) -> Self {
        Self::with_picture_bytes(cameras, 4096)
    }

    pub fn with_picture_bytes(cameras: Vec<SimulatedCameraSpec>, picture_bytes: usize) -> Self {
        Self {
            state: Arc::new(SimulatorState {
                cameras,
                events: Mutex::new(Vec::new()),
                pending_failures: Mutex::new(HashSet::new()),
                unavailable: Mutex::new(HashSet::new()),
                open_handles: AtomicUsize::new(0),
                max_open_handles: AtomicUsize::new(0),
                disabled_by_policy: AtomicBool::new(false),
                focus_succeeds: AtomicBool::new(true),
                capture_delay: Mutex::new(Duration::ZERO),
                picture_bytes,
            }),
        }
    }

    /// Rear camera at index 0, optional front camera at index 1
    pub fn from_config(config: &SimulatorConfig) -> Self {
        let mut cameras = Vec::new();
        for index in 0..config.camera_count {
            if index % 2 == 0 {
                cameras.push(SimulatedCameraSpec::back(config.back_mount_degrees));
            } else {
                cameras.push(SimulatedCameraSpec::front(config.front_mount_degrees));
            }
        }
        Self::with_picture_bytes(cameras, config.picture_bytes)
    }

    /// Make the next call of `op` fail
    pub fn fail_next(&self, op: SimulatedOp) {
        self.state.pending_failures.lock().insert(op);
    }

    /// Make `open` return "unavailable" for a camera until cleared
    pub fn set_unavailable(&self, id: CameraId, unavailable: bool) {
        let mut set = self.state.unavailable.lock();
        if unavailable {
            set.insert(id);
        } else {
            set.remove(&id);
        }
    }

    pub fn set_disabled_by_policy(&self, disabled: bool) {
        self.state.disabled_by_policy.store(disabled, Ordering::SeqCst);
    }

    pub fn set_focus_succeeds(&self, succeeds: bool) {
        self.state.focus_succeeds.store(succeeds, Ordering::SeqCst);
    }

    /// Hold each capture for `delay` before the bytes are delivered
    pub fn set_capture_delay(&self, delay: Duration) {
        *self.state.capture_delay.lock() = delay;
    }

    pub fn events(&self) -> Vec<HardwareEvent> {
        self.state.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.state.events.lock().clear();
    }

    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open handles ever observed
    pub fn max_open_handles(&self) -> usize {
        self.state.max_open_handles.load(Ordering::SeqCst)
    }

    fn spec(&self, id: CameraId) -> Result<&SimulatedCameraSpec, CameraError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.state.cameras.get(index))
            .ok_or(CameraError::NoSuchCamera { id })
    }
}

impl CameraProvider for SimulatedCameraProvider {
    fn camera_count(&self) -> usize {
        self.state.cameras.len()
    }

    fn camera_info(&self, id: CameraId) -> Result<CameraInfo, CameraError> {
        let spec = self.spec(id)?;
        Ok(CameraInfo {
            facing: spec.facing,
            orientation: spec.orientation,
        })
    }

    fn is_disabled_by_policy(&self) -> bool {
        self.state.disabled_by_policy.load(Ordering::SeqCst)
    }

    fn open(&self, id: CameraId) -> Result<Box<dyn CameraHandle>, CameraError> {
        let spec = self.spec(id)?.clone();
        if self.state.unavailable.lock().contains(&id) {
            return Err(CameraError::Unavailable { id });
        }
        self.state.check_failure(SimulatedOp::Open)?;

        let open = self.state.open_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open_handles.fetch_max(open, Ordering::SeqCst);
        self.state.record(HardwareEvent::Opened(id));

        let parameters = CameraParameters {
            preview_size: spec.preview_sizes.first().copied(),
            picture_size: spec.picture_sizes.first().copied(),
            supported_preview_sizes: spec.preview_sizes,
            supported_picture_sizes: spec.picture_sizes,
            supported_focus_modes: spec.focus_modes,
            picture_format: PictureFormat::Nv21,
            jpeg_quality: 85,
            focus_mode: None,
        };

        Ok(Box::new(SimulatedCameraHandle {
            id,
            parameters,
            surface: None,
            previewing: false,
            state: Arc::clone(&self.state),
        }))
    }
}

struct SimulatedCameraHandle {
    id: CameraId,
    parameters: CameraParameters,
    surface: Option<SurfaceHandle>,
    previewing: bool,
    state: Arc<SimulatorState>,
}

impl SimulatedCameraHandle {
    /// Minimal JPEG-framed payload of the configured length
    fn synthesize_picture(&self) -> Vec<u8> {
        let mut data = vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01,
            0x00, 0x48, 0x00, 0x48, 0x00, 0x00,
        ];
        let filler = self.state.picture_bytes.saturating_sub(data.len() + 2);
        data.extend(std::iter::repeat((self.id & 0xFF) as u8).take(filler));
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }
}

impl CameraHandle for SimulatedCameraHandle {
    fn id(&self) -> CameraId {
        self.id
    }

    fn parameters(&self) -> Result<CameraParameters, CameraError> {
        Ok(self.parameters.clone())
    }

    fn set_parameters(&mut self, parameters: &CameraParameters) -> Result<(), CameraError> {
        self.state.check_failure(SimulatedOp::SetParameters)?;

        if let Some(mode) = parameters.focus_mode {
            if !self.parameters.supports_focus_mode(mode) {
                return Err(CameraError::hardware(
                    "setParameters".to_string(),
                    format!("focus mode {:?} not supported", mode),
                ));
            }
        }

        self.parameters = parameters.clone();
        self.state.record(HardwareEvent::ParametersApplied {
            id: self.id,
            preview_size: parameters.preview_size,
            picture_size: parameters.picture_size,
            picture_format: parameters.picture_format,
            jpeg_quality: parameters.jpeg_quality,
            focus_mode: parameters.focus_mode,
        });
        Ok(())
    }

    fn set_display_orientation(&mut self, degrees: u32) -> Result<(), CameraError> {
        self.state.record(HardwareEvent::DisplayOrientation {
            id: self.id,
            degrees,
        });
        Ok(())
    }

    fn set_preview_surface(&mut self, surface: SurfaceHandle) -> Result<(), CameraError> {
        self.surface = Some(surface);
        self.state.record(HardwareEvent::SurfaceBound {
            id: self.id,
            surface,
        });
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), CameraError> {
        self.state.check_failure(SimulatedOp::StartPreview)?;
        if self.surface.is_none() {
            return Err(CameraError::hardware(
                "startPreview",
                "no preview surface bound",
            ));
        }

        self.previewing = true;
        self.state.record(HardwareEvent::PreviewStarted(self.id));
        Ok(())
    }

    fn auto_focus(&mut self, on_done: FocusCallback) -> Result<(), CameraError> {
        self.state.check_failure(SimulatedOp::AutoFocus)?;
        self.state.record(HardwareEvent::AutoFocusRequested(self.id));

        // focus results arrive on a hardware thread, never on the caller's
        let success = self.previewing && self.state.focus_succeeds.load(Ordering::SeqCst);
        std::thread::spawn(move || on_done(success));
        Ok(())
    }

    fn take_picture(&mut self) -> Result<Vec<u8>, CameraError> {
        if !self.previewing {
            return Err(CameraError::hardware("takePicture", "preview not started"));
        }

        let delay = *self.state.capture_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.state.check_failure(SimulatedOp::TakePicture)?;

        let data = self.synthesize_picture();
        self.state.record(HardwareEvent::PictureTaken {
            id: self.id,
            bytes: data.len(),
        });
        Ok(data)
    }

    fn release(self: Box<Self>) {
        self.state.open_handles.fetch_sub(1, Ordering::SeqCst);
        self.state.record(HardwareEvent::Released(self.id));
    }
}
