mod interface;
mod simulated;

pub use interface::{
    CameraHandle, CameraId, CameraInfo, CameraParameters, CameraProvider, DisplayContext,
    FixedDisplay, FocusCallback, FocusMode, PictureFormat, SurfaceHandle, DEFAULT_CAMERA_ID,
    NO_CAMERA,
};
pub use simulated::{HardwareEvent, SimulatedCameraProvider, SimulatedCameraSpec, SimulatedOp};
