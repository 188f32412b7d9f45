pub mod config;
pub mod error;
pub mod hardware;
pub mod keyboard_input;
pub mod orientation;
pub mod session;
pub mod size;
pub mod storage;

pub use config::CamsessionConfig;
pub use error::{CameraError, CaptureError, Result, SessionError, StorageError};
pub use hardware::{CameraHandle, CameraProvider, DisplayContext, SurfaceHandle};
pub use orientation::{Facing, Rotation, ScreenOrientation};
pub use session::{
    CaptureResult, CapturedPicture, DeviceProxy, SessionManager, SessionSnapshot, SessionStats,
    SurfaceCallback,
};
pub use size::Size;
pub use storage::{DirectoryStorage, MediaRecord, RecordRef, StorageGateway};
