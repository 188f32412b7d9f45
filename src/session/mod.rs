mod command;
mod handlers;
mod manager;
mod proxy;
mod state;
mod worker;
#[cfg(test)]
mod tests;

pub use command::{CaptureResult, CapturedPicture, Command, CommandKind, PictureCallback};
pub use manager::SessionManager;
pub use proxy::{DeviceProxy, SurfaceCallback};
pub use state::{SessionShared, SessionSnapshot, SessionStats};
