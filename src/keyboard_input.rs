use crate::error::Result;
use crate::hardware::{CameraId, SurfaceHandle};
use crate::session::DeviceProxy;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press asks the camera session to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Capture,
    Focus,
    SwitchCamera,
    Quit,
}

impl KeyAction {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char('c') | KeyCode::Char(' ') => Some(KeyAction::Capture),
            KeyCode::Char('f') => Some(KeyAction::Focus),
            KeyCode::Char('s') => Some(KeyAction::SwitchCamera),
            KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
            _ => None,
        }
    }
}

/// Keyboard driver for a camera session, used by the interactive demo
pub struct KeyboardInputHandler {
    proxy: DeviceProxy,
    surface: SurfaceHandle,
    camera_id: CameraId,
    camera_count: usize,
    shutdown: CancellationToken,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    /// `camera_id` is the camera already previewing on `surface`.
    /// `shutdown` is cancelled when the user presses the quit key.
    pub fn new(
        proxy: DeviceProxy,
        surface: SurfaceHandle,
        camera_id: CameraId,
        camera_count: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            proxy,
            surface,
            camera_id,
            camera_count,
            shutdown,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input: c=capture f=focus s=switch camera q=quit");

        let proxy = self.proxy.clone();
        let surface = self.surface;
        let mut camera_id = self.camera_id;
        let camera_count = self.camera_count;
        let shutdown = self.shutdown.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match KeyAction::from_key(key_event.code) {
                            Some(KeyAction::Quit) => {
                                info!("Quit key pressed - requesting shutdown");
                                shutdown.cancel();
                                break;
                            }
                            Some(action) => {
                                camera_id =
                                    apply_action(&proxy, action, surface, camera_id, camera_count);
                            }
                            None => debug!("Key pressed: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // give the blocking task a poll interval to restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        if let Err(e) = disable_raw_mode() {
            error!("Failed to disable raw mode: {}", e);
        }

        Ok(())
    }
}

/// Run one non-quit action against the session. Returns the camera now selected.
pub fn apply_action(
    proxy: &DeviceProxy,
    action: KeyAction,
    surface: SurfaceHandle,
    camera_id: CameraId,
    camera_count: usize,
) -> CameraId {
    match action {
        KeyAction::Capture => {
            let queued = proxy.take_picture(|result| match result {
                Ok(picture) => info!("Saved {}", picture.path.display()),
                Err(e) => warn!("Capture failed: {}", e),
            });
            if !queued {
                info!("Capture not queued (camera closed or busy)");
            }
            camera_id
        }
        KeyAction::Focus => {
            if !proxy.set_auto_focus() {
                info!("Auto focus not queued: camera closed");
            }
            camera_id
        }
        KeyAction::SwitchCamera => {
            let count = CameraId::try_from(camera_count.max(1)).unwrap_or(1);
            let next = (camera_id + 1).rem_euclid(count);
            info!("Switching to camera {}", next);
            proxy.start_preview_with(surface, next);
            next
        }
        KeyAction::Quit => camera_id,
    }
}
