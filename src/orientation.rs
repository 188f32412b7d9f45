use crate::error::CameraError;
use crate::hardware::{CameraId, CameraProvider};
use serde::{Deserialize, Serialize};

/// Device rotation relative to its natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Rotate0,
    /// Rotate 90 degrees clockwise
    Rotate90,
    /// Rotate 180 degrees
    Rotate180,
    /// Rotate 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl Rotation {
    /// Get rotation angle in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Rotate0 => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Quantize an arbitrary angle to the nearest quarter turn
    pub fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        match ((normalized + 45) / 90) % 4 {
            0 => Rotation::Rotate0,
            1 => Rotation::Rotate90,
            2 => Rotation::Rotate180,
            _ => Rotation::Rotate270,
        }
    }
}

/// Which way a camera sensor faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Back,
    Front,
}

/// Coarse screen orientation derived from a sensor angle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOrientation {
    Undefined,
    Portrait,
    Landscape,
}

impl ScreenOrientation {
    /// Classify an orientation-sensor angle. Negative angles mean "unknown".
    pub fn from_degrees(degrees: i32) -> Self {
        if degrees < 0 {
            return ScreenOrientation::Undefined;
        }

        let angle = degrees % 360;
        if (0..=45).contains(&angle) || (135..=225).contains(&angle) || (315..=360).contains(&angle)
        {
            ScreenOrientation::Portrait
        } else {
            ScreenOrientation::Landscape
        }
    }
}

/// Rotation to apply to the preview stream so it appears upright on screen.
///
/// Front sensors are mirrored, so their compensation runs the other way.
pub fn display_orientation(device: Rotation, sensor_mount_degrees: u32, facing: Facing) -> u32 {
    let device = device.degrees();
    let mount = sensor_mount_degrees % 360;

    match facing {
        Facing::Front => (360 - ((mount + device) % 360)) % 360,
        Facing::Back => (mount + 360 - device) % 360,
    }
}

/// Orientation recorded with a captured picture: the sensor's fixed mount angle.
pub fn capture_orientation(
    provider: &dyn CameraProvider,
    camera_id: CameraId,
) -> Result<u32, CameraError> {
    Ok(provider.camera_info(camera_id)?.orientation)
}
