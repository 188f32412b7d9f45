use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CamsessionConfig {
    pub camera: CameraConfig,
    pub storage: StorageConfig,
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Camera id used when a caller does not pick one (0 = rear)
    #[serde(default = "default_camera_id")]
    pub default_id: i32,

    /// JPEG quality forced on every opened camera (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Run one autofocus pass as soon as the preview starts
    #[serde(default = "default_auto_focus_on_start")]
    pub auto_focus_on_start: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Directory captured pictures are written to
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// Media index file name, relative to `path`
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// File extension for captured pictures
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Number of simulated cameras (even ids face back, odd ids face front)
    #[serde(default = "default_camera_count")]
    pub camera_count: usize,

    /// Sensor mount angle of back-facing cameras
    #[serde(default = "default_back_mount_degrees")]
    pub back_mount_degrees: u32,

    /// Sensor mount angle of front-facing cameras
    #[serde(default = "default_front_mount_degrees")]
    pub front_mount_degrees: u32,

    /// Size of each synthesized picture in bytes
    #[serde(default = "default_picture_bytes")]
    pub picture_bytes: usize,
}

impl CamsessionConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("camsession.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.default_id", default_camera_id())?
            .set_default("camera.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("camera.auto_focus_on_start", default_auto_focus_on_start())?
            .set_default("storage.path", default_storage_path())?
            .set_default("storage.index_file", default_index_file())?
            .set_default("storage.extension", default_extension())?
            .set_default("simulator.camera_count", default_camera_count() as i64)?
            .set_default("simulator.back_mount_degrees", default_back_mount_degrees())?
            .set_default("simulator.front_mount_degrees", default_front_mount_degrees())?
            .set_default("simulator.picture_bytes", default_picture_bytes() as i64)?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Environment variables use a double underscore between section and key
            .add_source(Environment::with_prefix("CAMSESSION").separator("__"))
            .build()?;

        let config: CamsessionConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.default_id < 0 {
            return Err(ConfigError::Message(
                "Default camera id must not be negative".to_string(),
            ));
        }

        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        if self.storage.path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage path must not be empty".to_string(),
            ));
        }

        if self.storage.index_file.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage index file must not be empty".to_string(),
            ));
        }

        if self.storage.extension.trim().is_empty() || self.storage.extension.contains('.') {
            return Err(ConfigError::Message(
                "Storage extension must be non-empty and given without a dot".to_string(),
            ));
        }

        for (name, degrees) in [
            ("back_mount_degrees", self.simulator.back_mount_degrees),
            ("front_mount_degrees", self.simulator.front_mount_degrees),
        ] {
            if degrees % 90 != 0 || degrees >= 360 {
                return Err(ConfigError::Message(format!(
                    "Simulator {} must be one of 0, 90, 180, 270",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for CamsessionConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                default_id: default_camera_id(),
                jpeg_quality: default_jpeg_quality(),
                auto_focus_on_start: default_auto_focus_on_start(),
            },
            storage: StorageConfig {
                path: default_storage_path(),
                index_file: default_index_file(),
                extension: default_extension(),
            },
            simulator: SimulatorConfig {
                camera_count: default_camera_count(),
                back_mount_degrees: default_back_mount_degrees(),
                front_mount_degrees: default_front_mount_degrees(),
                picture_bytes: default_picture_bytes(),
            },
        }
    }
}

// Default value functions
fn default_camera_id() -> i32 {
    0
}
fn default_jpeg_quality() -> u8 {
    100
}
fn default_auto_focus_on_start() -> bool {
    true
}

fn default_storage_path() -> String {
    "./DCIM/Camera".to_string()
}
fn default_index_file() -> String {
    "media_index.json".to_string()
}
fn default_extension() -> String {
    "jpeg".to_string()
}

fn default_camera_count() -> usize {
    2
}
fn default_back_mount_degrees() -> u32 {
    90
}
fn default_front_mount_degrees() -> u32 {
    270
}
fn default_picture_bytes() -> usize {
    64 * 1024
}
