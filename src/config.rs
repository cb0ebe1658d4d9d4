use crate::assets::AssetSources;
use crate::environment::PrefilterSettings;
use crate::render::{CameraSettings, OrbitSettings, RendererSettings};
use crate::scene::{DirectionalLight, MaterialSettings, SphereGeometry};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "GLOBE_VIEWER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "globe-viewer.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Globe Viewer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Every tunable of the viewer. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowSettings,
    pub assets: AssetSources,
    pub camera: CameraSettings,
    pub light: DirectionalLight,
    pub material: MaterialSettings,
    pub sphere: SphereGeometry,
    pub orbit: OrbitSettings,
    pub renderer: RendererSettings,
    pub environment: PrefilterSettings,
}

impl ViewerConfig {
    /// Read a config file; relative asset paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: ViewerConfig =
            serde_json::from_str(&json).map_err(|source| ConfigError::Json {
                path: path.display().to_string(),
                source,
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.assets = config.assets.resolved_against(base);
        Ok(config)
    }

    /// Resolve the config from the environment: an explicit path, the default
    /// file in the working directory, or built-in defaults.
    pub fn from_env() -> Result<Self> {
        let explicit = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        Self::discover(explicit.as_deref(), Path::new("."))
    }

    fn discover(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            log::info!("Loading config from {}", path.display());
            return Self::load(path);
        }
        let default_path = working_dir.join(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            log::info!("Loading config from {}", default_path.display());
            return Self::load(&default_path);
        }
        log::info!("No {DEFAULT_CONFIG_FILE} found; using built-in defaults");
        let mut config = Self::default();
        config.assets = config.assets.resolved_against(working_dir);
        Ok(config)
    }
}
