//! Configuration for SatMesh
//!
//! Configuration is a single TOML file with one table per concern:
//!
//! ```toml
//! [engine]
//! worker_count = 8
//! proximity_threshold_km = 1000.0
//! graph_rebuild_interval_frames = 1
//!
//! [path]
//! iteration_cap = 10000
//! include_start_node = false
//!
//! [logging]
//! filter = "info,satmesh_rs=debug"
//!
//! [demo]
//! frames = 120
//! ```
//!
//! Every field has a default, so a partial (or missing) file is valid.
//!
//! # Config Location
//!
//! The default file lives in the platform configuration directory:
//! - **Linux**: `~/.config/satmesh-rs/satmesh.toml`
//! - **macOS**: `~/Library/Application Support/satmesh-rs/satmesh.toml`
//! - **Windows**: `%APPDATA%\satmesh-rs\satmesh.toml`

use crate::error::{Result, SatMeshError};
use crate::orbit::WalkerShell;
use crate::pathfinder::DEFAULT_ITERATION_CAP;
use crate::types::GeoCoords;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "satmesh-rs";

/// Config filename
pub const CONFIG_FILE: &str = "satmesh.toml";

/// Upper bound for the default worker count
pub const MAX_DEFAULT_WORKERS: usize = 16;

/// Default proximity threshold in km
pub const DEFAULT_PROXIMITY_THRESHOLD_KM: f64 = 1000.0;

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info,satmesh_rs=debug";

/// Path of the default config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

// ==================== Engine ====================

/// Compute pool and graph settings
///
/// `worker_count` is read once when the engine is created; changing it
/// later has no effect on a running engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Compute units per coordinator
    pub worker_count: usize,

    /// Entities closer than this (km) are linked
    pub proximity_threshold_km: f64,

    /// Frames between graph completion checks
    pub graph_rebuild_interval_frames: u32,
}

/// Available parallelism, clamped to `1..=MAX_DEFAULT_WORKERS`
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_DEFAULT_WORKERS)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            proximity_threshold_km: DEFAULT_PROXIMITY_THRESHOLD_KM,
            graph_rebuild_interval_frames: 1,
        }
    }
}

// ==================== Path ====================

/// Route search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Maximum node expansions per search
    pub iteration_cap: usize,

    /// Begin routes with the start node
    pub include_start_node: bool,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            iteration_cap: DEFAULT_ITERATION_CAP,
            include_start_node: false,
        }
    }
}

// ==================== Logging ====================

/// Tracing output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,

    /// Directory for daily rolling log files; console only when unset
    pub file_dir: Option<PathBuf>,

    /// Prefix for log file names
    pub file_prefix: String,

    /// Use ANSI colors on the console
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            file_dir: None,
            file_prefix: "satmesh.log".to_string(),
            ansi: true,
        }
    }
}

// ==================== Demo ====================

/// Settings for the headless demo binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Constellation shell to simulate
    pub shell: WalkerShell,

    /// Frames to run
    pub frames: u32,

    /// Simulated seconds per frame
    pub seconds_per_frame: f64,

    /// Wall-clock pause between frames in milliseconds
    pub frame_sleep_ms: u64,

    /// Route start point
    pub route_start: GeoCoords,

    /// Route goal point
    pub route_goal: GeoCoords,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            shell: WalkerShell {
                total: 720,
                planes: 36,
                phasing: 1.0,
                altitude_km: 550.0,
                inclination_deg: 53.0,
            },
            frames: 120,
            seconds_per_frame: 10.0,
            frame_sleep_ms: 16,
            // Berlin to San Francisco
            route_start: GeoCoords::surface(52.52, 13.405),
            route_goal: GeoCoords::surface(37.7749, -122.4194),
        }
    }
}

// ==================== App Config ====================

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub path: PathConfig,
    pub logging: LoggingConfig,
    pub demo: DemoConfig,
}

impl AppConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SatMeshError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            SatMeshError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }

        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("{}; using defaults", e);
            Self::default()
        })
    }

    /// Write the config as TOML, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SatMeshError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SatMeshError::Serialization(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| {
            SatMeshError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.worker_count == 0 {
            return Err(SatMeshError::Config(
                "engine.worker_count must be at least 1".to_string(),
            ));
        }
        if !(self.engine.proximity_threshold_km.is_finite()
            && self.engine.proximity_threshold_km > 0.0)
        {
            return Err(SatMeshError::Config(format!(
                "engine.proximity_threshold_km must be positive, got {}",
                self.engine.proximity_threshold_km
            )));
        }
        if self.engine.graph_rebuild_interval_frames == 0 {
            return Err(SatMeshError::Config(
                "engine.graph_rebuild_interval_frames must be at least 1".to_string(),
            ));
        }
        if self.path.iteration_cap == 0 {
            return Err(SatMeshError::Config(
                "path.iteration_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
