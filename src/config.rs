use config::{Config, ConfigError, Environment, File, FileFormat};
use lanesim_kinematics::Pose;
use lanesim_world::{RankingPolicy, TileKind};
use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const CONFIG_PATH_ENV: &str = "LANESIM_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub map: MapSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub robots: Vec<RobotSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapSettings {
    #[serde(default = "default_tile_size")]
    pub tile_size: f64,
    #[serde(default)]
    pub tiles: Vec<TileSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TileSettings {
    pub i: i32,
    pub j: i32,
    pub kind: TileKind,
    /// Counter-clockwise quarter turns.
    #[serde(default)]
    pub rotation: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingSettings {
    #[serde(default)]
    pub policy: RankingPolicy,
    /// Overrides the per-lane half width when set.
    pub lateral_tolerance: Option<f64>,
    /// Stick to the previously matched lane while it still matches.
    #[serde(default)]
    pub continuity: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RobotSettings {
    pub name: String,
    pub wheel_radius: f64,
    pub axle_length: f64,
    pub initial_pose: Pose,
    #[serde(default = "default_upsample")]
    pub upsample: usize,
    pub commands: Vec<CommandSettings>,
}

/// Wheel angular velocities (rad/s) held from `t` until the next command.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CommandSettings {
    pub t: f64,
    pub omega_l: f64,
    pub omega_r: f64,
}

fn default_tile_size() -> f64 {
    1.0
}

fn default_upsample() -> usize {
    1
}

/// Loads the settings from `config/default.toml` (or `$LANESIM_CONFIG`),
/// overridden by `LANESIM__`-prefixed environment variables.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(&path, FileFormat::Toml).required(true))
        .add_source(Environment::with_prefix("LANESIM").separator("__").try_parsing(true))
        .build()
        .and_then(|config| config.try_deserialize::<Settings>());

    match settings {
        Ok(settings) => {
            info!(
                tiles = settings.map.tiles.len(),
                robots = settings.robots.len(),
                policy = ?settings.matching.policy,
                "Successfully loaded configuration"
            );
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
pub(crate) fn settings_from_toml(source: &str) -> Result<Settings, ConfigError> {
    Config::builder()
        .add_source(File::from_str(source, FileFormat::Toml))
        .build()?
        .try_deserialize()
}
