//! Configuration loading and resolution
//!
//! Configuration is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is never fatal: a warning is logged and compiled
//! defaults are used. A config file that exists but cannot be parsed, or whose
//! thresholds are inconsistent, is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "EXOSEER_CONFIG";

/// Environment variable overriding the HTTP port
pub const PORT_ENV_VAR: &str = "EXOSEER_PORT";

/// Environment variable carrying the advisor API key
pub const ADVISOR_KEY_ENV_VAR: &str = "EXOSEER_ADVISOR_API_KEY";

/// Default HTTP port for exoseer-vet
pub const DEFAULT_PORT: u16 = 5780;

/// Complete TOML configuration
///
/// Every section is optional in the file; absent sections take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub advisor: AdvisorConfig,
    pub catalog: CatalogConfig,
    pub photometry: PhotometryConfig,
    pub centroid: CentroidConfig,
    pub thresholds: Thresholds,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is not set (e.g. "info", "debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// External qualitative model (advisor) settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Whether the advisor is consulted at all
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Upper bound for a single advisor call
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com".to_string(),
            model: "gpt-4".to_string(),
            api_key: None,
            timeout_secs: 30,
            temperature: 0.3,
        }
    }
}

impl AdvisorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Catalog (exoplanet archive) settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// TAP service root; queries go to `{tap_url}/sync`
    pub tap_url: String,
    /// MAST exo service root, used for TESS data validation lookups by TIC id
    pub mast_url: String,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            tap_url: "https://exoplanetarchive.ipac.caltech.edu/TAP".to_string(),
            mast_url: "https://exo.mast.stsci.edu".to_string(),
            timeout_secs: 30,
        }
    }
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Photometry (light curve store) settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhotometryConfig {
    /// Directory holding light curve JSON files; platform default when absent
    pub data_dir: Option<PathBuf>,
    /// Sigma-clipping threshold applied when serving a light curve
    pub clip_sigma: Option<f64>,
}

impl PhotometryConfig {
    /// Resolved data directory
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Centroid estimator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CentroidConfig {
    /// Fixed RNG seed for the simulated estimator (entropy-seeded when absent)
    pub seed: Option<u64>,
}

// ============================================================================
// Thresholds
// ============================================================================

/// All tunable analysis thresholds, grouped by stage
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub fitter: FitterThresholds,
    pub physics: PhysicsThresholds,
    pub centroid: CentroidThresholds,
    pub reliability: ReliabilityThresholds,
}

/// Numeric transit fitter constants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FitterThresholds {
    /// Smallest depth reported when the period is known
    pub floor_depth: f64,
    /// Ceiling applied to the dispersion-based SNR
    pub snr_cap: f64,
    /// Duration as a fraction of the period when the period is known
    pub duration_fraction: f64,
    /// Period search grid (log-spaced, inclusive)
    pub min_period: f64,
    pub max_period: f64,
    pub period_steps: usize,
}

impl Default for FitterThresholds {
    fn default() -> Self {
        Self {
            floor_depth: 0.0005,
            snr_cap: 20.0,
            duration_fraction: 0.1,
            min_period: 0.5,
            max_period: 50.0,
            period_steps: 100,
        }
    }
}

/// Physics plausibility bounds and the flag-count confidence steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsThresholds {
    pub min_stellar_density: f64,
    pub max_stellar_density: f64,
    pub min_planet_radius: f64,
    pub max_planet_radius: f64,
    pub min_inclination: f64,
    pub max_inclination: f64,
    /// Confidence with no flags
    pub clean_confidence: f64,
    /// Confidence with one or two flags
    pub flagged_confidence: f64,
    /// Confidence with three or more flags
    pub suspect_confidence: f64,
}

impl Default for PhysicsThresholds {
    fn default() -> Self {
        Self {
            min_stellar_density: 0.1,
            max_stellar_density: 10.0,
            min_planet_radius: 0.1,
            max_planet_radius: 20.0,
            min_inclination: 70.0,
            max_inclination: 110.0,
            clean_confidence: 0.85,
            flagged_confidence: 0.65,
            suspect_confidence: 0.35,
        }
    }
}

/// Centroid motion flag limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CentroidThresholds {
    pub max_motion_correlation: f64,
    /// Significance in sigma above which a shift is flagged
    pub max_significance: f64,
    pub max_offset_mas: f64,
    /// Reference offset uncertainty used for significance (mas)
    pub reference_uncertainty_mas: f64,
}

impl Default for CentroidThresholds {
    fn default() -> Self {
        Self {
            max_motion_correlation: 0.3,
            max_significance: 3.0,
            max_offset_mas: 0.2,
            reference_uncertainty_mas: 0.02,
        }
    }
}

/// Reliability flag rules of the uncertainty quantifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReliabilityThresholds {
    pub min_snr: f64,
    pub max_motion_correlation: f64,
    pub max_depth: f64,
}

impl Default for ReliabilityThresholds {
    fn default() -> Self {
        Self {
            min_snr: 7.0,
            max_motion_correlation: 0.3,
            max_depth: 0.05,
        }
    }
}

impl Thresholds {
    /// Check internal consistency of all threshold groups
    pub fn validate(&self) -> Result<()> {
        let f = &self.fitter;
        if !(f.min_period > 0.0 && f.min_period < f.max_period) {
            return Err(Error::Config(format!(
                "fitter period grid must satisfy 0 < min_period < max_period (got {} .. {})",
                f.min_period, f.max_period
            )));
        }
        if f.period_steps < 2 {
            return Err(Error::Config(format!(
                "fitter period_steps must be at least 2 (got {})",
                f.period_steps
            )));
        }
        if !(f.floor_depth > 0.0 && f.floor_depth < 1.0) {
            return Err(Error::Config(format!(
                "fitter floor_depth must lie in (0, 1) (got {})",
                f.floor_depth
            )));
        }

        let p = &self.physics;
        ensure_range("physics stellar density", p.min_stellar_density, p.max_stellar_density)?;
        ensure_range("physics planet radius", p.min_planet_radius, p.max_planet_radius)?;
        ensure_range("physics inclination", p.min_inclination, p.max_inclination)?;
        if !(p.clean_confidence >= p.flagged_confidence && p.flagged_confidence >= p.suspect_confidence) {
            return Err(Error::Config(
                "physics confidence steps must be non-increasing in flag count".to_string(),
            ));
        }

        if self.centroid.reference_uncertainty_mas <= 0.0 {
            return Err(Error::Config(
                "centroid reference_uncertainty_mas must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn ensure_range(name: &str, min: f64, max: f64) -> Result<()> {
    if min < max {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} bounds must satisfy min < max (got {} .. {})",
            name, min, max
        )))
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolves and loads the configuration following the priority order
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Create resolver; `cli_path` is the `--config` argument if given
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file: CLI argument, then environment, then platform default
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        default_config_path()
    }

    /// Load configuration and apply environment overrides
    pub fn load(&self) -> Result<TomlConfig> {
        let mut config = match self.config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                load_config_file(&path)?
            }
            Some(path) => {
                warn!(
                    "Config file not found at {}, using compiled defaults",
                    path.display()
                );
                TomlConfig::default()
            }
            None => {
                warn!("No config directory available, using compiled defaults");
                TomlConfig::default()
            }
        };

        apply_env_overrides(&mut config)?;
        Ok(config)
    }
}

/// Parse a TOML config file and validate its thresholds
pub fn load_config_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.thresholds.validate()?;
    Ok(config)
}

/// Apply environment variable overrides on top of file values
fn apply_env_overrides(config: &mut TomlConfig) -> Result<()> {
    if let Ok(port) = std::env::var(PORT_ENV_VAR) {
        config.server.port = port.trim().parse().map_err(|_| {
            Error::Config(format!("{} is not a valid port: {:?}", PORT_ENV_VAR, port))
        })?;
    }

    if let Ok(key) = std::env::var(ADVISOR_KEY_ENV_VAR) {
        if !key.trim().is_empty() {
            config.advisor.api_key = Some(key.trim().to_string());
        }
    }

    Ok(())
}

/// Platform config file location (`~/.config/exoseer/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("exoseer").join("config.toml"))
}

/// Platform default light curve directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("exoseer").join("lightcurves"))
        .unwrap_or_else(|| PathBuf::from("./exoseer_data/lightcurves"))
}
