//! Photometry service: light curve retrieval
//!
//! [`DirectoryPhotometry`] reads series files laid out as
//! `<data_dir>/<mission>/<target>[_s<sector>].json` and returns them cleaned
//! and normalized. [`StaticPhotometry`] serves series held in memory.

use crate::types::LightCurveSeries;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Default sigma-clipping threshold
pub const DEFAULT_CLIP_SIGMA: f64 = 3.0;

/// Missions with light curve products
const SUPPORTED_MISSIONS: [&str; 3] = ["tess", "kepler", "k2"];

#[derive(Debug, Error)]
pub enum PhotometryError {
    #[error("Light curve read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Light curve file {path} is invalid: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Light curve retrieval; `Ok(None)` when no observation exists
#[async_trait]
pub trait PhotometryService: Send + Sync {
    async fn fetch(
        &self,
        target: &str,
        mission: &str,
        sector: Option<u32>,
    ) -> Result<Option<LightCurveSeries>, PhotometryError>;
}

/// File-name-safe form of a target name
fn file_stem(target: &str) -> String {
    target
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Light curves stored as JSON files on disk
pub struct DirectoryPhotometry {
    root: PathBuf,
    clip_sigma: f64,
}

impl DirectoryPhotometry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clip_sigma: DEFAULT_CLIP_SIGMA,
        }
    }

    pub fn with_clip_sigma(mut self, clip_sigma: f64) -> Self {
        self.clip_sigma = clip_sigma;
        self
    }

    /// Location of a series file
    pub fn series_path(&self, target: &str, mission: &str, sector: Option<u32>) -> PathBuf {
        let stem = file_stem(target);
        let file = match sector {
            Some(sector) => format!("{}_s{}.json", stem, sector),
            None => format!("{}.json", stem),
        };
        self.root.join(mission.to_lowercase()).join(file)
    }
}

#[async_trait]
impl PhotometryService for DirectoryPhotometry {
    async fn fetch(
        &self,
        target: &str,
        mission: &str,
        sector: Option<u32>,
    ) -> Result<Option<LightCurveSeries>, PhotometryError> {
        let mission_key = mission.to_lowercase();
        if !SUPPORTED_MISSIONS.contains(&mission_key.as_str()) {
            debug!(mission = %mission, "Unsupported mission, no light curve");
            return Ok(None);
        }

        let path = self.series_path(target, mission, sector);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No light curve file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut series: LightCurveSeries =
            serde_json::from_str(&content).map_err(|e| PhotometryError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
        if series.target_name.is_empty() {
            series.target_name = target.to_string();
        }
        if series.sector.is_none() {
            series.sector = sector;
        }

        let cleaned = series.cleaned(self.clip_sigma);
        if cleaned.is_empty() {
            info!(path = %path.display(), "Light curve has no usable samples");
            return Ok(None);
        }

        debug!(
            target_name = %target,
            samples = cleaned.length,
            dropped = series.time.len() - cleaned.length,
            "Light curve loaded"
        );
        Ok(Some(cleaned))
    }
}

/// Series held in memory, keyed by mission and target (case-insensitive)
#[derive(Debug, Clone, Default)]
pub struct StaticPhotometry {
    series: HashMap<(String, String), LightCurveSeries>,
}

impl StaticPhotometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series under its own mission and target name
    pub fn with_series(mut self, series: LightCurveSeries) -> Self {
        let key = (series.mission.to_lowercase(), series.target_name.to_lowercase());
        self.series.insert(key, series);
        self
    }
}

#[async_trait]
impl PhotometryService for StaticPhotometry {
    async fn fetch(
        &self,
        target: &str,
        mission: &str,
        _sector: Option<u32>,
    ) -> Result<Option<LightCurveSeries>, PhotometryError> {
        let key = (mission.to_lowercase(), target.trim().to_lowercase());
        Ok(self.series.get(&key).cloned())
    }
}
