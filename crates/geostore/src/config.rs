use std::path::Path;

use geostore_cell::DecodePolicy;
use geostore_geo::{PolylineStrategy, MAX_LEVEL};
use geostore_kv::LogKvConfig;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Behavior of radius queries when a covering cell has no record yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiusMode {
    /// Fail with `NotFound` on the first missing cell, returning nothing.
    Strict,
    /// Return the cells that exist and skip the rest.
    #[default]
    SkipMissing,
}

/// Configuration of a store instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Tessellation level every item is bucketed at. Fixed for the lifetime
    /// of the data: reopening with another level makes existing ids dangle.
    pub level: u8,
    pub polyline_strategy: PolylineStrategy,
    pub decode_policy: DecodePolicy,
    pub radius_mode: RadiusMode,
    /// Soft limit on covering size handed to the tessellation.
    pub max_cells: usize,
    /// Settings for the log-backed engine used by [`Store::open_path`](crate::Store::open_path).
    pub kv: LogKvConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            level: 10,
            polyline_strategy: PolylineStrategy::default(),
            decode_policy: DecodePolicy::default(),
            radius_mode: RadiusMode::default(),
            max_cells: 1024,
            kv: LogKvConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Default configuration at a given level.
    pub fn with_level(level: u8) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document. Missing fields take defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.level > MAX_LEVEL {
            return Err(StoreError::Config(format!(
                "level {} exceeds maximum {MAX_LEVEL}",
                self.level
            )));
        }
        if self.max_cells == 0 {
            return Err(StoreError::Config("max_cells must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geostore_kv::SyncMode;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.level, 10);
        assert_eq!(c.polyline_strategy, PolylineStrategy::VertexSampling);
        assert_eq!(c.decode_policy, DecodePolicy::Skip);
        assert_eq!(c.radius_mode, RadiusMode::SkipMissing);
        assert_eq!(c.max_cells, 1024);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c = StoreConfig::from_toml_str(
            r#"
            level = 5
            decode_policy = "reject"
            radius_mode = "strict"

            [kv]
            sync = "every_batch"
            "#,
        )
        .unwrap();
        assert_eq!(c.level, 5);
        assert_eq!(c.decode_policy, DecodePolicy::Reject);
        assert_eq!(c.radius_mode, RadiusMode::Strict);
        assert_eq!(c.kv.sync, SyncMode::EveryBatch);
        assert_eq!(c.max_cells, 1024);
    }

    #[test]
    fn toml_roundtrip() {
        let c = StoreConfig {
            polyline_strategy: PolylineStrategy::EdgeSampling,
            ..StoreConfig::with_level(12)
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            StoreConfig::from_toml_str("level = 31"),
            Err(StoreError::Config(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("max_cells = 0"),
            Err(StoreError::Config(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("level = \"ten\""),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geostore.toml");
        std::fs::write(&path, "level = 7\n").unwrap();
        assert_eq!(StoreConfig::load(&path).unwrap().level, 7);
        assert!(StoreConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
