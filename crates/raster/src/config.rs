use std::path::Path;

use isoraster_common::Viewport;
use serde::{Deserialize, Serialize};

use crate::RasterError;
use crate::packed::MAX_TRIANGLE_INDEX;

/// Rasterizer configuration, loadable from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Surface width in pixels. The last column is the border.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Projection center column; `width / 2` when unset.
    pub center_x: Option<i32>,
    /// Projection center row; `height / 2` when unset.
    pub center_y: Option<i32>,
    /// Palette brightness exponent.
    pub brightness: f64,
    /// Per-kind triangle limit for one frame.
    pub max_triangles: usize,
    /// Initial capacity of each per-kind record array.
    pub initial_capacity: usize,
    /// Number of texture layers in the atlas.
    pub texture_count: u32,
    /// Value returned by accepted `fill_*` calls.
    pub legacy_raster_enabled: bool,
    /// Color of the right border column.
    pub border_color: u32,
    /// Clear the surface to black before each frame is rasterized.
    pub clear_each_frame: bool,
    /// Worker threads for the parallel backend; available parallelism when unset.
    pub workers: Option<usize>,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 334,
            center_x: None,
            center_y: None,
            brightness: 0.9,
            max_triangles: 100_000,
            initial_capacity: 1024,
            texture_count: 50,
            legacy_raster_enabled: false,
            border_color: 0,
            clear_each_frame: true,
            workers: None,
        }
    }
}

impl RasterConfig {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn viewport(&self) -> Viewport {
        let base = Viewport::new(self.width, self.height);
        base.with_center(
            self.center_x.unwrap_or(base.center_x),
            self.center_y.unwrap_or(base.center_y),
        )
    }

    /// Worker count for the parallel backend, at least one.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    pub fn validate(&self) -> Result<(), RasterError> {
        if self.width < 2 || self.height == 0 {
            return Err(RasterError::InvalidConfig(format!(
                "surface must be at least 2x1, got {}x{}",
                self.width, self.height
            )));
        }
        // submission indices are shared across all four kinds
        let limit = MAX_TRIANGLE_INDEX as usize / 4;
        if self.max_triangles == 0 || self.max_triangles > limit {
            return Err(RasterError::InvalidConfig(format!(
                "max_triangles must be in 1..={limit}, got {}",
                self.max_triangles
            )));
        }
        if self.workers == Some(0) {
            return Err(RasterError::InvalidConfig("workers must be positive".into()));
        }
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, RasterError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RasterError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> Result<String, RasterError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RasterConfig::default();
        let viewport = config.viewport();
        assert_eq!((viewport.width, viewport.height), (512, 334));
        assert_eq!((viewport.center_x, viewport.center_y), (256, 167));
        assert!(!config.legacy_raster_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = RasterConfig::from_yaml_str("width: 64\nheight: 48\ncenter_y: 10\n").unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.viewport().center_x, 32);
        assert_eq!(config.viewport().center_y, 10);
        assert_eq!(config.max_triangles, 100_000);
    }

    #[test]
    fn rejects_degenerate_surface() {
        let err = RasterConfig::from_yaml_str("width: 1\n").unwrap_err();
        assert!(matches!(err, RasterError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_oversized_triangle_limit() {
        let config = RasterConfig {
            max_triangles: usize::MAX,
            ..RasterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raster.yaml");
        let config = RasterConfig {
            workers: Some(3),
            legacy_raster_enabled: true,
            ..RasterConfig::with_size(100, 80)
        };
        std::fs::write(&path, config.to_yaml().unwrap()).unwrap();

        let loaded = RasterConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.worker_count(), 3);
    }
}
