//! Chart settings, built once from a [`ConfigPort`] and passed explicitly.

use crate::domain::config_validation::{parse_config_color, validate_chart_config};
use crate::domain::error::ChartError;
use crate::domain::parameter::{Color, Placement};
use crate::domain::trading::MarkerPalette;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;

pub const DEFAULT_POOL_SIZE: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    /// SQLite file holding parameters, bars and archived series.
    pub store_path: Option<PathBuf>,
    pub pool_size: u32,
    /// Placement for instances without a ChartPlacement parameter.
    pub default_placement: Placement,
    pub palette: MarkerPalette,
    pub archive_enabled: bool,
    pub csv_dir: Option<PathBuf>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            pool_size: DEFAULT_POOL_SIZE,
            default_placement: Placement::Overlay,
            palette: MarkerPalette::default(),
            archive_enabled: true,
            csv_dir: None,
        }
    }
}

impl ChartConfig {
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, ChartError> {
        validate_chart_config(config)?;
        let defaults = ChartConfig::default();

        let color = |key: &str, fallback: Option<Color>| {
            config
                .get_string("markers", key)
                .and_then(|raw| parse_config_color(&raw).ok())
                .or(fallback)
        };

        Ok(Self {
            store_path: config.get_string("store", "path").map(PathBuf::from),
            pool_size: u32::try_from(config.get_int("store", "pool_size", DEFAULT_POOL_SIZE as i64))
                .unwrap_or(DEFAULT_POOL_SIZE),
            default_placement: config
                .get_string("chart", "default_placement")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.default_placement),
            palette: MarkerPalette {
                bullish: color("bullish_color", None).unwrap_or(defaults.palette.bullish),
                bearish: color("bearish_color", None).unwrap_or(defaults.palette.bearish),
                interval: color("interval_color", defaults.palette.interval),
            },
            archive_enabled: config.get_bool("archive", "enabled", defaults.archive_enabled),
            csv_dir: config.get_string("data", "csv_dir").map(PathBuf::from),
        })
    }
}
