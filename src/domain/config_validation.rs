//! Configuration validation.
//!
//! Validates every chart setting before a session is built, so a bad value
//! fails at startup rather than on first use.

use crate::domain::error::ChartError;
use crate::domain::parameter::{Color, Placement};
use crate::ports::config_port::ConfigPort;

pub const MAX_POOL_SIZE: i64 = 64;

pub fn validate_chart_config(config: &dyn ConfigPort) -> Result<(), ChartError> {
    validate_pool_size(config)?;
    validate_default_placement(config)?;
    validate_marker_colors(config)?;
    validate_csv_dir(config)?;
    Ok(())
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), ChartError> {
    let value = config.get_int("store", "pool_size", 4);
    if !(1..=MAX_POOL_SIZE).contains(&value) {
        return Err(ChartError::ConfigInvalid {
            section: "store".to_string(),
            key: "pool_size".to_string(),
            reason: format!("pool_size must be between 1 and {MAX_POOL_SIZE}"),
        });
    }
    Ok(())
}

fn validate_default_placement(config: &dyn ConfigPort) -> Result<(), ChartError> {
    if let Some(raw) = config.get_string("chart", "default_placement") {
        raw.parse::<Placement>()
            .map_err(|reason| ChartError::ConfigInvalid {
                section: "chart".to_string(),
                key: "default_placement".to_string(),
                reason,
            })?;
    }
    Ok(())
}

fn validate_marker_colors(config: &dyn ConfigPort) -> Result<(), ChartError> {
    for key in ["bullish_color", "bearish_color", "interval_color"] {
        if let Some(raw) = config.get_string("markers", key) {
            parse_config_color(&raw)
                .map_err(|reason| ChartError::ConfigInvalid {
                    section: "markers".to_string(),
                    key: key.to_string(),
                    reason,
                })?;
        }
    }
    Ok(())
}

/// INI comment characters make a leading `#` awkward, so config colors may
/// omit it.
pub(crate) fn parse_config_color(raw: &str) -> Result<Color, String> {
    let raw = raw.trim();
    if raw.starts_with('#') {
        raw.parse()
    } else {
        format!("#{raw}").parse()
    }
}

fn validate_csv_dir(config: &dyn ConfigPort) -> Result<(), ChartError> {
    match config.get_string("data", "csv_dir") {
        Some(dir) if dir.trim().is_empty() => Err(ChartError::ConfigInvalid {
            section: "data".to_string(),
            key: "csv_dir".to_string(),
            reason: "csv_dir must not be empty when set".to_string(),
        }),
        _ => Ok(()),
    }
}
