//! Concrete adapter implementations for ports.

pub mod builtin_engine;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod layout_renderer;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod svg_chart;
