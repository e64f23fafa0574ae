//! Core domain types and logic.

pub mod catalog;
pub mod category;
pub mod chart_indicator;
pub mod config;
pub mod config_validation;
pub mod document;
pub mod error;
pub mod indicator;
pub mod key;
pub mod lifecycle;
pub mod ohlcv;
pub mod parameter;
pub mod registry;
pub mod store;
pub mod synchronizer;
pub mod task;
pub mod trading;
