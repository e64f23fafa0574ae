//! Port traits: the seams between the chart core and its collaborators.

pub mod archive_port;
pub mod computation_port;
pub mod config_port;
pub mod data_port;
pub mod render_port;
pub mod storage_port;
