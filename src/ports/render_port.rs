//! Render collaborator port.
//!
//! The synchronizer drives a renderer only through these commands. Slot 0
//! of the primary panel belongs to the base OHLC series; indicator overlays
//! start at slot 1.

use crate::domain::chart_indicator::ChartIndicator;
use crate::domain::trading::TradeMarker;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Bind an overlay indicator's series and style to a primary-panel slot.
    BindSlot {
        slot: usize,
        indicator: Rc<ChartIndicator>,
    },
    SetSlotVisible { slot: usize, visible: bool },
    /// Append a sub-panel below the primary panel for a subplot indicator.
    AddSubPanel { indicator: Rc<ChartIndicator> },
    RemoveSubPanel { identifier: String },
    /// Point the combined layout's time axis at the primary panel.
    ShareTimeAxis,
    AddMarkers {
        record: String,
        markers: Vec<TradeMarker>,
    },
    RemoveMarkers {
        record: String,
        markers: Vec<TradeMarker>,
    },
}

pub trait RenderPort {
    fn apply(&mut self, command: RenderCommand);
}
