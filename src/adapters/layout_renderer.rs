//! In-memory chart layout driven by render commands.
//!
//! The layout models what a chart widget would show: overlay slots on the
//! primary panel, sub-panels stacked below it, the panel the combined time
//! axis is taken from, and marker sets per trading record.

use crate::domain::chart_indicator::ChartIndicator;
use crate::domain::trading::TradeMarker;
use crate::ports::render_port::{RenderCommand, RenderPort};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct SlotBinding {
    pub indicator: Rc<ChartIndicator>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeAxis {
    Primary,
    SubPanel(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    slots: BTreeMap<usize, SlotBinding>,
    sub_panels: Vec<Rc<ChartIndicator>>,
    /// `None` once the panel owning the axis is gone and nothing replaced it.
    time_axis: Option<TimeAxis>,
    markers: HashMap<String, Vec<TradeMarker>>,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
            sub_panels: Vec::new(),
            time_axis: Some(TimeAxis::Primary),
            markers: HashMap::new(),
        }
    }
}

impl ChartLayout {
    pub fn slot(&self, slot: usize) -> Option<&SlotBinding> {
        self.slots.get(&slot)
    }

    /// Visible overlay bindings by slot number.
    pub fn visible_overlays(&self) -> Vec<(usize, &ChartIndicator)> {
        self.slots
            .iter()
            .filter(|(_, b)| b.visible)
            .map(|(slot, b)| (*slot, b.indicator.as_ref()))
            .collect()
    }

    pub fn sub_panels(&self) -> &[Rc<ChartIndicator>] {
        &self.sub_panels
    }

    pub fn time_axis(&self) -> Option<&TimeAxis> {
        self.time_axis.as_ref()
    }

    pub fn has_time_axis(&self) -> bool {
        self.time_axis.is_some()
    }

    pub fn markers(&self) -> impl Iterator<Item = &TradeMarker> {
        self.markers.values().flatten()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.values().map(Vec::len).sum()
    }

    fn remove_markers(&mut self, record: &str, markers: &[TradeMarker]) {
        let Some(current) = self.markers.get_mut(record) else {
            tracing::warn!(record, "removing markers of unknown record");
            return;
        };
        for marker in markers {
            if let Some(pos) = current.iter().position(|m| m == marker) {
                current.remove(pos);
            }
        }
        if current.is_empty() {
            self.markers.remove(record);
        }
    }
}

#[derive(Debug, Default)]
pub struct LayoutRenderer {
    layout: ChartLayout,
    applied: usize,
}

impl LayoutRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self) -> &ChartLayout {
        &self.layout
    }

    /// Number of commands applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }
}

impl RenderPort for LayoutRenderer {
    fn apply(&mut self, command: RenderCommand) {
        self.applied += 1;
        let layout = &mut self.layout;
        match command {
            RenderCommand::BindSlot { slot, indicator } => {
                let visible = layout.slots.get(&slot).is_some_and(|b| b.visible);
                layout.slots.insert(slot, SlotBinding { indicator, visible });
            }
            RenderCommand::SetSlotVisible { slot, visible } => {
                if let Some(binding) = layout.slots.get_mut(&slot) {
                    binding.visible = visible;
                }
            }
            RenderCommand::AddSubPanel { indicator } => {
                // The bottom panel carries the shared time axis.
                layout.time_axis = Some(TimeAxis::SubPanel(indicator.identifier.clone()));
                layout.sub_panels.push(indicator);
            }
            RenderCommand::RemoveSubPanel { identifier } => {
                layout.sub_panels.retain(|p| p.identifier != identifier);
                if layout.time_axis == Some(TimeAxis::SubPanel(identifier)) {
                    layout.time_axis = layout
                        .sub_panels
                        .last()
                        .map(|p| TimeAxis::SubPanel(p.identifier.clone()));
                }
            }
            RenderCommand::ShareTimeAxis => {
                layout.time_axis = Some(TimeAxis::Primary);
            }
            RenderCommand::AddMarkers { record, markers } => {
                layout.markers.entry(record).or_default().extend(markers);
            }
            RenderCommand::RemoveMarkers { record, markers } => {
                layout.remove_markers(&record, &markers);
            }
        }
    }
}
