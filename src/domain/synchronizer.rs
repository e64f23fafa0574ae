//! Keeps a renderer in step with the registry.
//!
//! The overlay surface and the subplot surface are rebuilt independently:
//! an event only rebuilds the surface its indicator is placed on. Trade
//! markers are kept per record so that removal takes down exactly the set
//! that was added.

use crate::domain::parameter::Placement;
use crate::domain::registry::{IndicatorBox, RegistryEvent, RegistryListener};
use crate::domain::trading::{build_markers, MarkerPalette, TradeMarker};
use crate::ports::render_port::{RenderCommand, RenderPort};
use std::collections::HashMap;
use std::rc::Rc;

/// Slot 0 holds the base OHLC series.
pub const FIRST_OVERLAY_SLOT: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildCounts {
    pub overlay: usize,
    pub subplot: usize,
}

pub struct ChartSynchronizer<R: RenderPort> {
    renderer: R,
    palette: MarkerPalette,
    /// Identifier bound to each overlay slot, starting at slot 1.
    slots: Vec<String>,
    /// Highest slot ever bound; every one of them is hidden on rebuild.
    bound_slots: usize,
    panels: Vec<String>,
    markers: HashMap<String, Vec<TradeMarker>>,
    rebuilds: RebuildCounts,
}

impl<R: RenderPort> ChartSynchronizer<R> {
    pub fn new(renderer: R, palette: MarkerPalette) -> Self {
        Self {
            renderer,
            palette,
            slots: Vec::new(),
            bound_slots: 0,
            panels: Vec::new(),
            markers: HashMap::new(),
            rebuilds: RebuildCounts::default(),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Overlay identifiers with their current slot numbers.
    pub fn slot_assignments(&self) -> Vec<(usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, id)| (i + FIRST_OVERLAY_SLOT, id.as_str()))
            .collect()
    }

    pub fn sub_panels(&self) -> &[String] {
        &self.panels
    }

    pub fn markers_for(&self, record: &str) -> Option<&[TradeMarker]> {
        self.markers.get(record).map(Vec::as_slice)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.values().map(Vec::len).sum()
    }

    pub fn rebuild_counts(&self) -> RebuildCounts {
        self.rebuilds
    }

    /// Bring both surfaces and all markers in line with `registry` from
    /// scratch, e.g. after subscribing to a registry that already has
    /// content.
    pub fn sync_all(&mut self, registry: &IndicatorBox) {
        self.rebuild_overlay(registry);
        self.rebuild_subplots(registry);
        let stale: Vec<String> = self.markers.keys().cloned().collect();
        for name in stale {
            self.remove_markers(&name);
        }
        let mut names: Vec<&String> = registry.trading_records().keys().collect();
        names.sort();
        for name in names {
            let record = &registry.trading_records()[name.as_str()];
            self.add_markers(name, build_markers(record, &self.palette));
        }
    }

    /// Hide every bound slot, then bind the overlay set from slot 1 in
    /// registry order.
    pub fn rebuild_overlay(&mut self, registry: &IndicatorBox) {
        for slot in FIRST_OVERLAY_SLOT..FIRST_OVERLAY_SLOT + self.bound_slots {
            self.renderer.apply(RenderCommand::SetSlotVisible {
                slot,
                visible: false,
            });
        }
        self.slots.clear();
        for identifier in registry.overlay_keys() {
            let Some(indicator) = registry.get(&identifier) else {
                continue;
            };
            let slot = FIRST_OVERLAY_SLOT + self.slots.len();
            self.renderer.apply(RenderCommand::BindSlot {
                slot,
                indicator: Rc::clone(indicator),
            });
            self.renderer.apply(RenderCommand::SetSlotVisible {
                slot,
                visible: true,
            });
            self.slots.push(identifier);
        }
        self.bound_slots = self.bound_slots.max(self.slots.len());
        self.rebuilds.overlay += 1;
        tracing::trace!(slots = self.slots.len(), "overlay rebuilt");
    }

    /// Drop every sub-panel and re-add one per subplot indicator. With no
    /// sub-panels left the layout borrows the primary panel's time axis.
    pub fn rebuild_subplots(&mut self, registry: &IndicatorBox) {
        for identifier in std::mem::take(&mut self.panels) {
            self.renderer
                .apply(RenderCommand::RemoveSubPanel { identifier });
        }
        for identifier in registry.subplot_keys() {
            let Some(indicator) = registry.get(&identifier) else {
                continue;
            };
            self.renderer.apply(RenderCommand::AddSubPanel {
                indicator: Rc::clone(indicator),
            });
            self.panels.push(identifier);
        }
        if self.panels.is_empty() {
            self.renderer.apply(RenderCommand::ShareTimeAxis);
        }
        self.rebuilds.subplot += 1;
        tracing::trace!(panels = self.panels.len(), "subplots rebuilt");
    }

    fn add_markers(&mut self, record: &str, markers: Vec<TradeMarker>) {
        self.renderer.apply(RenderCommand::AddMarkers {
            record: record.to_string(),
            markers: markers.clone(),
        });
        self.markers.insert(record.to_string(), markers);
    }

    fn remove_markers(&mut self, record: &str) {
        if let Some(markers) = self.markers.remove(record) {
            self.renderer.apply(RenderCommand::RemoveMarkers {
                record: record.to_string(),
                markers,
            });
        }
    }
}

impl<R: RenderPort> RegistryListener for ChartSynchronizer<R> {
    fn on_registry_event(&mut self, event: &RegistryEvent, registry: &IndicatorBox) {
        match event {
            RegistryEvent::IndicatorAdded(indicator) | RegistryEvent::IndicatorRemoved(indicator) => {
                match indicator.placement {
                    Placement::Overlay => self.rebuild_overlay(registry),
                    Placement::Subplot => self.rebuild_subplots(registry),
                }
            }
            RegistryEvent::TradingRecordAdded { name, record } => {
                self.remove_markers(name);
                self.add_markers(name, build_markers(record, &self.palette));
            }
            RegistryEvent::TradingRecordRemoved { name, .. } => self.remove_markers(name),
        }
    }
}
