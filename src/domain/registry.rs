//! Indicator registry (`IndicatorBox`): the observable set of active
//! indicators bound to one base series.
//!
//! Every mutation notifies subscribers synchronously, in call order. A
//! replace is observed as a removal followed by an insertion. Anything that
//! can fail is checked before the first mutation, so a failed call leaves
//! the registry and its subscribers untouched.

use crate::domain::category::Category;
use crate::domain::chart_indicator::{
    ChartIndicator, ComputationInputs, NamedSeries, RenderStyle,
};
use crate::domain::error::ChartError;
use crate::domain::key::IndicatorKey;
use crate::domain::ohlcv::BaseSeries;
use crate::domain::parameter::{ParameterValue, Placement, SeriesRef};
use crate::domain::store::ParameterStore;
use crate::domain::trading::TradingRecord;
use crate::ports::computation_port::ComputationPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    IndicatorAdded(Rc<ChartIndicator>),
    IndicatorRemoved(Rc<ChartIndicator>),
    TradingRecordAdded {
        name: String,
        record: Rc<TradingRecord>,
    },
    TradingRecordRemoved {
        name: String,
        record: Rc<TradingRecord>,
    },
}

impl RegistryEvent {
    pub fn identifier(&self) -> &str {
        match self {
            RegistryEvent::IndicatorAdded(i) | RegistryEvent::IndicatorRemoved(i) => &i.identifier,
            RegistryEvent::TradingRecordAdded { name, .. }
            | RegistryEvent::TradingRecordRemoved { name, .. } => name,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(
            self,
            RegistryEvent::IndicatorAdded(_) | RegistryEvent::TradingRecordAdded { .. }
        )
    }
}

/// Receives every registry event together with the registry as it is after
/// the change.
pub trait RegistryListener {
    fn on_registry_event(&mut self, event: &RegistryEvent, registry: &IndicatorBox);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct IndicatorBox {
    base: BaseSeries,
    engine: Box<dyn ComputationPort>,
    default_placement: Placement,
    indicators: HashMap<String, Rc<ChartIndicator>>,
    /// Insertion order of `indicators`; drives placement-partition order.
    order: Vec<String>,
    trading_records: HashMap<String, Rc<TradingRecord>>,
    subscribers: Vec<(SubscriptionId, Rc<RefCell<dyn RegistryListener>>)>,
    next_subscription: u64,
}

impl IndicatorBox {
    pub fn new(
        base: BaseSeries,
        engine: Box<dyn ComputationPort>,
        default_placement: Placement,
    ) -> Self {
        Self {
            base,
            engine,
            default_placement,
            indicators: HashMap::new(),
            order: Vec::new(),
            trading_records: HashMap::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn subscribe(&mut self, listener: Rc<RefCell<dyn RegistryListener>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, listener));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn base_series(&self) -> &BaseSeries {
        &self.base
    }

    pub fn get(&self, identifier: &str) -> Option<&Rc<ChartIndicator>> {
        self.indicators.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.indicators.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Active identifiers in insertion order.
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    pub fn overlay_keys(&self) -> Vec<String> {
        self.keys_placed(Placement::Overlay)
    }

    pub fn subplot_keys(&self) -> Vec<String> {
        self.keys_placed(Placement::Subplot)
    }

    fn keys_placed(&self, placement: Placement) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| {
                self.indicators
                    .get(id.as_str())
                    .is_some_and(|i| i.placement == placement)
            })
            .cloned()
            .collect()
    }

    pub fn trading_records(&self) -> &HashMap<String, Rc<TradingRecord>> {
        &self.trading_records
    }

    /// Compute `key` from its stored parameters and insert it, replacing an
    /// active instance of the same key.
    pub fn load_indicator(
        &mut self,
        store: &ParameterStore,
        key: &IndicatorKey,
    ) -> Result<(), ChartError> {
        let indicator = self.build_indicator(store, key)?;
        tracing::debug!(%key, placement = %indicator.placement, "indicator computed");
        self.insert(indicator);
        Ok(())
    }

    /// Recompute an indicator after its parameters changed. Same contract as
    /// [`IndicatorBox::load_indicator`].
    pub fn reload_indicator(
        &mut self,
        store: &ParameterStore,
        key: &IndicatorKey,
    ) -> Result<(), ChartError> {
        self.load_indicator(store, key)
    }

    /// Insert an indicator that has no stored configuration.
    pub fn add_indicator(
        &mut self,
        identifier: &str,
        series: Vec<NamedSeries>,
        style: RenderStyle,
        placement: Placement,
        category: Category,
    ) -> Result<(), ChartError> {
        if identifier.parse::<IndicatorKey>().is_ok() || self.contains(identifier) {
            return Err(ChartError::IdentifierCollision {
                identifier: identifier.to_string(),
            });
        }
        self.check_alignment(identifier, &series)?;
        self.insert(ChartIndicator {
            identifier: identifier.to_string(),
            key: None,
            category,
            placement,
            series,
            style,
        });
        Ok(())
    }

    pub fn remove_indicator(&mut self, identifier: &str) -> Result<Rc<ChartIndicator>, ChartError> {
        let removed = self
            .indicators
            .remove(identifier)
            .ok_or_else(|| ChartError::NotActive {
                identifier: identifier.to_string(),
            })?;
        self.order.retain(|id| id != identifier);
        self.notify(RegistryEvent::IndicatorRemoved(Rc::clone(&removed)));
        Ok(removed)
    }

    /// Add or replace a named trading record.
    pub fn add_trading_record(&mut self, name: &str, record: TradingRecord) {
        if let Some(old) = self.trading_records.remove(name) {
            self.notify(RegistryEvent::TradingRecordRemoved {
                name: name.to_string(),
                record: old,
            });
        }
        let record = Rc::new(record);
        self.trading_records
            .insert(name.to_string(), Rc::clone(&record));
        self.notify(RegistryEvent::TradingRecordAdded {
            name: name.to_string(),
            record,
        });
    }

    pub fn remove_trading_record(&mut self, name: &str) -> Result<Rc<TradingRecord>, ChartError> {
        let record = self
            .trading_records
            .remove(name)
            .ok_or_else(|| ChartError::NotActive {
                identifier: name.to_string(),
            })?;
        self.notify(RegistryEvent::TradingRecordRemoved {
            name: name.to_string(),
            record: Rc::clone(&record),
        });
        Ok(record)
    }

    /// Swap the base series. Every active indicator was aligned to the old
    /// bars, so all of them are removed (one event each, in insertion order)
    /// and returned for the caller to reload.
    pub fn replace_base_series(&mut self, base: BaseSeries) -> Vec<Rc<ChartIndicator>> {
        let ids = self.order.clone();
        let removed: Vec<Rc<ChartIndicator>> = ids
            .iter()
            .filter_map(|id| self.remove_indicator(id).ok())
            .collect();
        self.base = base;
        removed
    }

    fn insert(&mut self, indicator: ChartIndicator) {
        let identifier = indicator.identifier.clone();
        if let Some(old) = self.indicators.remove(&identifier) {
            self.order.retain(|id| *id != identifier);
            self.notify(RegistryEvent::IndicatorRemoved(old));
        }
        let indicator = Rc::new(indicator);
        self.indicators
            .insert(identifier.clone(), Rc::clone(&indicator));
        self.order.push(identifier);
        self.notify(RegistryEvent::IndicatorAdded(indicator));
    }

    fn notify(&mut self, event: RegistryEvent) {
        // Listeners only get `&IndicatorBox`, so none can subscribe or
        // unsubscribe while the list is taken.
        let subscribers = std::mem::take(&mut self.subscribers);
        for (_, listener) in &subscribers {
            listener.borrow_mut().on_registry_event(&event, self);
        }
        self.subscribers = subscribers;
    }

    fn build_indicator(
        &self,
        store: &ParameterStore,
        key: &IndicatorKey,
    ) -> Result<ChartIndicator, ChartError> {
        let params = store.get_parameters_for(key)?;
        let category = store.get_category(key)?;

        let mut style_values = Vec::new();
        let mut placement = None;
        let mut inputs = ComputationInputs::default();

        for param in &params {
            let value = param.value_for(key)?;
            match value {
                ParameterValue::Color(_) | ParameterValue::Shape(_) | ParameterValue::Stroke(_) => {
                    style_values.push((param.name.as_str(), value));
                }
                ParameterValue::ChartPlacement(p) => {
                    placement.get_or_insert(p);
                }
                ParameterValue::SeriesRef(ref reference) => {
                    let values = self.resolve_series(key, reference)?;
                    inputs.series.push((param.name.clone(), values));
                }
                ParameterValue::IndicatorRef(ref target) => {
                    let values = self.resolve_indicator(key, target)?;
                    inputs.series.push((param.name.clone(), values));
                }
                ParameterValue::Boolean(_)
                | ParameterValue::Integer(_)
                | ParameterValue::Double(_)
                | ParameterValue::String(_) => {
                    inputs.scalars.push((param.name.clone(), value));
                }
            }
        }

        let series = self.engine.compute(key, &self.base, &inputs)?;
        self.check_alignment(&key.to_string(), &series)?;

        Ok(ChartIndicator {
            identifier: key.to_string(),
            key: Some(key.clone()),
            category,
            placement: placement.unwrap_or(self.default_placement),
            series,
            style: RenderStyle::from_values(style_values.iter().map(|(n, v)| (*n, v))),
        })
    }

    fn resolve_series(&self, key: &IndicatorKey, reference: &SeriesRef) -> Result<Vec<f64>, ChartError> {
        match reference {
            SeriesRef::Base(field) => Ok(self.base.column(*field)),
            SeriesRef::Indicator { key: target, series } => self
                .indicators
                .get(&target.to_string())
                .and_then(|i| i.series_named(series))
                .map(|s| s.values.clone())
                .ok_or_else(|| ChartError::DependencyUnresolved {
                    key: key.to_string(),
                    reference: reference.to_string(),
                }),
        }
    }

    fn resolve_indicator(&self, key: &IndicatorKey, target: &IndicatorKey) -> Result<Vec<f64>, ChartError> {
        self.indicators
            .get(&target.to_string())
            .and_then(|i| i.primary_series())
            .map(|s| s.values.clone())
            .ok_or_else(|| ChartError::DependencyUnresolved {
                key: key.to_string(),
                reference: target.to_string(),
            })
    }

    fn check_alignment(&self, identifier: &str, series: &[NamedSeries]) -> Result<(), ChartError> {
        let fail = |reason: String| ChartError::ComputationFailure {
            key: identifier.to_string(),
            reason,
        };
        if series.is_empty() {
            return Err(fail("no output series".to_string()));
        }
        if let Some(bad) = series.iter().find(|s| s.values.len() != self.base.len()) {
            return Err(fail(format!(
                "series {} has {} values, base series has {}",
                bad.name,
                bad.values.len(),
                self.base.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{InstanceNode, ParamNode, ParameterDocument};
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::parameter::Color;
    use crate::ports::storage_port::ParameterStoragePort;
    use chrono::NaiveDate;

    struct FixedStorage(ParameterDocument);

    impl ParameterStoragePort for FixedStorage {
        fn load_document(&self) -> Result<ParameterDocument, ChartError> {
            Ok(self.0.clone())
        }
        fn write_definition(&self, _: &str, _: &str) -> Result<(), ChartError> {
            Ok(())
        }
        fn write_instance(&self, _: &str, _: &InstanceNode) -> Result<(), ChartError> {
            Ok(())
        }
        fn write_parameter(&self, _: &IndicatorKey, _: &str, _: &str) -> Result<(), ChartError> {
            Ok(())
        }
        fn write_category(&self, _: &IndicatorKey, _: &str) -> Result<(), ChartError> {
            Ok(())
        }
    }

    /// Echoes the first series input, or the close column scaled by TimeFrame.
    struct EchoEngine;

    impl ComputationPort for EchoEngine {
        fn compute(
            &self,
            key: &IndicatorKey,
            base: &BaseSeries,
            inputs: &ComputationInputs,
        ) -> Result<Vec<NamedSeries>, ChartError> {
            if key.indicator_type() == "SHORT" {
                return Ok(vec![NamedSeries::new("value", vec![1.0])]);
            }
            let values = match inputs.series.first() {
                Some((_, v)) => v.clone(),
                None => {
                    let k = inputs.double("TimeFrame").unwrap_or(1.0);
                    base.bars().iter().map(|b| b.close * k).collect()
                }
            };
            Ok(vec![NamedSeries::new("value", values)])
        }
    }

    #[derive(Default)]
    struct EventLog(Vec<String>);

    impl RegistryListener for EventLog {
        fn on_registry_event(&mut self, event: &RegistryEvent, registry: &IndicatorBox) {
            let verb = if event.is_added() { "+" } else { "-" };
            self.0
                .push(format!("{verb}{} ({})", event.identifier(), registry.len()));
        }
    }

    fn p(name: &str, t: &str, v: &str) -> ParamNode {
        ParamNode {
            name: name.into(),
            type_tag: t.into(),
            value: v.into(),
        }
    }

    fn store() -> ParameterStore {
        let mut doc = ParameterDocument::new();
        doc.push_instance(
            "EMA",
            InstanceNode {
                id: 1,
                category: None,
                params: vec![
                    p("TimeFrame", "Integer", "2"),
                    p("Placement", "ChartPlacement", "Overlay"),
                    p("Color", "Color", "#FF0000"),
                ],
            },
        );
        doc.push_instance(
            "EMA",
            InstanceNode {
                id: 2,
                category: None,
                params: vec![p("TimeFrame", "Integer", "3")],
            },
        );
        doc.push_instance(
            "RSI",
            InstanceNode {
                id: 1,
                category: None,
                params: vec![
                    p("Source", "IndicatorRef", "EMA_1"),
                    p("Placement", "ChartPlacement", "Subplot"),
                ],
            },
        );
        doc.push_instance(
            "ROC",
            InstanceNode {
                id: 1,
                category: None,
                params: vec![p("Source", "SeriesRef", "EMA_1:upper")],
            },
        );
        doc.push_instance(
            "SHORT",
            InstanceNode {
                id: 1,
                category: None,
                params: vec![],
            },
        );
        ParameterStore::open(Box::new(FixedStorage(doc))).unwrap()
    }

    fn base() -> BaseSeries {
        let bars = (1..=3)
            .map(|d| OhlcvBar {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: d as f64,
                volume: 1.0,
            })
            .collect();
        BaseSeries::new("TEST", bars).unwrap()
    }

    fn registry() -> (IndicatorBox, Rc<RefCell<EventLog>>) {
        let mut registry = IndicatorBox::new(base(), Box::new(EchoEngine), Placement::Subplot);
        let log = Rc::new(RefCell::new(EventLog::default()));
        registry.subscribe(log.clone());
        (registry, log)
    }

    fn key(s: &str) -> IndicatorKey {
        s.parse().unwrap()
    }

    #[test]
    fn load_resolves_style_placement_and_inputs() {
        let (mut registry, log) = registry();
        let store = store();
        registry.load_indicator(&store, &key("EMA_1")).unwrap();
        let ema = registry.get("EMA_1").unwrap();
        assert_eq!(ema.placement, Placement::Overlay);
        assert_eq!(ema.style.primary_color(), Color::rgb(255, 0, 0));
        assert_eq!(ema.series[0].values, vec![2.0, 4.0, 6.0]);
        assert_eq!(log.borrow().0, vec!["+EMA_1 (1)"]);
    }

    #[test]
    fn missing_placement_uses_default() {
        let (mut registry, _) = registry();
        registry.load_indicator(&store(), &key("EMA_2")).unwrap();
        assert_eq!(registry.get("EMA_2").unwrap().placement, Placement::Subplot);
    }

    #[test]
    fn reload_is_remove_then_add() {
        let (mut registry, log) = registry();
        let store = store();
        registry.load_indicator(&store, &key("EMA_1")).unwrap();
        registry.load_indicator(&store, &key("EMA_2")).unwrap();
        registry.reload_indicator(&store, &key("EMA_1")).unwrap();
        assert_eq!(
            log.borrow().0,
            vec!["+EMA_1 (1)", "+EMA_2 (2)", "-EMA_1 (1)", "+EMA_1 (2)"]
        );
        assert_eq!(registry.keys(), ["EMA_2", "EMA_1"]);
    }

    #[test]
    fn unresolved_reference_leaves_registry_unchanged() {
        let (mut registry, log) = registry();
        let store = store();
        let err = registry.load_indicator(&store, &key("RSI_1")).unwrap_err();
        assert!(matches!(
            err,
            ChartError::DependencyUnresolved { ref reference, .. } if reference == "EMA_1"
        ));
        assert!(registry.is_empty());
        assert!(log.borrow().0.is_empty());
    }

    #[test]
    fn indicator_reference_uses_primary_series() {
        let (mut registry, _) = registry();
        let store = store();
        registry.load_indicator(&store, &key("EMA_1")).unwrap();
        registry.load_indicator(&store, &key("RSI_1")).unwrap();
        assert_eq!(registry.get("RSI_1").unwrap().series[0].values, vec![2.0, 4.0, 6.0]);
        assert_eq!(registry.overlay_keys(), vec!["EMA_1"]);
        assert_eq!(registry.subplot_keys(), vec!["RSI_1"]);
    }

    #[test]
    fn series_reference_to_missing_series_is_unresolved() {
        let (mut registry, _) = registry();
        let store = store();
        registry.load_indicator(&store, &key("EMA_1")).unwrap();
        assert!(matches!(
            registry.load_indicator(&store, &key("ROC_1")),
            Err(ChartError::DependencyUnresolved { ref reference, .. }) if reference == "EMA_1:upper"
        ));
    }

    #[test]
    fn misaligned_output_is_computation_failure() {
        let (mut registry, _) = registry();
        assert!(matches!(
            registry.load_indicator(&store(), &key("SHORT_1")),
            Err(ChartError::ComputationFailure { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_configuration_is_not_found() {
        let (mut registry, _) = registry();
        assert!(matches!(
            registry.load_indicator(&store(), &key("EMA_9")),
            Err(ChartError::ConfigurationNotFound { .. })
        ));
    }

    #[test]
    fn add_indicator_rejects_key_shaped_and_duplicate_identifiers() {
        let (mut registry, _) = registry();
        let series = || vec![NamedSeries::new("value", vec![0.0; 3])];
        let add = |r: &mut IndicatorBox, id: &str| {
            r.add_indicator(id, series(), RenderStyle::default(), Placement::Overlay, Category::Default)
        };
        assert!(matches!(
            add(&mut registry, "EMA_1"),
            Err(ChartError::IdentifierCollision { .. })
        ));
        add(&mut registry, "signal-line").unwrap();
        assert!(matches!(
            add(&mut registry, "signal-line"),
            Err(ChartError::IdentifierCollision { .. })
        ));
        assert!(registry.get("signal-line").unwrap().key.is_none());
    }

    #[test]
    fn remove_emits_one_event() {
        let (mut registry, log) = registry();
        registry.load_indicator(&store(), &key("EMA_1")).unwrap();
        registry.remove_indicator("EMA_1").unwrap();
        assert_eq!(log.borrow().0, vec!["+EMA_1 (1)", "-EMA_1 (0)"]);
        assert!(matches!(
            registry.remove_indicator("EMA_1"),
            Err(ChartError::NotActive { .. })
        ));
        assert_eq!(log.borrow().0.len(), 2);
    }

    #[test]
    fn unsubscribed_listener_hears_nothing() {
        let (mut registry, _) = registry();
        let quiet = Rc::new(RefCell::new(EventLog::default()));
        let id = registry.subscribe(quiet.clone());
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.load_indicator(&store(), &key("EMA_1")).unwrap();
        assert!(quiet.borrow().0.is_empty());
    }

    #[test]
    fn trading_records_are_independent() {
        let (mut registry, log) = registry();
        registry.add_trading_record("run", TradingRecord::new(crate::domain::trading::OrderType::Buy));
        registry.add_trading_record("run", TradingRecord::new(crate::domain::trading::OrderType::Sell));
        assert_eq!(registry.trading_records().len(), 1);
        assert!(registry.is_empty());
        registry.remove_trading_record("run").unwrap();
        assert_eq!(log.borrow().0, vec!["+run (0)", "-run (0)", "+run (0)", "-run (0)"]);
        assert!(registry.remove_trading_record("run").is_err());
    }

    #[test]
    fn replace_base_series_removes_everything() {
        let (mut registry, log) = registry();
        let store = store();
        registry.load_indicator(&store, &key("EMA_1")).unwrap();
        registry.load_indicator(&store, &key("EMA_2")).unwrap();
        let removed = registry.replace_base_series(base());
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].identifier, "EMA_1");
        assert!(registry.is_empty());
        assert_eq!(log.borrow().0.len(), 4);
    }
}
