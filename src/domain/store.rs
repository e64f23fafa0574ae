//! Parameter store: the typed, persistent home of every configured
//! indicator instance.
//!
//! Every mutation is written through [`ParameterStoragePort`] before the
//! in-memory document changes, so a `PersistenceFailure` leaves the store as
//! it was. Lookups fail per key and never poison other keys.

use crate::domain::category::Category;
use crate::domain::document::{InstanceNode, ParamNode, ParameterDocument};
use crate::domain::error::ChartError;
use crate::domain::key::IndicatorKey;
use crate::domain::parameter::{IndicatorParameter, ParameterType, ParameterValue};
use crate::ports::storage_port::ParameterStoragePort;

pub struct ParameterStore {
    document: ParameterDocument,
    storage: Box<dyn ParameterStoragePort>,
}

impl ParameterStore {
    /// Load the document from storage.
    pub fn open(storage: Box<dyn ParameterStoragePort>) -> Result<Self, ChartError> {
        let document = storage.load_document()?;
        tracing::debug!(
            instances = document.keys().len(),
            "parameter document loaded"
        );
        Ok(Self { document, storage })
    }

    pub fn document(&self) -> &ParameterDocument {
        &self.document
    }

    pub fn contains(&self, key: &IndicatorKey) -> bool {
        self.document.instance(key).is_some()
    }

    fn instance(&self, key: &IndicatorKey) -> Result<&InstanceNode, ChartError> {
        self.document
            .instance(key)
            .ok_or_else(|| ChartError::not_found(key))
    }

    fn node(&self, key: &IndicatorKey, name: &str) -> Result<&ParamNode, ChartError> {
        self.instance(key)?
            .param(name)
            .ok_or_else(|| ChartError::param_not_found(key, name))
    }

    pub fn get_parameter(&self, key: &IndicatorKey, name: &str) -> Result<String, ChartError> {
        Ok(self.node(key, name)?.value.clone())
    }

    pub fn get_parameter_type(
        &self,
        key: &IndicatorKey,
        name: &str,
    ) -> Result<ParameterType, ChartError> {
        let node = self.node(key, name)?;
        Ok(to_parameter(key, node)?.parameter_type)
    }

    /// The parameter parsed under its declared type.
    pub fn get_typed(&self, key: &IndicatorKey, name: &str) -> Result<ParameterValue, ChartError> {
        let node = self.node(key, name)?;
        to_parameter(key, node)?.value_for(key)
    }

    /// Unknown category names fall back to `Default` with a warning.
    pub fn get_category(&self, key: &IndicatorKey) -> Result<Category, ChartError> {
        let raw = self.instance(key)?.category.as_deref();
        Ok(Category::from_attribute(raw).unwrap_or_else(|| {
            tracing::warn!(%key, category = raw, "unknown category, using DEFAULT");
            Category::Default
        }))
    }

    /// Parameters in stored order. Values are not parsed here; declared
    /// types are.
    pub fn get_parameters_for(
        &self,
        key: &IndicatorKey,
    ) -> Result<Vec<IndicatorParameter>, ChartError> {
        self.instance(key)?
            .params
            .iter()
            .map(|node| to_parameter(key, node))
            .collect()
    }

    pub fn get_all_keys(&self) -> Vec<IndicatorKey> {
        self.document.keys()
    }

    /// Keys whose resolved category is `category`. Instances that cannot be
    /// read are skipped.
    pub fn get_keys_for_category(&self, category: Category) -> Vec<IndicatorKey> {
        self.get_all_keys()
            .into_iter()
            .filter(|key| self.get_category(key).ok() == Some(category))
            .collect()
    }

    pub fn get_description(&self, indicator_type: &str) -> Result<String, ChartError> {
        self.document
            .indicator(indicator_type)
            .map(|node| node.description.clone())
            .ok_or_else(|| ChartError::not_found(indicator_type))
    }

    /// Replace one raw value. The value must parse under the parameter's
    /// declared type.
    pub fn set_parameter(
        &mut self,
        key: &IndicatorKey,
        name: &str,
        value: &str,
    ) -> Result<(), ChartError> {
        let declared = to_parameter(key, self.node(key, name)?)?.parameter_type;
        ParameterValue::parse(declared, value).map_err(|e| e.for_parameter(key, name))?;

        self.storage.write_parameter(key, name, value)?;
        if let Some(node) = self
            .document
            .instance_mut(key)
            .and_then(|i| i.param_mut(name))
        {
            node.value = value.to_string();
        }
        tracing::debug!(%key, name, value, "parameter set");
        Ok(())
    }

    /// Write a batch of parameters for one instance in a single storage
    /// call. Existing names are overwritten in place, new names appended.
    pub fn save_parameters(
        &mut self,
        key: &IndicatorKey,
        params: &[IndicatorParameter],
    ) -> Result<(), ChartError> {
        let mut updated = self.instance(key)?.clone();
        for param in params {
            param.value_for(key)?;
            let node = ParamNode::from_parameter(param);
            match updated.param_mut(&param.name) {
                Some(existing) => *existing = node,
                None => updated.params.push(node),
            }
        }

        self.storage.write_instance(key.indicator_type(), &updated)?;
        if let Some(instance) = self.document.instance_mut(key) {
            *instance = updated;
        }
        tracing::debug!(%key, count = params.len(), "parameters saved");
        Ok(())
    }

    pub fn set_category(&mut self, key: &IndicatorKey, category: Category) -> Result<(), ChartError> {
        self.instance(key)?;
        self.storage.write_category(key, category.as_str())?;
        if let Some(instance) = self.document.instance_mut(key) {
            instance.category = Some(category.as_str().to_string());
        }
        Ok(())
    }

    /// Clone the instance subtree under `1 + max(id)` of its type and
    /// append it as the last sibling.
    pub fn duplicate(&mut self, key: &IndicatorKey) -> Result<IndicatorKey, ChartError> {
        let source = self.instance(key)?.clone();
        let new_key = self.next_key(key.indicator_type())?;

        let copy = InstanceNode {
            id: new_key.id(),
            ..source
        };
        self.storage.write_instance(key.indicator_type(), &copy)?;
        self.document.push_instance(key.indicator_type(), copy);
        tracing::info!(from = %key, to = %new_key, "instance duplicated");
        Ok(new_key)
    }

    /// Create a new instance of `indicator_type`; the first instance of a
    /// type gets id 1.
    pub fn create_instance(
        &mut self,
        indicator_type: &str,
        category: Category,
        params: &[IndicatorParameter],
    ) -> Result<IndicatorKey, ChartError> {
        let new_key = self.next_key(indicator_type)?;
        for param in params {
            param.value_for(&new_key)?;
        }
        let node = InstanceNode {
            id: new_key.id(),
            category: Some(category.as_str().to_string()),
            params: params.iter().map(ParamNode::from_parameter).collect(),
        };
        self.storage.write_instance(indicator_type, &node)?;
        self.document.push_instance(indicator_type, node);
        tracing::debug!(key = %new_key, "instance created");
        Ok(new_key)
    }

    pub fn define_indicator(
        &mut self,
        indicator_type: &str,
        description: &str,
    ) -> Result<(), ChartError> {
        IndicatorKey::new(indicator_type, 1)?;
        self.storage.write_definition(indicator_type, description)?;
        self.document.define(indicator_type, description);
        Ok(())
    }

    fn next_key(&self, indicator_type: &str) -> Result<IndicatorKey, ChartError> {
        let next = match self.document.max_id(indicator_type) {
            Some(max) => max.checked_add(1).ok_or_else(|| ChartError::InvalidKey {
                input: format!("{indicator_type}_{max}+1"),
            })?,
            None => 1,
        };
        IndicatorKey::new(indicator_type, next)
    }
}

fn to_parameter(key: &IndicatorKey, node: &ParamNode) -> Result<IndicatorParameter, ChartError> {
    node.to_parameter().map_err(|reason| ChartError::TypeConversion {
        key: key.to_string(),
        name: node.name.clone(),
        type_tag: node.type_tag.clone(),
        value: node.value.clone(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parameter::strategies::arb_value;
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorded {
        writes: RefCell<Vec<String>>,
        fail: Cell<bool>,
    }

    struct RecordingStorage {
        initial: ParameterDocument,
        log: Rc<Recorded>,
    }

    impl RecordingStorage {
        fn record(&self, entry: String) -> Result<(), ChartError> {
            if self.log.fail.get() {
                return Err(ChartError::persistence("disk full"));
            }
            self.log.writes.borrow_mut().push(entry);
            Ok(())
        }
    }

    impl ParameterStoragePort for RecordingStorage {
        fn load_document(&self) -> Result<ParameterDocument, ChartError> {
            Ok(self.initial.clone())
        }

        fn write_definition(&self, indicator_type: &str, _: &str) -> Result<(), ChartError> {
            self.record(format!("define {indicator_type}"))
        }

        fn write_instance(&self, indicator_type: &str, instance: &InstanceNode) -> Result<(), ChartError> {
            self.record(format!("instance {indicator_type}_{}", instance.id))
        }

        fn write_parameter(&self, key: &IndicatorKey, name: &str, value: &str) -> Result<(), ChartError> {
            self.record(format!("param {key} {name}={value}"))
        }

        fn write_category(&self, key: &IndicatorKey, category: &str) -> Result<(), ChartError> {
            self.record(format!("category {key} {category}"))
        }
    }

    fn key(s: &str) -> IndicatorKey {
        s.parse().unwrap()
    }

    fn param(name: &str, t: &str, v: &str) -> ParamNode {
        ParamNode {
            name: name.into(),
            type_tag: t.into(),
            value: v.into(),
        }
    }

    fn ema_document() -> ParameterDocument {
        let mut doc = ParameterDocument::new();
        doc.define("EMA", "Exponential moving average");
        doc.push_instance(
            "EMA",
            InstanceNode {
                id: 1,
                category: Some("MOVING_AVERAGE".into()),
                params: vec![
                    param("TimeFrame", "Integer", "20"),
                    param("Placement", "ChartPlacement", "Overlay"),
                ],
            },
        );
        doc.push_instance(
            "EMA",
            InstanceNode {
                id: 2,
                category: None,
                params: vec![
                    param("TimeFrame", "Integer", "60"),
                    param("Placement", "ChartPlacement", "Subplot"),
                ],
            },
        );
        doc.push_instance(
            "RSI",
            InstanceNode {
                id: 1,
                category: Some("HOROSCOPE".into()),
                params: vec![param("TimeFrame", "Float", "14")],
            },
        );
        doc
    }

    fn open_store() -> (ParameterStore, Rc<Recorded>) {
        let log = Rc::new(Recorded::default());
        let storage = RecordingStorage {
            initial: ema_document(),
            log: Rc::clone(&log),
        };
        (ParameterStore::open(Box::new(storage)).unwrap(), log)
    }

    #[test]
    fn lookups() {
        let (store, _) = open_store();
        assert_eq!(store.get_parameter(&key("EMA_1"), "TimeFrame").unwrap(), "20");
        assert_eq!(
            store.get_typed(&key("EMA_2"), "TimeFrame").unwrap(),
            ParameterValue::Integer(60)
        );
        assert_eq!(
            store.get_parameter_type(&key("EMA_1"), "Placement").unwrap(),
            ParameterType::ChartPlacement
        );
        assert_eq!(
            store.get_description("EMA").unwrap(),
            "Exponential moving average"
        );
        assert_eq!(store.get_parameters_for(&key("EMA_1")).unwrap().len(), 2);
    }

    #[test]
    fn missing_lookups_are_not_found() {
        let (store, _) = open_store();
        assert!(matches!(
            store.get_parameter(&key("EMA_9"), "TimeFrame"),
            Err(ChartError::ConfigurationNotFound { name: None, .. })
        ));
        assert!(matches!(
            store.get_parameter(&key("EMA_1"), "Length"),
            Err(ChartError::ConfigurationNotFound { name: Some(_), .. })
        ));
        assert!(matches!(
            store.get_parameters_for(&key("SMA_1")),
            Err(ChartError::ConfigurationNotFound { .. })
        ));
        assert!(store.get_description("SMA").is_err());
    }

    #[test]
    fn category_fallbacks() {
        let (store, _) = open_store();
        assert_eq!(store.get_category(&key("EMA_1")).unwrap(), Category::MovingAverage);
        assert_eq!(store.get_category(&key("EMA_2")).unwrap(), Category::Default);
        assert_eq!(store.get_category(&key("RSI_1")).unwrap(), Category::Default);
        assert_eq!(
            store.get_keys_for_category(Category::Default),
            vec![key("EMA_2"), key("RSI_1")]
        );
    }

    #[test]
    fn malformed_instance_fails_alone() {
        let (store, _) = open_store();
        assert!(matches!(
            store.get_parameters_for(&key("RSI_1")),
            Err(ChartError::TypeConversion { .. })
        ));
        assert!(store.get_parameters_for(&key("EMA_2")).is_ok());
    }

    #[test]
    fn set_parameter_writes_through() {
        let (mut store, log) = open_store();
        store.set_parameter(&key("EMA_1"), "TimeFrame", "50").unwrap();
        assert_eq!(store.get_parameter(&key("EMA_1"), "TimeFrame").unwrap(), "50");
        assert_eq!(*log.writes.borrow(), vec!["param EMA_1 TimeFrame=50"]);
    }

    #[test]
    fn set_parameter_rejects_wrong_type() {
        let (mut store, log) = open_store();
        let err = store
            .set_parameter(&key("EMA_1"), "TimeFrame", "fifty")
            .unwrap_err();
        assert!(matches!(err, ChartError::TypeConversion { .. }));
        assert!(log.writes.borrow().is_empty());
        assert_eq!(store.get_parameter(&key("EMA_1"), "TimeFrame").unwrap(), "20");
    }

    #[test]
    fn persistence_failure_leaves_memory_untouched() {
        let (mut store, log) = open_store();
        log.fail.set(true);
        let err = store.set_parameter(&key("EMA_1"), "TimeFrame", "50").unwrap_err();
        assert!(matches!(err, ChartError::PersistenceFailure { .. }));
        assert_eq!(store.get_parameter(&key("EMA_1"), "TimeFrame").unwrap(), "20");

        assert!(store.duplicate(&key("EMA_1")).is_err());
        assert_eq!(store.get_all_keys().len(), 3);
    }

    #[test]
    fn duplicate_takes_next_id_after_max() {
        let (mut store, log) = open_store();
        let new_key = store.duplicate(&key("EMA_2")).unwrap();
        assert_eq!(new_key.to_string(), "EMA_3");
        assert_eq!(store.get_parameter(&new_key, "TimeFrame").unwrap(), "60");
        assert_eq!(*log.writes.borrow(), vec!["instance EMA_3"]);

        let again = store.duplicate(&key("EMA_1")).unwrap();
        assert_eq!(again.to_string(), "EMA_4");
        let keys: Vec<String> = store.get_all_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["EMA_1", "EMA_2", "EMA_3", "EMA_4", "RSI_1"]);
    }

    #[test]
    fn duplicate_missing_source_fails() {
        let (mut store, _) = open_store();
        assert!(matches!(
            store.duplicate(&key("EMA_7")),
            Err(ChartError::ConfigurationNotFound { .. })
        ));
    }

    #[test]
    fn save_parameters_overwrites_and_appends() {
        let (mut store, log) = open_store();
        let k = key("EMA_1");
        store
            .save_parameters(
                &k,
                &[
                    IndicatorParameter::typed("TimeFrame", &ParameterValue::Integer(10)),
                    IndicatorParameter::new("Color", ParameterType::Color, "#FF0000"),
                ],
            )
            .unwrap();
        let params = store.get_parameters_for(&k).unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].raw, "10");
        assert_eq!(params[2].name, "Color");
        assert_eq!(*log.writes.borrow(), vec!["instance EMA_1"]);
    }

    #[test]
    fn save_parameters_validates_before_writing() {
        let (mut store, log) = open_store();
        let err = store
            .save_parameters(
                &key("EMA_1"),
                &[IndicatorParameter::new("Color", ParameterType::Color, "red")],
            )
            .unwrap_err();
        assert!(matches!(err, ChartError::TypeConversion { .. }));
        assert!(log.writes.borrow().is_empty());
    }

    #[test]
    fn create_instance_of_new_type_starts_at_one() {
        let (mut store, _) = open_store();
        store.define_indicator("SMA", "Simple moving average").unwrap();
        let k = store
            .create_instance(
                "SMA",
                Category::MovingAverage,
                &[IndicatorParameter::typed("TimeFrame", &ParameterValue::Integer(50))],
            )
            .unwrap();
        assert_eq!(k.to_string(), "SMA_1");
        assert_eq!(store.get_category(&k).unwrap(), Category::MovingAverage);
        assert_eq!(store.create_instance("SMA", Category::Default, &[]).unwrap().id(), 2);
    }

    /// One instance declaring a parameter of every type, each holding a
    /// valid placeholder.
    fn every_type_document() -> ParameterDocument {
        let placeholder = |t: ParameterType| match t {
            ParameterType::Boolean => "false",
            ParameterType::Integer => "0",
            ParameterType::Double => "0",
            ParameterType::String => "",
            ParameterType::Shape => "Line",
            ParameterType::Stroke => "1:solid",
            ParameterType::Color => "#000000",
            ParameterType::SeriesRef => "Close",
            ParameterType::IndicatorRef => "EMA_1",
            ParameterType::ChartPlacement => "Overlay",
        };
        let mut doc = ParameterDocument::new();
        doc.push_instance(
            "MIXED",
            InstanceNode {
                id: 1,
                category: None,
                params: ParameterType::ALL
                    .iter()
                    .map(|t| param(t.tag(), t.tag(), placeholder(*t)))
                    .collect(),
            },
        );
        doc
    }

    proptest! {
        #[test]
        fn set_then_get_typed_returns_value(value in arb_value()) {
            let storage = RecordingStorage {
                initial: every_type_document(),
                log: Rc::new(Recorded::default()),
            };
            let mut store = ParameterStore::open(Box::new(storage)).unwrap();
            let k = key("MIXED_1");
            let name = value.parameter_type().tag();

            store.set_parameter(&k, name, &value.encode()).unwrap();
            prop_assert_eq!(store.get_parameter_type(&k, name).unwrap(), value.parameter_type());
            prop_assert_eq!(store.get_typed(&k, name).unwrap(), value);
        }
    }

    #[test]
    fn every_type_placeholder_is_valid() {
        let storage = RecordingStorage {
            initial: every_type_document(),
            log: Rc::new(Recorded::default()),
        };
        let store = ParameterStore::open(Box::new(storage)).unwrap();
        let k = key("MIXED_1");
        for t in ParameterType::ALL {
            assert_eq!(store.get_typed(&k, t.tag()).unwrap().parameter_type(), t);
        }
    }

    #[test]
    fn padded_or_colon_types_are_rejected() {
        let (mut store, log) = open_store();
        assert!(matches!(
            store.define_indicator(" SMA", ""),
            Err(ChartError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.create_instance("A:B", Category::Default, &[]),
            Err(ChartError::InvalidKey { .. })
        ));
        assert!(log.writes.borrow().is_empty());
    }

    #[test]
    fn set_category_persists() {
        let (mut store, log) = open_store();
        store.set_category(&key("EMA_2"), Category::Trend).unwrap();
        assert_eq!(store.get_category(&key("EMA_2")).unwrap(), Category::Trend);
        assert_eq!(*log.writes.borrow(), vec!["category EMA_2 TREND"]);
        assert!(store.set_category(&key("EMA_5"), Category::Trend).is_err());
    }
}
