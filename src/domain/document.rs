//! In-memory parameter document.
//!
//! Shape: `indicator[type] > instance[id, category] > param[name, type] = value`.
//! Nodes keep raw strings exactly as persisted, so a malformed node only
//! fails when the instance that owns it is read.

use crate::domain::key::IndicatorKey;
use crate::domain::parameter::{IndicatorParameter, ParameterType};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ParamNode {
    pub name: String,
    pub type_tag: String,
    pub value: String,
}

impl ParamNode {
    pub fn from_parameter(param: &IndicatorParameter) -> Self {
        Self {
            name: param.name.clone(),
            type_tag: param.parameter_type.tag().to_string(),
            value: param.raw.clone(),
        }
    }

    pub fn to_parameter(&self) -> Result<IndicatorParameter, String> {
        let parameter_type: ParameterType = self.type_tag.parse()?;
        Ok(IndicatorParameter::new(
            self.name.clone(),
            parameter_type,
            self.value.clone(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceNode {
    pub id: u32,
    pub category: Option<String>,
    pub params: Vec<ParamNode>,
}

impl InstanceNode {
    pub fn param(&self, name: &str) -> Option<&ParamNode> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn param_mut(&mut self, name: &str) -> Option<&mut ParamNode> {
        self.params.iter_mut().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorNode {
    pub description: String,
    pub instances: Vec<InstanceNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterDocument {
    indicators: BTreeMap<String, IndicatorNode>,
}

impl ParameterDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indicator(&self, indicator_type: &str) -> Option<&IndicatorNode> {
        self.indicators.get(indicator_type)
    }

    /// Create the type node if missing; an existing description is replaced
    /// only by a non-empty one.
    pub fn define(&mut self, indicator_type: &str, description: &str) {
        let node = self.indicators.entry(indicator_type.to_string()).or_default();
        if !description.is_empty() {
            node.description = description.to_string();
        }
    }

    pub fn instance(&self, key: &IndicatorKey) -> Option<&InstanceNode> {
        self.indicators
            .get(key.indicator_type())?
            .instances
            .iter()
            .find(|i| i.id == key.id())
    }

    pub fn instance_mut(&mut self, key: &IndicatorKey) -> Option<&mut InstanceNode> {
        self.indicators
            .get_mut(key.indicator_type())?
            .instances
            .iter_mut()
            .find(|i| i.id == key.id())
    }

    /// Append an instance as the last sibling under its type.
    pub fn push_instance(&mut self, indicator_type: &str, instance: InstanceNode) {
        self.indicators
            .entry(indicator_type.to_string())
            .or_default()
            .instances
            .push(instance);
    }

    /// Largest instance id under `indicator_type`, `None` when it has none.
    pub fn max_id(&self, indicator_type: &str) -> Option<u32> {
        self.indicators
            .get(indicator_type)?
            .instances
            .iter()
            .map(|i| i.id)
            .max()
    }

    /// All keys, types in lexical order and instances in document order.
    pub fn keys(&self) -> Vec<IndicatorKey> {
        self.indicators
            .iter()
            .flat_map(|(t, node)| {
                node.instances
                    .iter()
                    .filter_map(move |i| IndicatorKey::new(t.clone(), i.id).ok())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: u32, category: Option<&str>) -> InstanceNode {
        InstanceNode {
            id,
            category: category.map(str::to_string),
            params: vec![ParamNode {
                name: "TimeFrame".into(),
                type_tag: "Integer".into(),
                value: "20".into(),
            }],
        }
    }

    #[test]
    fn instances_keep_sibling_order() {
        let mut doc = ParameterDocument::new();
        doc.push_instance("EMA", instance(3, None));
        doc.push_instance("EMA", instance(1, None));
        doc.push_instance("ATR", instance(1, None));

        let keys: Vec<String> = doc.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["ATR_1", "EMA_3", "EMA_1"]);
    }

    #[test]
    fn max_id_per_type() {
        let mut doc = ParameterDocument::new();
        assert_eq!(doc.max_id("EMA"), None);
        doc.push_instance("EMA", instance(2, None));
        doc.push_instance("EMA", instance(7, None));
        doc.push_instance("SMA", instance(9, None));
        assert_eq!(doc.max_id("EMA"), Some(7));
    }

    #[test]
    fn define_keeps_existing_description() {
        let mut doc = ParameterDocument::new();
        doc.define("EMA", "Exponential moving average");
        doc.define("EMA", "");
        assert_eq!(
            doc.indicator("EMA").unwrap().description,
            "Exponential moving average"
        );
    }

    #[test]
    fn unknown_type_tag_fails_conversion() {
        let node = ParamNode {
            name: "Length".into(),
            type_tag: "Float".into(),
            value: "2.0".into(),
        };
        assert!(node.to_parameter().is_err());
    }

    #[test]
    fn lookup_by_key() {
        let mut doc = ParameterDocument::new();
        doc.push_instance("EMA", instance(1, Some("MOVING_AVERAGE")));
        let key = IndicatorKey::new("EMA", 1).unwrap();
        assert_eq!(
            doc.instance(&key).unwrap().param("TimeFrame").unwrap().value,
            "20"
        );
        assert!(doc.instance(&IndicatorKey::new("EMA", 2).unwrap()).is_none());
    }
}
